//! CG-027: Scheduled triggers.
//!
//! On Azure a timer is a `function.json` binding file written next to the
//! packaged artifact. On AWS it is an event rule targeting the lambda.

use super::lambda::LambdaProducer;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{LambdaSpec, Platform, ScheduledEvent, Schema};
use serde::Serialize;

pub const FILE_KIND: &str = "local_file";
pub const RULE_KIND: &str = "aws_cloudwatch_event_rule";
pub const TARGET_KIND: &str = "aws_cloudwatch_event_target";
pub const PERMISSION_KIND: &str = "aws_lambda_permission";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledOutput {
    /// Address of the resource that creates the trigger
    pub binding: String,
}

/// Path of the binding file for `event` targeting `lambda`.
pub fn binding_path(lambda: &LambdaSpec, event: &ScheduledEvent) -> String {
    lambda.beside_artifact(&format!("{}/function.json", event.fq_id()))
}

/// Timer trigger binding document.
pub fn timer_binding(lambda: &LambdaSpec, event: &ScheduledEvent) -> Result<String, serde_json::Error> {
    let binding = serde_json::json!({
        "bindings": [{
            "name": "timer",
            "type": "timerTrigger",
            "direction": "in",
            "schedule": event.cron,
        }],
        "scriptFile": format!("../{}", lambda.artifact_name()),
        "entryPoint": lambda.handler,
    });
    serde_json::to_string_pretty(&binding)
}

fn azure_binding(lambda: &LambdaSpec, event: &ScheduledEvent) -> Result<Vec<ResourceDef>, GenerationError> {
    let content = timer_binding(lambda, event).map_err(|e| GenerationError::Encode {
        producer: ScheduledProducer::NAME,
        message: e.to_string(),
    })?;
    let file = ResourceDef::new(FILE_KIND, names::tf(&["timer_binding", event.fq_id().as_str()]))
        .field("content", content)
        .field("filename", binding_path(lambda, event));
    Ok(vec![file])
}

fn aws_rule(ctx: &GenerationContext<'_>, event: &ScheduledEvent) -> Result<Vec<ResourceDef>, GenerationError> {
    let schema = ctx.schema();
    let lambda = ctx.get::<LambdaProducer>(&Entity::lambda_id(&event.lambda))?;
    let fq_id = event.fq_id();

    let rule = ResourceDef::new(RULE_KIND, fq_id.as_str())
        .field("name", names::aws(&[&schema.name, &fq_id]))
        .field("schedule_expression", format!("cron({})", event.cron));
    let target = ResourceDef::new(TARGET_KIND, fq_id.as_str())
        .field("rule", FieldValue::reference(rule.attr("name")))
        .field("arn", FieldValue::reference(&lambda.arn));
    let permission = ResourceDef::new(PERMISSION_KIND, fq_id.as_str())
        .field("statement_id", "AllowEventBridgeInvoke")
        .field("action", "lambda:InvokeFunction")
        .field("function_name", lambda.function_name.as_str())
        .field("principal", "events.amazonaws.com")
        .field("source_arn", FieldValue::reference(rule.attr("arn")));
    Ok(vec![rule, target, permission])
}

pub struct ScheduledProducer;

impl Producer for ScheduledProducer {
    const NAME: &'static str = "scheduled";
    type Output = ScheduledOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema
            .events
            .scheduled
            .iter()
            .cloned()
            .map(Entity::Scheduled)
            .collect()
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        let Entity::Scheduled(event) = entity else {
            return false;
        };
        let schema = ctx.schema();
        match schema.platform {
            Platform::Azure => true,
            Platform::Aws => {
                !schema.lambdas.contains_key(&event.lambda)
                    || ctx.check::<LambdaProducer>(&Entity::lambda_id(&event.lambda))
            }
        }
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<ScheduledOutput>, GenerationError> {
        let Entity::Scheduled(event) = entity else {
            return Err(Self::unexpected(entity));
        };
        let schema = ctx.schema();
        let lambda = schema
            .lambdas
            .get(&event.lambda)
            .ok_or_else(|| GenerationError::UnknownLambda {
                entity: entity.id(),
                lambda: event.lambda.clone(),
            })?;

        let resources = match schema.platform {
            Platform::Azure => azure_binding(lambda, event)?,
            Platform::Aws => aws_rule(ctx, event)?,
        };
        let output = ScheduledOutput {
            binding: resources[0].address(),
        };
        Ok(Generated::new(output, resources))
    }
}
