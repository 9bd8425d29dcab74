//! CG-022: Lambda functions with their execution role and policy.

use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::Schema;
use crate::permissions::policy;
use serde::Serialize;

pub const FUNCTION_KIND: &str = "aws_lambda_function";
pub const ROLE_KIND: &str = "aws_iam_role";
pub const POLICY_KIND: &str = "aws_iam_role_policy";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaOutput {
    /// Cloud-side function name
    pub function_name: String,
    /// Reference to the function ARN
    pub arn: String,
    /// Reference to the invocation ARN used by API integrations
    pub invoke_arn: String,
}

fn assume_role_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": "lambda.amazonaws.com"},
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

pub struct LambdaProducer;

impl Producer for LambdaProducer {
    const NAME: &'static str = "lambda";
    type Output = LambdaOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema
            .lambdas
            .iter()
            .map(|(id, spec)| Entity::Lambda {
                id: id.clone(),
                spec: spec.clone(),
            })
            .collect()
    }

    fn may_run(&self, _entity: &Entity, _ctx: &GenerationContext<'_>) -> bool {
        true
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<LambdaOutput>, GenerationError> {
        let Entity::Lambda { id, spec } = entity else {
            return Err(Self::unexpected(entity));
        };
        let schema = ctx.schema();
        let name = names::tf(&[id]);
        let function_name = names::aws(&[&schema.name, id]);

        let grants = ctx.grants_for(id);
        let document = policy::aws_policy(&grants, &schema.region, &schema.account)
            .to_json()
            .map_err(|e| GenerationError::Encode {
                producer: Self::NAME,
                message: e.to_string(),
            })?;

        let role = ResourceDef::new(ROLE_KIND, name.as_str())
            .field("name", function_name.as_str())
            .field("assume_role_policy", assume_role_policy());
        let role_policy = ResourceDef::new(POLICY_KIND, name.as_str())
            .field("role", FieldValue::reference(role.attr("id")))
            .field("policy", document);

        let mut function = ResourceDef::new(FUNCTION_KIND, name.as_str())
            .field("function_name", function_name.as_str())
            .field("role", FieldValue::reference(role.attr("arn")))
            .field("handler", spec.handler.as_str())
            .field("runtime", spec.runtime.as_str())
            .field("memory_size", spec.memory_mb)
            .field("timeout", spec.timeout_sec)
            .field("filename", spec.file.as_str())
            .field(
                "source_code_hash",
                FieldValue::expr(format!("filebase64sha256(\"{}\")", spec.file)),
            );
        if !spec.environment.is_empty() {
            let variables = FieldValue::map(
                spec.environment
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
            function = function.field("environment", FieldValue::map([("variables", variables)]));
        }

        let output = LambdaOutput {
            function_name,
            arn: function.attr("arn"),
            invoke_arn: function.attr("invoke_arn"),
        };
        Ok(Generated::new(output, vec![role, role_policy, function]))
    }
}
