//! CG-025: API deployment.
//!
//! The deployment carries a `deployed_at` variable evaluated by the
//! provisioning tool on every apply, so it is recreated each time and picks
//! up route changes.

use super::rest_api::RestApiProducer;
use super::schema_api;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::Schema;
use serde::Serialize;

pub const KIND: &str = "aws_api_gateway_deployment";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentOutput {
    /// Stage the API is published under
    pub stage_name: String,
    /// Address of the deployment resource
    pub deployment: String,
}

pub struct DeploymentProducer;

impl Producer for DeploymentProducer {
    const NAME: &'static str = "deployment";
    type Output = DeploymentOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema
            .api
            .iter()
            .map(|api| Entity::Deployment(api.resolved_deployment()))
            .collect()
    }

    fn may_run(&self, _entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        Entity::schema_api_id(ctx.schema()).is_some_and(|id| ctx.check::<RestApiProducer>(&id))
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<DeploymentOutput>, GenerationError> {
        let Entity::Deployment(deployment) = entity else {
            return Err(Self::unexpected(entity));
        };
        let api = schema_api(ctx, Self::NAME, entity)?;
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;

        let resource = ResourceDef::new(KIND, names::tf(&[api.deployment_name()]))
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("stage_name", deployment.version.as_str())
            .field(
                "variables",
                FieldValue::map([("deployed_at", FieldValue::expr("timestamp()"))]),
            );
        let output = DeploymentOutput {
            stage_name: deployment.version.clone(),
            deployment: resource.address(),
        };
        Ok(Generated::new(output, vec![resource]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::Scheduler;
    use crate::producers::fixtures;

    #[test]
    fn test_cg025_waits_for_rest_api() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let ctx = fixtures::context(&schema);
        let entity = DeploymentProducer.entities(&schema).remove(0);
        assert!(!DeploymentProducer.may_run(&entity, &ctx));
    }

    #[test]
    fn test_cg025_deployment_timestamp_and_stage() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let mut ctx = fixtures::context(&schema);
        let report = Scheduler::new()
            .with(DeploymentProducer)
            .with(RestApiProducer)
            .run(&mut ctx)
            .unwrap();
        assert_eq!(report.sweeps, 2);

        let entity = DeploymentProducer.entities(&schema).remove(0);
        let output = ctx.get::<DeploymentProducer>(&entity.id()).unwrap();
        assert_eq!(output.stage_name, "v7");
        assert_eq!(output.deployment, "aws_api_gateway_deployment.shop_api");

        let (resources, _) = ctx.finish();
        let deployment = resources.iter().find(|r| r.kind == KIND).unwrap();
        let FieldValue::Map(variables) = &deployment.fields["variables"] else {
            panic!("variables is not a map");
        };
        assert_eq!(variables["deployed_at"], FieldValue::expr("timestamp()"));
    }

    #[test]
    fn test_cg025_named_deployment() {
        let yaml = fixtures::AWS_APP.replace("version: \"v7\"", "name: live\n    version: \"v7\"");
        let schema = fixtures::schema(&yaml);
        let entity = DeploymentProducer.entities(&schema).remove(0);
        assert_eq!(entity.id().as_str(), "deployment:live");
    }
}
