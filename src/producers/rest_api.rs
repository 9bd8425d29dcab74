//! CG-020: REST API root.

use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::Schema;
use serde::Serialize;

pub const KIND: &str = "aws_api_gateway_rest_api";

/// Symbolic ids of the REST API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestApiOutput {
    pub rest_api_id: String,
    pub root_resource_id: String,
    pub execution_arn: String,
}

pub struct RestApiProducer;

impl Producer for RestApiProducer {
    const NAME: &'static str = "rest_api";
    type Output = RestApiOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema.api.iter().cloned().map(Entity::Api).collect()
    }

    fn may_run(&self, _entity: &Entity, _ctx: &GenerationContext<'_>) -> bool {
        true
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<RestApiOutput>, GenerationError> {
        let Entity::Api(api) = entity else {
            return Err(Self::unexpected(entity));
        };
        let schema = ctx.schema();
        let mut api_res = ResourceDef::new(KIND, names::tf(&[&api.name]))
            .field("name", names::aws(&[&schema.name, &api.name]))
            .field("binary_media_types", FieldValue::List(vec!["*/*".into()]));
        if let Some(ref description) = schema.description {
            api_res = api_res.field("description", description.as_str());
        }

        let output = RestApiOutput {
            rest_api_id: api_res.attr("id"),
            root_resource_id: api_res.attr("root_resource_id"),
            execution_arn: api_res.attr("execution_arn"),
        };
        Ok(Generated::new(output, vec![api_res]))
    }
}
