//! CG-026: CORS preflight handlers.
//!
//! Every path the API serves, plus the root, gets an `OPTIONS` method with a
//! mock integration and the response pair that returns the allow headers.
//! Path resource ids come from the name registry, so only the REST API has
//! to exist before this runs.

use super::api_resource::resource_id_ref;
use super::rest_api::{RestApiOutput, RestApiProducer};
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{ApiSpec, Schema, UriPath};
use serde::Serialize;
use std::collections::BTreeSet;

pub const METHOD_KIND: &str = "aws_api_gateway_method";
pub const INTEGRATION_KIND: &str = "aws_api_gateway_integration";
pub const METHOD_RESPONSE_KIND: &str = "aws_api_gateway_method_response";
pub const INTEGRATION_RESPONSE_KIND: &str = "aws_api_gateway_integration_response";

const ALLOW_HEADERS: &str = "'Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token'";
const ALLOW_METHODS: &str = "'GET,POST,PUT,DELETE,OPTIONS'";
const ALLOW_ORIGIN: &str = "'*'";
const MAX_AGE: &str = "'86400'";

const HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Headers", ALLOW_HEADERS),
    ("Access-Control-Allow-Methods", ALLOW_METHODS),
    ("Access-Control-Allow-Origin", ALLOW_ORIGIN),
    ("Access-Control-Max-Age", MAX_AGE),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorsOutput {
    /// Addresses of the OPTIONS methods, one per path
    pub methods: Vec<String>,
}

/// Paths receiving a preflight handler: the root and every declared route
/// path. Routes sharing a path share its handler.
pub fn cors_paths(schema: &Schema) -> BTreeSet<UriPath> {
    let dynamic = schema.routes.dynamic.iter().map(|r| r.path.clone());
    let statics = schema.routes.statics.iter().map(|r| r.path.clone());
    std::iter::once(UriPath::root())
        .chain(dynamic)
        .chain(statics)
        .collect()
}

fn handler_name(api: &ApiSpec, role: &str, path: &UriPath) -> String {
    let mut parts = vec![api.name.clone(), "cors".to_string(), role.to_string()];
    if path.is_root() {
        parts.push(names::ROOT.to_string());
    } else {
        parts.extend(path.name_parts());
    }
    names::tf(&parts)
}

fn preflight(api: &ApiSpec, rest: &RestApiOutput, path: &UriPath) -> Vec<ResourceDef> {
    let resource_id = resource_id_ref(api, rest, path);
    let options = handler_name(api, "options", path);
    let response = handler_name(api, "response", path);

    let method = ResourceDef::new(METHOD_KIND, options.as_str())
        .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
        .field("resource_id", FieldValue::reference(resource_id.as_str()))
        .field("http_method", "OPTIONS")
        .field("authorization", "NONE");
    let integration = ResourceDef::new(INTEGRATION_KIND, options.as_str())
        .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
        .field("resource_id", FieldValue::reference(resource_id.as_str()))
        .field("http_method", FieldValue::reference(method.attr("http_method")))
        .field("type", "MOCK")
        .field(
            "request_templates",
            FieldValue::map([("application/json", "{\"statusCode\": 200}")]),
        )
        .depends_on(method.address());
    let method_response = ResourceDef::new(METHOD_RESPONSE_KIND, response.as_str())
        .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
        .field("resource_id", FieldValue::reference(resource_id.as_str()))
        .field("http_method", FieldValue::reference(method.attr("http_method")))
        .field("status_code", "200")
        .field(
            "response_parameters",
            FieldValue::map(
                HEADERS
                    .iter()
                    .map(|(header, _)| (format!("method.response.header.{}", header), true)),
            ),
        )
        .depends_on(method.address());
    let integration_response = ResourceDef::new(INTEGRATION_RESPONSE_KIND, response.as_str())
        .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
        .field("resource_id", FieldValue::reference(resource_id))
        .field("http_method", FieldValue::reference(method.attr("http_method")))
        .field("status_code", FieldValue::reference(method_response.attr("status_code")))
        .field(
            "response_parameters",
            FieldValue::map(
                HEADERS
                    .iter()
                    .map(|(header, value)| (format!("method.response.header.{}", header), *value)),
            ),
        )
        .depends_on(method_response.address())
        .depends_on(integration.address());

    vec![method, integration, method_response, integration_response]
}

pub struct CorsProducer;

impl Producer for CorsProducer {
    const NAME: &'static str = "cors";
    type Output = CorsOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        schema
            .api
            .iter()
            .filter(|api| api.allow_cors)
            .cloned()
            .map(Entity::Api)
            .collect()
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        let Entity::Api(api) = entity else {
            return false;
        };
        api.allow_cors && ctx.check::<RestApiProducer>(&entity.id())
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<CorsOutput>, GenerationError> {
        let Entity::Api(api) = entity else {
            return Err(Self::unexpected(entity));
        };
        let rest = ctx.get::<RestApiProducer>(&entity.id())?;
        let paths = cors_paths(ctx.schema());

        let mut resources = Vec::with_capacity(paths.len() * 4);
        let mut methods = Vec::with_capacity(paths.len());
        for path in &paths {
            let handlers = preflight(api, rest, path);
            methods.push(handlers[0].address());
            resources.extend(handlers);
        }
        tracing::debug!(api = %api.name, paths = paths.len(), "cors handlers");
        Ok(Generated::new(CorsOutput { methods }, resources))
    }
}
