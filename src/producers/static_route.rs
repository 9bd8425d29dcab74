//! CG-024: Static routes served from the application bucket.

use super::api_resource::{path_ready, path_resource_id};
use super::rest_api::RestApiProducer;
use super::schema_api;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{Schema, StaticRoute};
use serde::Serialize;

pub const OBJECT_KIND: &str = "aws_s3_object";
pub const METHOD_KIND: &str = "aws_api_gateway_method";
pub const INTEGRATION_KIND: &str = "aws_api_gateway_integration";
pub const METHOD_RESPONSE_KIND: &str = "aws_api_gateway_method_response";
pub const INTEGRATION_RESPONSE_KIND: &str = "aws_api_gateway_integration_response";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticRouteOutput {
    pub object: String,
    pub method: String,
}

/// Bucket key of a static route. The root path is served as `index.html`.
pub fn object_key(route: &StaticRoute) -> String {
    if route.path.is_root() {
        "index.html".to_string()
    } else {
        route.path.to_string()
    }
}

pub struct StaticRouteProducer;

impl Producer for StaticRouteProducer {
    const NAME: &'static str = "static_route";
    type Output = StaticRouteOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        if schema.api.is_none() {
            return Vec::new();
        }
        schema
            .routes
            .statics
            .iter()
            .cloned()
            .map(Entity::StaticRoute)
            .collect()
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        let Entity::StaticRoute(route) = entity else {
            return false;
        };
        path_ready(ctx, &route.path)
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<StaticRouteOutput>, GenerationError> {
        let Entity::StaticRoute(route) = entity else {
            return Err(Self::unexpected(entity));
        };
        let schema = ctx.schema();
        let Some(bucket) = schema.bucket.as_deref() else {
            return Err(Self::unexpected(entity));
        };
        let api = schema_api(ctx, Self::NAME, entity)?;
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;
        let resource_id = path_resource_id(ctx, api, &route.path)?;

        let mut parts = vec![api.name.clone(), "static".to_string()];
        parts.extend(route.path.name_parts());
        let name = names::tf(&parts);
        let key = object_key(route);

        let object = ResourceDef::new(OBJECT_KIND, name.as_str())
            .field("bucket", bucket)
            .field("key", key.as_str())
            .field("source", route.file.as_str())
            .field("content_type", route.mime.as_str())
            .field("etag", FieldValue::expr(format!("filemd5(\"{}\")", route.file)));
        let method = ResourceDef::new(METHOD_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id.as_str()))
            .field("http_method", "GET")
            .field("authorization", "NONE");
        let integration = ResourceDef::new(INTEGRATION_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id.as_str()))
            .field("http_method", FieldValue::reference(method.attr("http_method")))
            .field("integration_http_method", "GET")
            .field("type", "AWS")
            .field(
                "uri",
                format!("arn:aws:apigateway:{}:s3:path/{}/{}", schema.region, bucket, key),
            )
            .depends_on(method.address());
        let method_response = ResourceDef::new(METHOD_RESPONSE_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id.as_str()))
            .field("http_method", FieldValue::reference(method.attr("http_method")))
            .field("status_code", "200")
            .field(
                "response_parameters",
                FieldValue::map([
                    ("method.response.header.Content-Type", true),
                    ("method.response.header.Content-Length", true),
                ]),
            )
            .depends_on(method.address());
        let integration_response = ResourceDef::new(INTEGRATION_RESPONSE_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id))
            .field("http_method", FieldValue::reference(method.attr("http_method")))
            .field("status_code", FieldValue::reference(method_response.attr("status_code")))
            .field(
                "response_parameters",
                FieldValue::map([
                    (
                        "method.response.header.Content-Type",
                        "integration.response.header.Content-Type",
                    ),
                    (
                        "method.response.header.Content-Length",
                        "integration.response.header.Content-Length",
                    ),
                ]),
            )
            .depends_on(integration.address())
            .depends_on(object.address());

        let output = StaticRouteOutput {
            object: object.address(),
            method: method.address(),
        };
        Ok(Generated::new(
            output,
            vec![object, method, integration, method_response, integration_response],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::Scheduler;
    use crate::core::types::UriPath;
    use crate::producers::api_resource::ApiResourceProducer;
    use crate::producers::fixtures;

    #[test]
    fn test_cg024_static_resources() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let mut ctx = fixtures::context(&schema);
        Scheduler::new()
            .with(RestApiProducer)
            .with(ApiResourceProducer)
            .with(StaticRouteProducer)
            .run(&mut ctx)
            .unwrap();
        let (resources, _) = ctx.finish();
        let statics: Vec<&ResourceDef> = resources
            .iter()
            .filter(|r| r.name == "shop_api_static_assets")
            .collect();
        assert_eq!(statics.len(), 5);

        let object = statics[0];
        assert_eq!(object.kind, OBJECT_KIND);
        assert_eq!(object.fields["bucket"], FieldValue::from("shop-site"));
        assert_eq!(object.fields["content_type"], FieldValue::from("text/html"));

        let integration = statics[2];
        assert_eq!(
            integration.fields["uri"],
            FieldValue::from("arn:aws:apigateway:us-east-1:s3:path/shop-site/assets")
        );
        assert_eq!(integration.depends_on, vec!["aws_api_gateway_method.shop_api_static_assets"]);
    }

    #[test]
    fn test_cg024_root_key() {
        let route = StaticRoute {
            path: UriPath::root(),
            file: "index.html".into(),
            mime: "text/html".into(),
        };
        assert_eq!(object_key(&route), "index.html");
    }
}
