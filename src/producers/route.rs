//! CG-023: Dynamic routes. Method, proxy integration and invoke permission.

use super::api_resource::{path_ready, path_resource_id};
use super::lambda::{LambdaOutput, LambdaProducer};
use super::rest_api::RestApiProducer;
use super::schema_api;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{ApiSpec, DynamicRoute, Schema};
use serde::Serialize;

pub const METHOD_KIND: &str = "aws_api_gateway_method";
pub const INTEGRATION_KIND: &str = "aws_api_gateway_integration";
pub const PERMISSION_KIND: &str = "aws_lambda_permission";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutput {
    pub method: String,
    pub integration: String,
}

/// Identifier shared by the resources of one route.
pub fn route_name(api: &ApiSpec, route: &DynamicRoute) -> String {
    let mut parts = vec![api.name.clone()];
    parts.extend(route.path.name_parts());
    parts.push(route.method.to_string());
    names::tf(&parts)
}

pub struct DynamicRouteProducer;

impl Producer for DynamicRouteProducer {
    const NAME: &'static str = "dynamic_route";
    type Output = RouteOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        if schema.api.is_none() {
            return Vec::new();
        }
        schema
            .routes
            .dynamic
            .iter()
            .cloned()
            .map(Entity::DynamicRoute)
            .collect()
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        let Entity::DynamicRoute(route) = entity else {
            return false;
        };
        // Unknown lambdas run straight into the error in `generate`.
        let lambda_ready = !ctx.schema().lambdas.contains_key(&route.lambda)
            || ctx.check::<LambdaProducer>(&Entity::lambda_id(&route.lambda));
        lambda_ready && path_ready(ctx, &route.path)
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<RouteOutput>, GenerationError> {
        let Entity::DynamicRoute(route) = entity else {
            return Err(Self::unexpected(entity));
        };
        if !ctx.schema().lambdas.contains_key(&route.lambda) {
            return Err(GenerationError::UnknownLambda {
                entity: entity.id(),
                lambda: route.lambda.clone(),
            });
        }
        let api = schema_api(ctx, Self::NAME, entity)?;
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;
        let lambda: &LambdaOutput = ctx.get::<LambdaProducer>(&Entity::lambda_id(&route.lambda))?;
        let resource_id = path_resource_id(ctx, api, &route.path)?;
        let name = route_name(api, route);

        let method = ResourceDef::new(METHOD_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id.as_str()))
            .field("http_method", route.method.to_string())
            .field("authorization", "NONE");
        let integration = ResourceDef::new(INTEGRATION_KIND, name.as_str())
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("resource_id", FieldValue::reference(resource_id))
            .field("http_method", FieldValue::reference(method.attr("http_method")))
            .field("integration_http_method", "POST")
            .field("type", "AWS_PROXY")
            .field("uri", FieldValue::reference(&lambda.invoke_arn));
        let permission = ResourceDef::new(PERMISSION_KIND, name.as_str())
            .field("statement_id", "AllowApiGatewayInvoke")
            .field("action", "lambda:InvokeFunction")
            .field("function_name", lambda.function_name.as_str())
            .field("principal", "apigateway.amazonaws.com")
            .field(
                "source_arn",
                format!("${{{}}}/*/{}/{}", rest.execution_arn, route.method, route.path),
            );

        let output = RouteOutput {
            method: method.address(),
            integration: integration.address(),
        };
        Ok(Generated::new(output, vec![method, integration, permission]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GenerationError;
    use crate::core::scheduler::Scheduler;
    use crate::producers::api_resource::ApiResourceProducer;
    use crate::producers::fixtures;

    fn run(schema: &Schema) -> Result<Vec<ResourceDef>, GenerationError> {
        let mut ctx = fixtures::context(schema);
        // Routes first: they wait on everything else.
        Scheduler::new()
            .with(DynamicRouteProducer)
            .with(LambdaProducer)
            .with(ApiResourceProducer)
            .with(RestApiProducer)
            .run(&mut ctx)?;
        Ok(ctx.finish().0)
    }

    #[test]
    fn test_cg023_route_resources() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let resources = run(&schema).unwrap();
        let method = resources
            .iter()
            .find(|r| r.address() == "aws_api_gateway_method.shop_api_users_id_param_get")
            .unwrap();
        assert_eq!(
            method.fields["resource_id"],
            FieldValue::reference("aws_api_gateway_resource.shop_api_users_id_param.id")
        );
        let integration = resources
            .iter()
            .find(|r| r.address() == "aws_api_gateway_integration.shop_api_users_post")
            .unwrap();
        assert_eq!(integration.fields["type"], FieldValue::from("AWS_PROXY"));
        assert_eq!(
            integration.fields["uri"],
            FieldValue::reference("aws_lambda_function.users.invoke_arn")
        );
    }

    #[test]
    fn test_cg023_permission_source_arn() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let resources = run(&schema).unwrap();
        let permission = resources
            .iter()
            .find(|r| r.address() == "aws_lambda_permission.shop_api_users_id_param_get")
            .unwrap();
        assert_eq!(
            permission.fields["source_arn"],
            FieldValue::from("${aws_api_gateway_rest_api.shop_api.execution_arn}/*/GET/users/{id}")
        );
    }

    #[test]
    fn test_cg023_unknown_lambda() {
        let yaml = fixtures::AWS_APP.replace("lambda: users}", "lambda: ghost}");
        let schema = fixtures::schema(&yaml);
        let err = run(&schema).unwrap_err();
        assert!(matches!(err, GenerationError::UnknownLambda { ref lambda, .. } if lambda == "ghost"));
    }
}
