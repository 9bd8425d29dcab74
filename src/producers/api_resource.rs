//! CG-021: Path resources of the REST API.
//!
//! Every non-root prefix of every route path becomes one resource whose
//! parent is the resource of the next-shorter prefix. A path therefore waits
//! on its parent, so deep trees take more than one sweep when the entity
//! order does not already follow the tree.

use super::rest_api::{RestApiOutput, RestApiProducer};
use super::schema_api;
use crate::core::context::GenerationContext;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{ApiSpec, Schema, UriPath};
use serde::Serialize;
use std::collections::BTreeSet;

pub const KIND: &str = "aws_api_gateway_resource";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResourceOutput {
    pub resource_id: String,
}

/// Identifier of the path resource for `path` under `api`.
pub fn resource_name(api: &ApiSpec, path: &UriPath) -> String {
    let mut parts = vec![api.name.clone()];
    parts.extend(path.name_parts());
    names::tf(&parts)
}

/// Reference to the id of the resource backing `path`. Derived from the
/// name registry, so no output of the path producer is needed.
pub fn resource_id_ref(api: &ApiSpec, rest: &RestApiOutput, path: &UriPath) -> String {
    if path.is_root() {
        return rest.root_resource_id.clone();
    }
    format!("{}.{}.id", KIND, resource_name(api, path))
}

/// True once the resource backing `path` exists.
pub fn path_ready(ctx: &GenerationContext<'_>, path: &UriPath) -> bool {
    if path.is_root() {
        return Entity::schema_api_id(ctx.schema())
            .is_some_and(|id| ctx.check::<RestApiProducer>(&id));
    }
    ctx.check::<ApiResourceProducer>(&Entity::path_id(path))
}

/// Reference to the id of the resource backing `path`, read from outputs.
pub fn path_resource_id(
    ctx: &GenerationContext<'_>,
    api: &ApiSpec,
    path: &UriPath,
) -> Result<String, GenerationError> {
    if path.is_root() {
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;
        return Ok(rest.root_resource_id.clone());
    }
    let parent = ctx.get::<ApiResourceProducer>(&Entity::path_id(path))?;
    Ok(parent.resource_id.clone())
}

/// All paths routes are served under, including intermediate ones.
pub fn route_paths(schema: &Schema) -> BTreeSet<UriPath> {
    let dynamic = schema.routes.dynamic.iter().map(|r| &r.path);
    let statics = schema.routes.statics.iter().map(|r| &r.path);
    dynamic
        .chain(statics)
        .flat_map(UriPath::prefixes)
        .collect()
}

pub struct ApiResourceProducer;

impl Producer for ApiResourceProducer {
    const NAME: &'static str = "api_resource";
    type Output = ApiResourceOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
        if schema.api.is_none() {
            return Vec::new();
        }
        // Longest first: exercises the parent wait on every run.
        route_paths(schema)
            .into_iter()
            .rev()
            .map(Entity::ResourcePath)
            .collect()
    }

    fn may_run(&self, entity: &Entity, ctx: &GenerationContext<'_>) -> bool {
        let Entity::ResourcePath(path) = entity else {
            return false;
        };
        path.parent().is_some_and(|parent| path_ready(ctx, &parent))
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<ApiResourceOutput>, GenerationError> {
        let Entity::ResourcePath(path) = entity else {
            return Err(Self::unexpected(entity));
        };
        let (Some(parent), Some(part)) = (path.parent(), path.last()) else {
            return Err(Self::unexpected(entity));
        };
        let api = schema_api(ctx, Self::NAME, entity)?;
        let rest = ctx.get::<RestApiProducer>(&Entity::api_id(&api.name))?;
        let parent_id = path_resource_id(ctx, api, &parent)?;

        let resource = ResourceDef::new(KIND, resource_name(api, path))
            .field("rest_api_id", FieldValue::reference(&rest.rest_api_id))
            .field("parent_id", FieldValue::reference(parent_id))
            .field("path_part", part);
        let output = ApiResourceOutput {
            resource_id: resource.attr("id"),
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
    fn test_cg021_route_paths_include_prefixes() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let paths: Vec<String> = route_paths(&schema).iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["assets", "users", "users/{id}"]);
    }

    #[test]
    fn test_cg021_parent_waits() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let ctx = fixtures::context(&schema);
        let child = Entity::ResourcePath(UriPath::parse("/users/{id}"));
        assert!(!ApiResourceProducer.may_run(&child, &ctx));
    }

    #[test]
    fn test_cg021_tree_resolves_over_sweeps() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let mut ctx = fixtures::context(&schema);
        let report = Scheduler::new()
            .with(RestApiProducer)
            .with(ApiResourceProducer)
            .run(&mut ctx)
            .unwrap();
        assert_eq!(report.completed, 4);
        assert!(report.sweeps >= 2);

        let child = ctx
            .resources()
            .iter()
            .find(|r| r.name == "shop_api_users_id_param")
            .unwrap();
        assert_eq!(
            child.fields["parent_id"],
            FieldValue::reference("aws_api_gateway_resource.shop_api_users.id")
        );
        assert_eq!(child.fields["path_part"], FieldValue::from("{id}"));
    }

    #[test]
    fn test_cg021_resource_id_ref_matches_generated() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let api = schema.api.as_ref().unwrap();
        let rest = RestApiOutput {
            rest_api_id: "a.id".into(),
            root_resource_id: "a.root".into(),
            execution_arn: "a.arn".into(),
        };
        assert_eq!(resource_id_ref(api, &rest, &UriPath::root()), "a.root");
        assert_eq!(
            resource_id_ref(api, &rest, &UriPath::parse("/users")),
            "aws_api_gateway_resource.shop_api_users.id"
        );
    }
}
