//! CG-029: Azure function apps and HTTP trigger bindings.

use crate::core::context::GenerationContext;
use crate::core::digest;
use crate::core::error::GenerationError;
use crate::core::names;
use crate::core::producer::{Entity, Generated, Producer};
use crate::core::resource::{FieldValue, ResourceDef};
use crate::core::types::{DynamicRoute, LambdaSpec, Schema};
use crate::permissions::policy;
use serde::Serialize;

pub const APP_KIND: &str = "azurerm_function_app";
pub const ROLE_KIND: &str = "azurerm_role_assignment";
pub const FILE_KIND: &str = "local_file";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionAppOutput {
    pub app_name: String,
    /// Address of the function app resource
    pub address: String,
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpBindingOutput {
    pub binding: String,
}

fn encode_error(producer: &'static str) -> impl Fn(serde_json::Error) -> GenerationError {
    move |e| GenerationError::Encode {
        producer,
        message: e.to_string(),
    }
}

pub struct FunctionAppProducer;

impl Producer for FunctionAppProducer {
    const NAME: &'static str = "function_app";
    type Output = FunctionAppOutput;

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
    ) -> Result<Generated<FunctionAppOutput>, GenerationError> {
        let Entity::Lambda { id, spec } = entity else {
            return Err(Self::unexpected(entity));
        };
        let schema = ctx.schema();
        let name = names::tf(&[id]);
        let app_name = names::aws(&[&schema.name, id]);

        let mut settings = vec![("FUNCTIONS_WORKER_RUNTIME".to_string(), "java".to_string())];
        settings.extend(spec.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
        let app = ResourceDef::new(APP_KIND, name.as_str())
            .field("name", app_name.as_str())
            .field("location", schema.region.as_str())
            .field("app_settings", FieldValue::map(settings))
            .field("identity", FieldValue::map([("type", "SystemAssigned")]));
        let principal_id = app.attr("identity.0.principal_id");
        let address = app.address();

        let mut resources = vec![app];
        for role in policy::azure_roles(&ctx.grants_for(id), &schema.account) {
            let scope_hash = digest::short_hash(&role.scope);
            let assignment = ResourceDef::new(ROLE_KIND, names::tf(&[id.as_str(), role.role, scope_hash.as_str()]))
                .field("scope", role.scope.as_str())
                .field("role_definition_name", role.role)
                .field("principal_id", FieldValue::reference(principal_id.as_str()));
            resources.push(assignment);
        }

        let output = FunctionAppOutput {
            app_name,
            address,
            principal_id,
        };
        Ok(Generated::new(output, resources))
    }
}

/// Directory name of the function handling `route`.
pub fn http_function_name(route: &DynamicRoute) -> String {
    let mut parts = vec!["http".to_string(), route.method.to_string()];
    parts.extend(route.path.name_parts());
    names::tf(&parts)
}

/// HTTP trigger binding document.
pub fn http_binding(lambda: &LambdaSpec, route: &DynamicRoute) -> Result<String, serde_json::Error> {
    let binding = serde_json::json!({
        "bindings": [
            {
                "name": "req",
                "type": "httpTrigger",
                "direction": "in",
                "authLevel": "anonymous",
                "methods": [route.method.to_string().to_ascii_lowercase()],
                "route": route.path.to_string(),
            },
            {"name": "$return", "type": "http", "direction": "out"}
        ],
        "scriptFile": format!("../{}", lambda.artifact_name()),
        "entryPoint": lambda.handler,
    });
    serde_json::to_string_pretty(&binding)
}

pub struct HttpBindingProducer;

impl Producer for HttpBindingProducer {
    const NAME: &'static str = "http_binding";
    type Output = HttpBindingOutput;

    fn entities(&self, schema: &Schema) -> Vec<Entity> {
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
        !ctx.schema().lambdas.contains_key(&route.lambda)
            || ctx.check::<FunctionAppProducer>(&Entity::lambda_id(&route.lambda))
    }

    fn generate(
        &self,
        entity: &Entity,
        ctx: &GenerationContext<'_>,
    ) -> Result<Generated<HttpBindingOutput>, GenerationError> {
        let Entity::DynamicRoute(route) = entity else {
            return Err(Self::unexpected(entity));
        };
        let lambda = ctx
            .schema()
            .lambdas
            .get(&route.lambda)
            .ok_or_else(|| GenerationError::UnknownLambda {
                entity: entity.id(),
                lambda: route.lambda.clone(),
            })?;
        let app = ctx.get::<FunctionAppProducer>(&Entity::lambda_id(&route.lambda))?;
        let function = http_function_name(route);
        let content = http_binding(lambda, route).map_err(encode_error(Self::NAME))?;

        let file = ResourceDef::new(FILE_KIND, names::tf(&["http_binding", function.as_str()]))
            .field("content", content)
            .field(
                "filename",
                lambda.beside_artifact(&format!("{}/function.json", function)),
            )
            .depends_on(app.address.as_str());
        let output = HttpBindingOutput {
            binding: file.address(),
        };
        Ok(Generated::new(output, vec![file]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::Scheduler;
    use crate::producers::fixtures;

    fn run() -> Vec<ResourceDef> {
        let schema = fixtures::schema(fixtures::AZURE_APP);
        let mut ctx = fixtures::context(&schema);
        Scheduler::new()
            .with(HttpBindingProducer)
            .with(FunctionAppProducer)
            .run(&mut ctx)
            .unwrap();
        ctx.finish().0
    }

    #[test]
    fn test_cg029_function_app_with_roles() {
        let resources = run();
        let app = resources.iter().find(|r| r.kind == APP_KIND).unwrap();
        assert_eq!(app.name, "users");
        assert_eq!(app.fields["location"], FieldValue::from("westeurope"));

        let roles: Vec<&ResourceDef> = resources.iter().filter(|r| r.kind == ROLE_KIND).collect();
        // storage account read + insights baseline
        assert_eq!(roles.len(), 2);
        let storage = roles
            .iter()
            .find(|r| r.fields["role_definition_name"] == FieldValue::from("Reader"))
            .unwrap();
        assert_eq!(
            storage.fields["scope"],
            FieldValue::from(
                "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct"
            )
        );
        assert_eq!(
            storage.fields["principal_id"],
            FieldValue::reference("azurerm_function_app.users.identity.0.principal_id")
        );
    }

    #[test]
    fn test_cg029_http_binding_file() {
        let resources = run();
        let file = resources.iter().find(|r| r.kind == FILE_KIND).unwrap();
        assert_eq!(file.name, "http_binding_http_get_users_id_param");
        assert_eq!(
            file.fields["filename"],
            FieldValue::from("build/libs/http_get_users_id_param/function.json")
        );
        let parsed: serde_json::Value =
            serde_json::from_str(file.fields["content"].as_text().unwrap()).unwrap();
        assert_eq!(parsed["bindings"][0]["route"], "users/{id}");
        assert_eq!(parsed["bindings"][0]["methods"][0], "get");
        assert_eq!(file.depends_on, vec!["azurerm_function_app.users"]);
    }
}
