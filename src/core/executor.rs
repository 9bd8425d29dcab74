//! CG-030: Executor. One generation pass.
//!
//! grants → context → platform scheduler → resources + manifest + digest.
//! Any error aborts the pass; nothing partial escapes.

use super::context::{GenerationContext, Manifest};
use super::digest;
use super::error::GenerationError;
use super::resource::ResourceDef;
use super::scheduler::SweepReport;
use super::state::GraphFile;
use super::types::Schema;
use crate::permissions::{grants_for_schema, LibraryIndex};
use crate::producers;
use std::time::Instant;

/// Everything a pass produced.
#[derive(Debug)]
pub struct GenerationResult {
    pub resources: Vec<ResourceDef>,
    pub manifest: Manifest,
    pub report: SweepReport,
    /// BLAKE3 digest of `resources`
    pub digest: String,
}

impl GenerationResult {
    /// Graph file for persisting this result.
    pub fn into_graph(self, app: &str) -> GraphFile {
        GraphFile::new(app, self.digest, self.resources, self.manifest)
    }
}

/// Run a full generation pass for `schema`.
pub fn generate(schema: &Schema, library: &dyn LibraryIndex) -> Result<GenerationResult, GenerationError> {
    let start = Instant::now();
    let grants = grants_for_schema(schema, library)?;
    let mut ctx = GenerationContext::new(schema, grants);

    let scheduler = producers::scheduler_for(schema.platform);
    let report = scheduler.run(&mut ctx)?;
    let (resources, manifest) = ctx.finish();
    let digest = digest::hash_resources(&resources);

    tracing::info!(
        app = %schema.name,
        platform = %schema.platform,
        resources = resources.len(),
        outputs = manifest.outputs.len(),
        sweeps = report.sweeps,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generation complete"
    );

    Ok(GenerationResult {
        resources,
        manifest,
        report,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::producer::Entity;
    use crate::permissions::{DeclaredResource, PermissionDeclaration, PermissionLevel, StaticLibraryIndex};
    use crate::producers::fixtures;
    use std::collections::HashSet;

    fn run(yaml: &str) -> GenerationResult {
        let schema = fixtures::schema(yaml);
        generate(&schema, &StaticLibraryIndex::from_schema(&schema)).unwrap()
    }

    #[test]
    fn test_cg030_aws_end_to_end() {
        let result = run(fixtures::AWS_APP);
        // rest api 1, paths 3, lambda 3, routes 2x3, static 5, deployment 1,
        // cors 4 paths x4, scheduled 3, dns 5
        assert_eq!(result.resources.len(), 1 + 3 + 3 + 6 + 5 + 1 + 16 + 3 + 5);
        assert_eq!(result.report.completed, 1 + 3 + 1 + 2 + 1 + 1 + 1 + 1 + 1);
        assert!(result.digest.starts_with("blake3:"));

        let addresses: HashSet<String> = result.resources.iter().map(|r| r.address()).collect();
        assert_eq!(addresses.len(), result.resources.len(), "addresses are unique");
    }

    #[test]
    fn test_cg030_references_resolve() {
        let result = run(fixtures::AWS_APP);
        let addresses: HashSet<String> = result.resources.iter().map(|r| r.address()).collect();
        for resource in &result.resources {
            for dep in &resource.depends_on {
                assert!(addresses.contains(dep), "{} depends on missing {}", resource, dep);
            }
        }
    }

    #[test]
    fn test_cg030_manifest_exposes_outputs() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let result = generate(&schema, &StaticLibraryIndex::from_schema(&schema)).unwrap();
        let api = schema.api.as_ref().unwrap();
        let key = Entity::Deployment(api.resolved_deployment()).id();
        assert_eq!(key.as_str(), "deployment:shop-api");
        assert_eq!(result.manifest.get("deployment", &key).unwrap()["stage_name"], "v7");
        assert_eq!(result.manifest.outputs.len(), result.report.completed);
    }

    #[test]
    fn test_cg030_repeated_passes_identical() {
        let first = run(fixtures::AWS_APP);
        let second = run(fixtures::AWS_APP);
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.resources, second.resources);
    }

    #[test]
    fn test_cg030_azure_end_to_end() {
        let result = run(fixtures::AZURE_APP);
        let kinds: Vec<&str> = result.resources.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "azurerm_function_app",
                "azurerm_role_assignment",
                "azurerm_role_assignment",
                "local_file",
                "local_file"
            ]
        );
        assert_eq!(result.report.sweeps, 1);
    }

    #[test]
    fn test_cg030_library_declarations_reach_policy() {
        let schema = fixtures::schema(fixtures::AWS_APP);
        let library = StaticLibraryIndex::new(vec![PermissionDeclaration::new(
            DeclaredResource::SqsQueue {
                queue: "jobs".to_string(),
            },
            PermissionLevel::Write,
        )]);
        let result = generate(&schema, &library).unwrap();
        let policy = result
            .resources
            .iter()
            .find(|r| r.address() == "aws_iam_role_policy.users")
            .and_then(|r| r.fields["policy"].as_text())
            .unwrap();
        assert!(policy.contains("sqs:SendMessage"));
        assert!(policy.contains("arn:aws:sqs:us-east-1:123456789012:jobs"));
    }

    #[test]
    fn test_cg030_colliding_identifiers_abort_pass() {
        let yaml = fixtures::AWS_APP
            .replace("allow_cors: true", "allow_cors: false")
            .replace(
                "    - {path: \"/users\", method: POST, lambda: users}\n",
                "    - {path: \"/users\", method: POST, lambda: users}\n    - {path: /users-list, method: GET, lambda: users}\n    - {path: /users/list, method: GET, lambda: users}\n",
            );
        let schema = fixtures::schema(&yaml);
        assert_eq!(
            crate::core::parser::validate_schema(&schema)
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>(),
            vec!["paths '/users/list' and '/users-list' map to the same identifier 'users_list'"]
        );

        let err = generate(&schema, &StaticLibraryIndex::from_schema(&schema)).unwrap_err();
        match err {
            GenerationError::DuplicateResource { address, producer, .. } => {
                assert_eq!(address, "aws_api_gateway_resource.shop_api_users_list");
                assert_eq!(producer, "api_resource");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_cg030_colliding_cors_handlers_abort_pass() {
        let yaml = fixtures::AWS_APP.replace(
            "    - {path: \"/users\", method: POST, lambda: users}\n",
            "    - {path: \"/users\", method: POST, lambda: users}\n    - {path: /users-list, method: GET, lambda: users}\n    - {path: /users/list, method: GET, lambda: users}\n",
        );
        let schema = fixtures::schema(&yaml);
        let err = generate(&schema, &StaticLibraryIndex::from_schema(&schema)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "resource aws_api_gateway_method.shop_api_cors_options_users_list emitted by cors for 'api:shop-api' already exists"
        );
    }

    #[test]
    fn test_cg030_invalid_declaration_aborts() {
        let schema = fixtures::schema(fixtures::AZURE_APP);
        let library = StaticLibraryIndex::new(vec![PermissionDeclaration::new(
            DeclaredResource::S3Bucket {
                bucket: "b".to_string(),
            },
            PermissionLevel::Read,
        )
        .with_source("Lib.kt:9")]);
        let err = generate(&schema, &library).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lib.kt:9: s3_bucket permission is not supported on azure"
        );
    }
}
