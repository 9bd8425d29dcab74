//! CG-011: Permission aggregation.
//!
//! Raw declarations are expanded through a fixed kind → pattern table and
//! collected into a set, so identical grants from different places collapse.
//! A platform baseline grant is always appended. Read and Write on the same
//! pattern are kept as two grants; only an explicit ReadWrite declaration
//! produces ReadWrite.

use super::model::{AwsResource, AzureResource, Permission, PermissionLevel};
use crate::core::error::GenerationError;
use crate::core::types::{Platform, Schema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Aggregated grants per lambda id.
pub type Grants = BTreeMap<String, BTreeSet<Permission>>;

/// Resource named by a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclaredResource {
    S3Bucket { bucket: String },
    SsmParameters { prefix: String },
    #[serde(rename = "dynamodb_table")]
    DynamoDbTable { table: String },
    SqsQueue { queue: String },
    Cognito { user_pool: String },
    SecretManager { pattern: String },
    AzureResource { id: String },
    AzureStorageAccount { name: String, resource_group: String },
}

impl DeclaredResource {
    /// Declaration kind as written in the schema.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::S3Bucket { .. } => "s3_bucket",
            Self::SsmParameters { .. } => "ssm_parameters",
            Self::DynamoDbTable { .. } => "dynamodb_table",
            Self::SqsQueue { .. } => "sqs_queue",
            Self::Cognito { .. } => "cognito",
            Self::SecretManager { .. } => "secret_manager",
            Self::AzureResource { .. } => "azure_resource",
            Self::AzureStorageAccount { .. } => "azure_storage_account",
        }
    }

    /// Platform this kind belongs to.
    pub fn platform(&self) -> Platform {
        match self {
            Self::AzureResource { .. } | Self::AzureStorageAccount { .. } => Platform::Azure,
            _ => Platform::Aws,
        }
    }

    /// Expansion table: one declaration → one or more grants.
    pub fn expand(&self, level: PermissionLevel) -> Vec<Permission> {
        match self {
            Self::S3Bucket { bucket } => {
                vec![Permission::aws(AwsResource::S3, level, format!("{}/*", bucket))]
            }
            Self::SsmParameters { prefix } => vec![Permission::aws(
                AwsResource::Ssm,
                level,
                format!("parameter/{}*", prefix),
            )],
            // Tables and their secondary indexes are separate IAM resources.
            Self::DynamoDbTable { table } => vec![
                Permission::aws(AwsResource::DynamoDb, level, format!("table/{}", table)),
                Permission::aws(
                    AwsResource::DynamoDbIndex,
                    level,
                    format!("table/{}/index/*", table),
                ),
            ],
            Self::SqsQueue { queue } => {
                vec![Permission::aws(AwsResource::SqsQueue, level, queue.clone())]
            }
            Self::Cognito { user_pool } => vec![Permission::aws(
                AwsResource::Cognito,
                level,
                format!("userpool/{}", user_pool),
            )],
            Self::SecretManager { pattern } => {
                vec![Permission::aws(AwsResource::SecretManager, level, pattern.clone())]
            }
            Self::AzureResource { id } => {
                vec![Permission::azure(AzureResource::Resource, level, id.clone())]
            }
            Self::AzureStorageAccount {
                name,
                resource_group,
            } => vec![Permission::azure(
                AzureResource::StorageAccount,
                level,
                format!("{}/{}", resource_group, name),
            )],
        }
    }
}

/// A raw access declaration with its source attribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionDeclaration {
    #[serde(flatten)]
    pub resource: DeclaredResource,

    pub level: PermissionLevel,

    /// Where the front end found the declaration (e.g. `Users.kt:12`)
    #[serde(default)]
    pub source: Option<String>,
}

impl PermissionDeclaration {
    pub fn new(resource: DeclaredResource, level: PermissionLevel) -> Self {
        Self {
            resource,
            level,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn location(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| "<unknown location>".to_string())
    }
}

/// Grant every application on a platform receives.
pub fn baseline(platform: Platform) -> Permission {
    match platform {
        Platform::Aws => {
            Permission::aws(AwsResource::CloudWatchLogs, PermissionLevel::ReadWrite, "*")
        }
        Platform::Azure => Permission::azure(AzureResource::Insights, PermissionLevel::Write, "*"),
    }
}

/// Reduce declarations to the minimal set of grants for `platform`.
pub fn aggregate<'d, I>(declarations: I, platform: Platform) -> Result<BTreeSet<Permission>, GenerationError>
where
    I: IntoIterator<Item = &'d PermissionDeclaration>,
{
    let mut grants = BTreeSet::new();
    for decl in declarations {
        if decl.resource.platform() != platform {
            return Err(GenerationError::InvalidDeclaration {
                kind: decl.resource.kind_name(),
                platform,
                location: decl.location(),
            });
        }
        grants.extend(decl.resource.expand(decl.level));
    }
    grants.insert(baseline(platform));
    Ok(grants)
}

// ============================================================================
// Library index
// ============================================================================

/// Source of declarations found outside directly visited code
/// (whole-module scans of libraries the application links).
pub trait LibraryIndex {
    fn declarations(&self, schema: &Schema) -> Vec<PermissionDeclaration>;
}

/// Library index backed by a pre-computed list.
#[derive(Debug, Clone, Default)]
pub struct StaticLibraryIndex {
    declarations: Vec<PermissionDeclaration>,
}

impl StaticLibraryIndex {
    pub fn new(declarations: Vec<PermissionDeclaration>) -> Self {
        Self { declarations }
    }

    /// Index holding the schema's `library_permissions`.
    pub fn from_schema(schema: &Schema) -> Self {
        Self::new(schema.library_permissions.clone())
    }

    /// Load a YAML list of declarations.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read library index {}: {}", path.display(), e))?;
        let declarations: Vec<PermissionDeclaration> = serde_yaml_ng::from_str(&content)
            .map_err(|e| format!("invalid library index {}: {}", path.display(), e))?;
        Ok(Self::new(declarations))
    }

    /// Append another index's declarations.
    pub fn merge(mut self, other: StaticLibraryIndex) -> Self {
        self.declarations.extend(other.declarations);
        self
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl LibraryIndex for StaticLibraryIndex {
    fn declarations(&self, _schema: &Schema) -> Vec<PermissionDeclaration> {
        self.declarations.clone()
    }
}

/// Grants for every lambda: its own declarations plus every library one.
pub fn grants_for_schema(schema: &Schema, library: &dyn LibraryIndex) -> Result<Grants, GenerationError> {
    let shared = library.declarations(schema);
    let mut grants = Grants::new();
    for (id, lambda) in &schema.lambdas {
        let set = aggregate(lambda.permissions.iter().chain(shared.iter()), schema.platform)?;
        tracing::debug!(lambda = %id, grants = set.len(), "aggregated permissions");
        grants.insert(id.clone(), set);
    }
    Ok(grants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::model::ResourceKind;
    use proptest::prelude::*;

    fn table(name: &str, level: PermissionLevel) -> PermissionDeclaration {
        PermissionDeclaration::new(
            DeclaredResource::DynamoDbTable {
                table: name.to_string(),
            },
            level,
        )
    }

    fn bucket(name: &str, level: PermissionLevel) -> PermissionDeclaration {
        PermissionDeclaration::new(
            DeclaredResource::S3Bucket {
                bucket: name.to_string(),
            },
            level,
        )
    }

    fn without_baseline(set: BTreeSet<Permission>, platform: Platform) -> BTreeSet<Permission> {
        let base = baseline(platform);
        set.into_iter().filter(|p| *p != base).collect()
    }

    #[test]
    fn test_cg011_dynamodb_table_expands_to_two() {
        let grants = aggregate(&[table("Orders", PermissionLevel::Write)], Platform::Aws).unwrap();
        let grants = without_baseline(grants, Platform::Aws);
        assert_eq!(grants.len(), 2);
        assert!(grants.contains(&Permission::aws(
            AwsResource::DynamoDb,
            PermissionLevel::Write,
            "table/Orders"
        )));
        assert!(grants.contains(&Permission::aws(
            AwsResource::DynamoDbIndex,
            PermissionLevel::Write,
            "table/Orders/index/*"
        )));
    }

    #[test]
    fn test_cg011_bucket_pattern() {
        let grants = aggregate(&[bucket("site", PermissionLevel::Read)], Platform::Aws).unwrap();
        assert!(grants.contains(&Permission::aws(AwsResource::S3, PermissionLevel::Read, "site/*")));
    }

    #[test]
    fn test_cg011_expansion_table() {
        let cases = [
            (
                DeclaredResource::SsmParameters { prefix: "app/".into() },
                AwsResource::Ssm,
                "parameter/app/*",
            ),
            (DeclaredResource::SqsQueue { queue: "jobs".into() }, AwsResource::SqsQueue, "jobs"),
            (
                DeclaredResource::Cognito { user_pool: "pool1".into() },
                AwsResource::Cognito,
                "userpool/pool1",
            ),
            (
                DeclaredResource::SecretManager { pattern: "db-*".into() },
                AwsResource::SecretManager,
                "db-*",
            ),
        ];
        for (resource, kind, pattern) in cases {
            let expanded = resource.expand(PermissionLevel::Read);
            assert_eq!(expanded, vec![Permission::aws(kind, PermissionLevel::Read, pattern)]);
        }
        let storage = DeclaredResource::AzureStorageAccount {
            name: "acct".into(),
            resource_group: "rg".into(),
        };
        assert_eq!(
            storage.expand(PermissionLevel::Write),
            vec![Permission::azure(AzureResource::StorageAccount, PermissionLevel::Write, "rg/acct")]
        );
    }

    #[test]
    fn test_cg011_baseline_on_empty_input() {
        let none: [PermissionDeclaration; 0] = [];
        let aws = aggregate(&none, Platform::Aws).unwrap();
        assert_eq!(aws.len(), 1);
        assert!(aws.contains(&Permission::aws(
            AwsResource::CloudWatchLogs,
            PermissionLevel::ReadWrite,
            "*"
        )));
        let azure = aggregate(&none, Platform::Azure).unwrap();
        assert_eq!(azure.len(), 1);
        assert!(matches!(
            azure.iter().next().map(|p| p.kind),
            Some(ResourceKind::Azure(AzureResource::Insights))
        ));
    }

    #[test]
    fn test_cg011_duplicates_collapse() {
        let a = bucket("site", PermissionLevel::Read);
        let once = aggregate(&[a.clone()], Platform::Aws).unwrap();
        let twice = aggregate(&[a.clone(), a.with_source("Other.kt:3")], Platform::Aws).unwrap();
        assert_eq!(once, twice);
        assert_eq!(without_baseline(twice, Platform::Aws).len(), 1);
    }

    #[test]
    fn test_cg011_read_and_write_not_unioned() {
        let grants = aggregate(
            &[bucket("site", PermissionLevel::Read), bucket("site", PermissionLevel::Write)],
            Platform::Aws,
        )
        .unwrap();
        let grants = without_baseline(grants, Platform::Aws);
        assert_eq!(grants.len(), 2);
        assert!(grants.iter().all(|p| p.level != PermissionLevel::ReadWrite));
    }

    #[test]
    fn test_cg011_wrong_platform_reports_source() {
        let decl = bucket("site", PermissionLevel::Read).with_source("Users.kt:12");
        let err = aggregate(&[decl], Platform::Azure).unwrap_err();
        match err {
            GenerationError::InvalidDeclaration {
                kind,
                platform,
                location,
            } => {
                assert_eq!(kind, "s3_bucket");
                assert_eq!(platform, Platform::Azure);
                assert_eq!(location, "Users.kt:12");
            }
            other => panic!("expected invalid declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_cg011_declaration_yaml() {
        let yaml = r#"
- kind: dynamodb_table
  table: Orders
  level: write
  source: Orders.kt:4
- kind: azure_storage_account
  name: acct
  resource_group: rg
  level: read_write
"#;
        let decls: Vec<PermissionDeclaration> = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].resource.kind_name(), "dynamodb_table");
        assert_eq!(decls[0].source.as_deref(), Some("Orders.kt:4"));
        assert_eq!(decls[1].level, PermissionLevel::ReadWrite);
        assert_eq!(decls[1].resource.platform(), Platform::Azure);
    }

    #[test]
    fn test_cg011_grants_for_schema_adds_library() {
        let schema: Schema = serde_yaml_ng::from_str(
            r#"
version: "1.0"
name: lib
region: eu-west-1
account: "1"
lambdas:
  a:
    file: a.jar
    handler: A
    permissions:
      - {kind: sqs_queue, queue: jobs, level: write}
  b:
    file: b.jar
    handler: B
library_permissions:
  - {kind: s3_bucket, bucket: shared, level: read}
"#,
        )
        .unwrap();
        let library = StaticLibraryIndex::from_schema(&schema);
        let grants = grants_for_schema(&schema, &library).unwrap();
        assert_eq!(grants["a"].len(), 3);
        assert_eq!(grants["b"].len(), 2);
        let shared = Permission::aws(AwsResource::S3, PermissionLevel::Read, "shared/*");
        assert!(grants["a"].contains(&shared));
        assert!(grants["b"].contains(&shared));
    }

    #[test]
    fn test_cg011_library_index_load_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.yaml");
        std::fs::write(&path, "- {kind: cognito, user_pool: p, level: read}\n").unwrap();
        let loaded = StaticLibraryIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        let merged = StaticLibraryIndex::default().merge(loaded);
        assert!(!merged.is_empty());
        assert!(StaticLibraryIndex::load(&dir.path().join("missing.yaml")).is_err());
    }

    fn arb_declaration() -> impl Strategy<Value = PermissionDeclaration> {
        let level = prop_oneof![
            Just(PermissionLevel::Read),
            Just(PermissionLevel::Write),
            Just(PermissionLevel::ReadWrite)
        ];
        let resource = prop_oneof![
            "[a-z]{1,4}".prop_map(|bucket| DeclaredResource::S3Bucket { bucket }),
            "[a-z]{1,4}".prop_map(|table| DeclaredResource::DynamoDbTable { table }),
            "[a-z]{1,4}".prop_map(|queue| DeclaredResource::SqsQueue { queue }),
        ];
        (resource, level).prop_map(|(r, l)| PermissionDeclaration::new(r, l))
    }

    proptest! {
        #[test]
        fn prop_aggregate_idempotent(decls in proptest::collection::vec(arb_declaration(), 0..8)) {
            let once = aggregate(&decls, Platform::Aws).unwrap();
            let doubled: Vec<_> = decls.iter().chain(decls.iter()).cloned().collect();
            prop_assert_eq!(&once, &aggregate(&doubled, Platform::Aws).unwrap());
        }

        #[test]
        fn prop_aggregate_order_independent(decls in proptest::collection::vec(arb_declaration(), 0..8)) {
            let forward = aggregate(&decls, Platform::Aws).unwrap();
            let reversed: Vec<_> = decls.iter().rev().cloned().collect();
            prop_assert_eq!(forward, aggregate(&reversed, Platform::Aws).unwrap());
        }
    }
}
