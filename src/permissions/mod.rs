//! Access grants: declaration model, aggregation, and policy rendering.
//!
//! Declarations arrive from the front end (per lambda) and from library
//! scans. They are reduced to minimal grant sets before generation starts.

pub mod aggregator;
pub mod model;
pub mod policy;

pub use aggregator::{
    aggregate, baseline, grants_for_schema, DeclaredResource, Grants, LibraryIndex,
    PermissionDeclaration, StaticLibraryIndex,
};
pub use model::{AwsResource, AzureResource, Permission, PermissionLevel, ResourceKind};
