//! CG-001: Application schema types.
//!
//! The abstract schema handed over by the front end: routes, lambdas, static
//! assets, scheduled triggers and raw permission declarations. All types
//! derive Serialize/Deserialize for YAML roundtripping.

use crate::permissions::PermissionDeclaration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level app.yaml
// ============================================================================

/// Root schema: the resolved description of one cloud application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Application name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Target cloud platform
    #[serde(default)]
    pub platform: Platform,

    /// Deployment region (used by permission globs)
    #[serde(default)]
    pub region: String,

    /// Account (AWS) or subscription (Azure) identifier
    #[serde(default)]
    pub account: String,

    /// Bucket holding static assets
    #[serde(default)]
    pub bucket: Option<String>,

    /// HTTP API definition
    #[serde(default)]
    pub api: Option<ApiSpec>,

    /// Lambdas keyed by id (order-preserving)
    #[serde(default)]
    pub lambdas: IndexMap<String, LambdaSpec>,

    /// HTTP routes
    #[serde(default)]
    pub routes: Routes,

    /// Event sources
    #[serde(default)]
    pub events: Events,

    /// Declarations found outside directly visited code
    #[serde(default)]
    pub library_permissions: Vec<PermissionDeclaration>,
}

// ============================================================================
// Platform
// ============================================================================

/// Target cloud platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Aws,
    Azure,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => write!(f, "aws"),
            Self::Azure => write!(f, "azure"),
        }
    }
}

// ============================================================================
// API
// ============================================================================

/// REST API with optional deployment settings and DNS alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    /// API name
    pub name: String,

    /// Emit OPTIONS handlers for cross-origin requests
    #[serde(default)]
    pub allow_cors: bool,

    /// Deployment settings
    #[serde(default)]
    pub deployment: DeploymentSpec,

    /// DNS alias for the API
    #[serde(default)]
    pub dns: Option<DnsSpec>,
}

impl ApiSpec {
    /// Deployment with its name resolved (defaults to the API name).
    pub fn resolved_deployment(&self) -> DeploymentSpec {
        DeploymentSpec {
            name: Some(self.deployment_name().to_string()),
            version: self.deployment.version.clone(),
        }
    }

    /// Name of the deployment, falling back to the API name.
    pub fn deployment_name(&self) -> &str {
        self.deployment.name.as_deref().unwrap_or(&self.name)
    }
}

/// Deployment of the REST API. Recreated on every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Deployment name (defaults to the API name)
    #[serde(default)]
    pub name: Option<String>,

    /// Version, used as stage name
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for DeploymentSpec {
    fn default() -> Self {
        Self {
            name: None,
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    "1".to_string()
}

/// DNS alias for the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsSpec {
    /// Alias record name
    pub alias: String,

    /// Hosted zone
    pub zone: String,

    /// Certificate domain (defaults to `alias.zone`)
    #[serde(default)]
    pub certificate: Option<String>,
}

impl DnsSpec {
    /// Fully qualified domain name of the alias.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.alias, self.zone)
    }

    /// Certificate domain, defaulting to the alias FQDN.
    pub fn certificate_domain(&self) -> String {
        self.certificate.clone().unwrap_or_else(|| self.fqdn())
    }
}

// ============================================================================
// Lambdas
// ============================================================================

/// A deployable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaSpec {
    /// Packaged artifact path
    pub file: String,

    /// Entry point
    pub handler: String,

    /// Memory in megabytes
    #[serde(default = "default_memory")]
    pub memory_mb: u32,

    /// Execution limit in seconds
    #[serde(default = "default_timeout")]
    pub timeout_sec: u32,

    /// Runtime identifier
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Extra environment
    #[serde(default)]
    pub environment: IndexMap<String, String>,

    /// Permission declarations found in this lambda's code
    #[serde(default)]
    pub permissions: Vec<PermissionDeclaration>,
}

fn default_memory() -> u32 {
    1024
}

fn default_timeout() -> u32 {
    300
}

fn default_runtime() -> String {
    "java11".to_string()
}

impl LambdaSpec {
    /// Directory containing the packaged artifact.
    pub fn artifact_dir(&self) -> &str {
        match self.file.rfind('/') {
            Some(0) => "/",
            Some(idx) => &self.file[..idx],
            None => ".",
        }
    }

    /// `relative` placed next to the packaged artifact.
    pub fn beside_artifact(&self, relative: &str) -> String {
        match self.artifact_dir() {
            "/" => format!("/{}", relative),
            dir => format!("{}/{}", dir, relative),
        }
    }

    /// File name of the packaged artifact.
    pub fn artifact_name(&self) -> &str {
        match self.file.rfind('/') {
            Some(idx) => &self.file[idx + 1..],
            None => &self.file,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// HTTP routes of the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routes {
    /// Routes served by a lambda
    #[serde(default)]
    pub dynamic: Vec<DynamicRoute>,

    /// Routes served from the static bucket
    #[serde(default, rename = "static")]
    pub statics: Vec<StaticRoute>,
}

/// Route dispatched to a lambda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRoute {
    pub path: UriPath,
    pub method: HttpMethod,
    /// Target lambda id
    pub lambda: String,
}

/// Route answered with a static file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub path: UriPath,
    /// Local file uploaded to the bucket
    pub file: String,
    /// Content type
    #[serde(default = "default_mime")]
    pub mime: String,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Resource path of an HTTP route, stored without leading slash.
///
/// The root path has no segments and displays as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UriPath {
    parts: Vec<String>,
}

impl UriPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/a/b/{c}` into segments. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            parts: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<UriPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// Every non-root prefix, shortest first (`a`, `a/b`, `a/b/c`).
    pub fn prefixes(&self) -> Vec<UriPath> {
        (1..=self.parts.len())
            .map(|n| Self {
                parts: self.parts[..n].to_vec(),
            })
            .collect()
    }

    /// Segments for identifier generation; `{id}` becomes `id_param`.
    pub fn name_parts(&self) -> Vec<String> {
        self.parts
            .iter()
            .map(|p| match p.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(var) => format!("{}_param", var),
                None => p.clone(),
            })
            .collect()
    }
}

impl fmt::Display for UriPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("/"))
    }
}

impl TryFrom<String> for UriPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !value.starts_with('/') {
            return Err(format!("path must start with '/': {}", value));
        }
        Ok(Self::parse(&value))
    }
}

impl From<UriPath> for String {
    fn from(path: UriPath) -> Self {
        format!("/{}", path)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event sources of the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    #[serde(default)]
    pub scheduled: Vec<ScheduledEvent>,
}

/// Timer that invokes a lambda on a cron schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub cron: String,
    /// Target lambda id
    pub lambda: String,
}

impl ScheduledEvent {
    /// Fully qualified id, unique across the application.
    pub fn fq_id(&self) -> String {
        crate::core::names::tf(&["timer", self.id.as_str()])
    }
}

// ============================================================================
// Tests
// ============================================================================
