//! CG-009: YAML parsing and validation.
//!
//! Parses app.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Routes and timers must reference declared lambdas
//! - Platform-specific features only on their platform
//! - Lambda limits within the provider's bounds
//! - Distinct names stay distinct after identifier normalization

use super::names;
use super::types::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, message: String) {
    errors.push(ValidationError { message });
}

/// Parse an app.yaml file from disk.
pub fn parse_schema_file(path: &Path) -> Result<Schema, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_schema(&content)
}

/// Parse an app.yaml from a string.
pub fn parse_schema(yaml: &str) -> Result<Schema, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed schema. Returns a list of errors (empty = valid).
pub fn validate_schema(schema: &Schema) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if schema.version != "1.0" {
        err(
            &mut errors,
            format!("version must be \"1.0\", got \"{}\"", schema.version),
        );
    }
    if schema.name.is_empty() {
        err(&mut errors, "name must not be empty".to_string());
    }
    if schema.platform == Platform::Aws {
        if schema.region.is_empty() {
            err(&mut errors, "aws platform requires a region".to_string());
        }
        if schema.account.is_empty() {
            err(&mut errors, "aws platform requires an account".to_string());
        }
    }

    validate_lambdas(schema, &mut errors);
    validate_routes(schema, &mut errors);
    validate_events(schema, &mut errors);
    validate_identifiers(schema, &mut errors);

    if schema.platform != Platform::Aws {
        if let Some(ref api) = schema.api {
            if api.allow_cors {
                err(&mut errors, format!("api '{}': cors is only supported on aws", api.name));
            }
            if api.dns.is_some() {
                err(&mut errors, format!("api '{}': dns alias is only supported on aws", api.name));
            }
        }
    }

    errors
}

fn validate_lambdas(schema: &Schema, errors: &mut Vec<ValidationError>) {
    for (id, lambda) in &schema.lambdas {
        if lambda.file.is_empty() {
            err(errors, format!("lambda '{}' has no file", id));
        }
        if lambda.handler.is_empty() {
            err(errors, format!("lambda '{}' has no handler", id));
        }
        if !(1..=900).contains(&lambda.timeout_sec) {
            err(
                errors,
                format!("lambda '{}' timeout {}s out of range 1..=900", id, lambda.timeout_sec),
            );
        }
        if lambda.memory_mb < 128 {
            err(
                errors,
                format!("lambda '{}' memory {}MB below 128MB", id, lambda.memory_mb),
            );
        }
        for decl in &lambda.permissions {
            if decl.resource.platform() != schema.platform {
                err(
                    errors,
                    format!(
                        "lambda '{}': {} permission is not supported on {} ({})",
                        id,
                        decl.resource.kind_name(),
                        schema.platform,
                        decl.location()
                    ),
                );
            }
        }
    }
    for decl in &schema.library_permissions {
        if decl.resource.platform() != schema.platform {
            err(
                errors,
                format!(
                    "library {} permission is not supported on {} ({})",
                    decl.resource.kind_name(),
                    schema.platform,
                    decl.location()
                ),
            );
        }
    }
}

fn validate_routes(schema: &Schema, errors: &mut Vec<ValidationError>) {
    let routes = &schema.routes;
    let has_routes = !routes.dynamic.is_empty() || !routes.statics.is_empty();
    if has_routes && schema.api.is_none() && schema.platform == Platform::Aws {
        err(errors, "routes require an 'api' section".to_string());
    }

    let mut seen = HashSet::new();
    for route in &routes.dynamic {
        if !schema.lambdas.contains_key(&route.lambda) {
            err(
                errors,
                format!(
                    "route {} /{} references unknown lambda '{}'",
                    route.method, route.path, route.lambda
                ),
            );
        }
        if !seen.insert((route.method, route.path.clone())) {
            err(errors, format!("duplicate route {} /{}", route.method, route.path));
        }
    }

    let mut seen_static = HashSet::new();
    for route in &routes.statics {
        if schema.platform != Platform::Aws {
            err(
                errors,
                format!("static route /{} is only supported on aws", route.path),
            );
        }
        if schema.bucket.is_none() {
            err(
                errors,
                format!("static route /{} requires a 'bucket'", route.path),
            );
        }
        if route.file.is_empty() {
            err(errors, format!("static route /{} has no file", route.path));
        }
        if !seen_static.insert(route.path.clone())
            || seen.contains(&(HttpMethod::Get, route.path.clone()))
        {
            err(errors, format!("duplicate route GET /{}", route.path));
        }
    }
}

fn validate_events(schema: &Schema, errors: &mut Vec<ValidationError>) {
    let mut ids = HashSet::new();
    for event in &schema.events.scheduled {
        if !ids.insert(event.id.as_str()) {
            err(errors, format!("duplicate scheduled event '{}'", event.id));
        }
        if event.cron.trim().is_empty() {
            err(errors, format!("scheduled event '{}' has an empty cron", event.id));
        }
        if !schema.lambdas.contains_key(&event.lambda) {
            err(
                errors,
                format!(
                    "scheduled event '{}' references unknown lambda '{}'",
                    event.id, event.lambda
                ),
            );
        }
    }
}

/// Reject distinct names that normalize to the same identifier. Every
/// producer derives its resource names from these, so one collision here
/// becomes several duplicate resources.
fn validate_identifiers(schema: &Schema, errors: &mut Vec<ValidationError>) {
    collisions(
        errors,
        "lambdas",
        "identifier",
        schema.lambdas.keys().map(|id| (id.clone(), names::tf(&[id]))),
    );
    collisions(
        errors,
        "lambdas",
        "function name",
        schema
            .lambdas
            .keys()
            .map(|id| (id.clone(), names::aws(&[&schema.name, id]))),
    );

    let mut paths: BTreeSet<UriPath> = BTreeSet::new();
    paths.insert(UriPath::root());
    for path in schema
        .routes
        .dynamic
        .iter()
        .map(|r| &r.path)
        .chain(schema.routes.statics.iter().map(|r| &r.path))
    {
        paths.extend(path.prefixes());
    }
    collisions(
        errors,
        "paths",
        "identifier",
        paths
            .iter()
            .map(|p| (format!("/{}", p), names::tf(&p.name_parts()))),
    );

    let events = &schema.events.scheduled;
    collisions(
        errors,
        "scheduled events",
        "identifier",
        events.iter().map(|e| (e.id.clone(), e.fq_id())),
    );
    collisions(
        errors,
        "scheduled events",
        "rule name",
        events
            .iter()
            .map(|e| (e.id.clone(), names::aws(&[schema.name.as_str(), e.fq_id().as_str()]))),
    );
}

/// Report every `(original, identifier)` pair whose identifier was already
/// taken by a different original.
fn collisions(
    errors: &mut Vec<ValidationError>,
    what: &str,
    target: &str,
    items: impl IntoIterator<Item = (String, String)>,
) {
    let mut seen: HashMap<String, String> = HashMap::new();
    for (original, identifier) in items {
        match seen.get(&identifier) {
            Some(first) if *first != original => err(
                errors,
                format!(
                    "{} '{}' and '{}' map to the same {} '{}'",
                    what, first, original, target, identifier
                ),
            ),
            Some(_) => {}
            None => {
                seen.insert(identifier, original);
            }
        }
    }
}
