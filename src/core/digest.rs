//! CG-007: BLAKE3 content hashing of emitted resources.

use super::resource::{FieldValue, ResourceDef};

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// First 12 hex characters of the BLAKE3 hash of `s`, for identifiers.
pub fn short_hash(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex()[..12].to_string()
}

/// Compute a composite hash from multiple component hashes.
pub fn composite_hash(components: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in components {
        hasher.update(c.as_bytes());
        hasher.update(b"\0");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

fn write_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Text(s) => {
            out.push_str("s:");
            out.push_str(s);
        }
        FieldValue::Number(n) => out.push_str(&format!("n:{}", n)),
        FieldValue::Bool(b) => out.push_str(&format!("b:{}", b)),
        FieldValue::Ref(r) => {
            out.push_str("r:");
            out.push_str(r);
        }
        FieldValue::Expr(e) => {
            out.push_str("e:");
            out.push_str(e);
        }
        FieldValue::Map(entries) => {
            out.push('{');
            for (k, v) in entries {
                out.push_str(k);
                out.push('=');
                write_value(out, v);
                out.push('\u{1f}');
            }
            out.push('}');
        }
        FieldValue::List(items) => {
            out.push('[');
            for v in items {
                write_value(out, v);
                out.push('\u{1f}');
            }
            out.push(']');
        }
    }
}

/// Canonical text of a resource: address, fields in order, dependencies.
fn canonical(resource: &ResourceDef) -> String {
    let mut out = resource.address();
    out.push('\n');
    for (key, value) in &resource.fields {
        out.push_str(key);
        out.push('=');
        write_value(&mut out, value);
        out.push('\n');
    }
    for dep in &resource.depends_on {
        out.push_str("depends_on=");
        out.push_str(dep);
        out.push('\n');
    }
    out
}

/// Content hash of one resource.
pub fn hash_resource(resource: &ResourceDef) -> String {
    hash_string(&canonical(resource))
}

/// Digest of a resource list, order sensitive.
pub fn hash_resources(resources: &[ResourceDef]) -> String {
    let hashes: Vec<String> = resources.iter().map(hash_resource).collect();
    let refs: Vec<&str> = hashes.iter().map(String::as_str).collect();
    composite_hash(&refs)
}
