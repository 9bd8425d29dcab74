//! CG-008: Graph file. Load, save (atomic), path derivation.

use super::context::Manifest;
use super::resource::ResourceDef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const GRAPH_FILE: &str = "graph.json";

/// Emitted resource graph as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    /// File format version
    pub schema: String,

    /// Application name
    pub app: String,

    /// When the graph was generated
    pub generated_at: String,

    /// Generator name and version
    pub generator: String,

    /// BLAKE3 digest of `resources`
    pub digest: String,

    pub resources: Vec<ResourceDef>,

    #[serde(default)]
    pub outputs: Manifest,
}

impl GraphFile {
    pub fn new(app: &str, digest: String, resources: Vec<ResourceDef>, outputs: Manifest) -> Self {
        Self {
            schema: "1.0".to_string(),
            app: app.to_string(),
            generated_at: now_iso8601(),
            generator: format!("cloudgen {}", env!("CARGO_PKG_VERSION")),
            digest,
            resources,
            outputs,
        }
    }
}

/// Derive the graph file path within the output directory.
pub fn graph_file_path(out_dir: &Path) -> PathBuf {
    out_dir.join(GRAPH_FILE)
}

/// Load the stored graph. Returns None if the file doesn't exist.
pub fn load_graph(out_dir: &Path) -> Result<Option<GraphFile>, String> {
    let path = graph_file_path(out_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let graph: GraphFile = serde_json::from_str(&content)
        .map_err(|e| format!("invalid graph file {}: {}", path.display(), e))?;
    Ok(Some(graph))
}

/// Save the graph atomically (write to temp, then rename).
pub fn save_graph(out_dir: &Path, graph: &GraphFile) -> Result<PathBuf, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create dir {}: {}", out_dir.display(), e))?;
    let path = graph_file_path(out_dir);

    let json = serde_json::to_string_pretty(graph).map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    tracing::debug!(path = %path.display(), resources = graph.resources.len(), "graph saved");
    Ok(path)
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

/// Format seconds since the epoch. Civil date from day count, proleptic
/// Gregorian calendar.
pub fn format_utc(secs: u64) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    // Shift to an era starting 0000-03-01.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::FieldValue;

    fn make_graph() -> GraphFile {
        let resources = vec![
            ResourceDef::new("aws_iam_role", "users").field("name", "shop-users"),
            ResourceDef::new("aws_lambda_function", "users")
                .field("role", FieldValue::reference("aws_iam_role.users.arn")),
        ];
        GraphFile::new("shop", "blake3:abc".to_string(), resources, Manifest::default())
    }

    #[test]
    fn test_cg008_graph_file_path() {
        let p = graph_file_path(Path::new("/out"));
        assert_eq!(p, PathBuf::from("/out/graph.json"));
    }

    #[test]
    fn test_cg008_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let graph = make_graph();
        save_graph(dir.path(), &graph).unwrap();

        let loaded = load_graph(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, graph);
        assert_eq!(
            loaded.resources[1].fields["role"],
            FieldValue::reference("aws_iam_role.users.arn")
        );
    }

    #[test]
    fn test_cg008_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_graph(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_cg008_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let path = save_graph(&out, &make_graph()).unwrap();
        assert!(path.exists());
        assert!(!out.join("graph.json.tmp").exists());
    }

    #[test]
    fn test_cg008_invalid_graph_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GRAPH_FILE), "{not json").unwrap();
        let err = load_graph(dir.path()).unwrap_err();
        assert!(err.contains("invalid graph file"));
    }

    #[test]
    fn test_cg008_new_graph_metadata() {
        let graph = make_graph();
        assert_eq!(graph.schema, "1.0");
        assert!(graph.generator.starts_with("cloudgen "));
        assert!(graph.generated_at.contains('T'));
    }

    #[test]
    fn test_cg008_format_utc() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_utc(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(format_utc(1_771_250_400), "2026-02-16T14:00:00Z");
    }
}
