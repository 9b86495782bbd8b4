//! Subcommands and the input handling they share

pub mod bench;
pub mod check;
pub mod eval;

use anyhow::{Context, Result};
use sluice_runtime::EngineConfig;
use sluice_shared::{Document, FlagSet, ReplicationFlag};
use std::io::Read;
use std::path::Path;

/// Read a filter given inline or as `@path`.
pub fn read_filter(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter from {}", path)),
        None => Ok(arg.to_string()),
    }
}

/// Read a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_document(path: &Path, fallback_id: &str) -> Result<Document> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document from {}", path.display()))?
    };
    parse_document(&text, fallback_id)
}

pub fn parse_document(text: &str, fallback_id: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(text).context("Document is not valid JSON")?;
    Ok(Document::from_json(value, fallback_id)?)
}

/// Load engine limits, letting `--timeout` override the configured budget.
pub fn load_config(path: Option<&Path>, timeout: Option<&str>) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(path)?;
    if let Some(timeout) = timeout {
        let budget =
            sluice_shared::utils::parse_duration(timeout).context("Failed to parse timeout")?;
        config.execution_timeout_ms = budget.as_millis() as u64;
        config.validate().context("Invalid timeout")?;
    }
    Ok(config)
}

pub fn flags(deleted: bool, access_removed: bool) -> FlagSet {
    let mut flags = FlagSet::empty();
    if deleted {
        flags.insert(ReplicationFlag::Deleted);
    }
    if access_removed {
        flags.insert(ReplicationFlag::AccessRemoved);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inline_filter() {
        assert_eq!(read_filter("(doc) => true").unwrap(), "(doc) => true");
    }

    #[test]
    fn test_filter_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "function (doc) {{ return true; }}").unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(read_filter(&arg).unwrap(), "function (doc) { return true; }");
    }

    #[test]
    fn test_missing_filter_file() {
        assert!(read_filter("@/nonexistent/filter.js").is_err());
    }

    #[test]
    fn test_document_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"_id": "d1", "tags": ["a"]}}"#).unwrap();
        let doc = read_document(file.path(), "fallback").unwrap();
        assert_eq!(doc.id, "d1");
    }

    #[test]
    fn test_document_must_be_object() {
        assert!(parse_document("[1, 2]", "x").is_err());
        assert!(parse_document("{not json", "x").is_err());
    }

    #[test]
    fn test_flags() {
        assert!(flags(false, false).is_empty());
        let both = flags(true, true);
        assert!(both.deleted() && both.access_removed());
    }

    #[test]
    fn test_timeout_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "execution_timeout_ms = 1000").unwrap();
        let config = load_config(Some(file.path()), Some("250ms")).unwrap();
        assert_eq!(config.execution_timeout_ms, 250);

        assert!(load_config(Some(file.path()), Some("2h")).is_err());
    }
}
