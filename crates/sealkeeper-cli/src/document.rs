//! Loads a declarative config document from disk.
//!
//! Format is detected from the file extension: `.json` is parsed with
//! `serde_json`, everything else (`.yml`, `.yaml`, or no extension) with
//! `serde_yaml`. Both paths deserialize into [`sealkeeper_reconcile::Config`],
//! whose fields reject unknown top-level keys.

use std::path::Path;

use anyhow::{Context, Result};
use sealkeeper_reconcile::Config;

pub fn load(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config document at {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {} as JSON", path.display()))
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {} as YAML", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn yaml_extension_parses_as_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "policies:\n  - name: p\n    rules: \"\"").unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.policies.len(), 1);
    }

    #[test]
    fn json_extension_parses_as_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"policies": [{{"name": "p", "rules": ""}}]}}"#).unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.policies.len(), 1);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "bogus: true").unwrap();
        assert!(load(file.path()).is_err());
    }
}
