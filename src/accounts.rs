// Identity source - server/user pairs from the ofxget-style user config
//
// The config is an INI file maintained by the fetch tooling: one section per
// server plus a reserved DEFAULT section that callers must skip. Only the
// pieces the pipeline needs are parsed here (sections, key = value lines,
// comma lists).

use crate::cfg::{self, Config};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs;

// ============================================================================
// USER CONFIG
// ============================================================================

/// Parsed user config: ordered server sections with key -> value settings.
#[derive(Debug, Clone, Default)]
pub struct UserConfig {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl UserConfig {
    /// Parse INI text. Unknown constructs (blank lines, `#`/`;` comments,
    /// keys outside a section) are skipped rather than rejected; the fetch
    /// tooling owns the file format.
    pub fn parse(text: &str) -> UserConfig {
        let mut sections: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut current: Option<String> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some(section) = current.as_ref() else {
                continue;
            };
            if let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        UserConfig { sections }
    }

    /// Setting lookup within a section.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_str())
    }

    /// All sections in file order, DEFAULT included.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &IndexMap<String, String>)> {
        self.sections
            .iter()
            .map(|(name, settings)| (name.as_str(), settings))
    }

    /// Configured servers in file order, with the reserved DEFAULT section
    /// skipped.
    pub fn servers(&self) -> impl Iterator<Item = (&str, &IndexMap<String, String>)> {
        self.sections()
            .filter(|(name, _)| !cfg::is_default_server(name))
    }
}

/// Split an INI comma-list value into trimmed entries.
pub fn convert_list(value: &str) -> Vec<String> {
    value.split(',').map(|sub| sub.trim().to_string()).collect()
}

/// Load and parse the user config file named by `cfg`.
pub fn get_user_cfg(cfg: &Config) -> Result<UserConfig> {
    let text = fs::read_to_string(&cfg.user_cfg)
        .with_context(|| format!("reading user config {}", cfg.user_cfg.display()))?;
    Ok(UserConfig::parse(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[DEFAULT]
prettyprint = true

[vanguard]
user = jane
savings = 1234, 5678

; comment
[chase]
user: jdoe
";

    #[test]
    fn test_sections_in_file_order() {
        let cfg = UserConfig::parse(SAMPLE);
        let names: Vec<&str> = cfg.sections().map(|(name, _)| name).collect();
        assert_eq!(names, ["DEFAULT", "vanguard", "chase"]);
    }

    #[test]
    fn test_servers_skip_default() {
        let cfg = UserConfig::parse(SAMPLE);
        let names: Vec<&str> = cfg.servers().map(|(name, _)| name).collect();
        assert_eq!(names, ["vanguard", "chase"]);
    }

    #[test]
    fn test_key_value_styles() {
        let cfg = UserConfig::parse(SAMPLE);
        assert_eq!(cfg.get("vanguard", "user"), Some("jane"));
        assert_eq!(cfg.get("chase", "user"), Some("jdoe"));
        assert_eq!(cfg.get("vanguard", "missing"), None);
    }

    #[test]
    fn test_convert_list() {
        assert_eq!(convert_list("1234, 5678 ,9"), ["1234", "5678", "9"]);
        assert_eq!(convert_list("solo"), ["solo"]);
    }
}
