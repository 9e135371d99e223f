//! Anchor and path mapping tables, and the translation glossary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::errors::{DocsError, Result};

/// Tables bundled with the binary
const BUILTIN_MAPPINGS: &str = include_str!("../../config/mappings.json");

/// Exact-match, case-sensitive string dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: BTreeMap<String, String>,
}

impl MappingTable {
    /// Mapped value for an exact `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Strip leading and trailing `/` from keys and values so `/controllers`
    /// and `controllers` address the same page
    fn normalize_paths(self) -> Self {
        let entries = self
            .entries
            .into_iter()
            .map(|(k, v)| (k.trim_matches('/').to_string(), v.trim_matches('/').to_string()))
            .collect();
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Anchor names and URL path segments, loaded once per run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// English anchor to Chinese anchor
    #[serde(default)]
    pub anchors: MappingTable,
    /// Single URL segment to site path
    #[serde(default)]
    pub paths: MappingTable,
}

impl MappingConfig {
    /// Tables bundled with the binary
    pub fn builtin() -> Result<Self> {
        let config: Self = serde_json::from_str(BUILTIN_MAPPINGS)?;
        Ok(config.finish())
    }

    /// Load tables from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_structured(path.as_ref())?;
        info!(
            "Loaded {} anchor mappings and {} path mappings from {}",
            config.anchors.len(),
            config.paths.len(),
            path.as_ref().display()
        );
        Ok(config.finish())
    }

    /// Load from `path` when given, the built-in tables otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    fn finish(mut self) -> Self {
        self.paths = self.paths.normalize_paths();

        for (key, value) in self.anchors.iter() {
            if let Some(next) = self.anchors.get(value) {
                if next != value {
                    warn!("Anchor mapping chain #{} -> #{} -> #{}", key, value, next);
                }
            }
        }

        self
    }
}

/// English term to mandated Chinese translation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
}

impl Glossary {
    /// Load a flat term dictionary from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let glossary: Self = read_structured(path.as_ref())?;
        info!("Loaded glossary with {} terms", glossary.len());
        Ok(glossary)
    }

    /// Load from `path` when given, an empty glossary otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No glossary configured");
                Ok(Self::default())
            }
        }
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether no term is configured
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Glossary section appended to the system prompt
    pub fn prompt_section(&self) -> String {
        if self.terms.is_empty() {
            return String::new();
        }

        let mut section = String::from("\nTerminology / Glossary (Must Follow):\n");
        for (term, translation) in &self.terms {
            section.push_str(&format!("- {}: {}\n", term, translation));
        }
        section
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Deserialize JSON, or YAML when the extension says so
fn read_structured<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(DocsError::config(format!(
            "Mapping file '{}' does not exist",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| DocsError::file(path, e))?;
    let is_yaml = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "yaml" || ext == "yml"
        })
        .unwrap_or(false);

    if is_yaml {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}
