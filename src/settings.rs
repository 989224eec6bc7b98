use crate::error::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REWIND_MARGIN: f64 = 30.0;

/// Knobs for one partition path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Log-likelihood units the best-minus-margin step may sit below the best.
    pub rewind_margin: f64,
    /// Path index rows must carry when they have a `path_index` column.
    /// `None` disables the check, e.g. for paths merged from several indices.
    pub initial_path_index: Option<i64>,
    /// Report identifiers longer than three characters as `o`.
    pub abbreviate_ids: bool,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            rewind_margin: DEFAULT_REWIND_MARGIN,
            initial_path_index: Some(0),
            abbreviate_ids: true,
        }
    }
}

impl PathSettings {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_to_path(&self, path: &str) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: PathSettings = serde_json::from_str(r#"{"rewind_margin": 5.0}"#).unwrap();
        assert_eq!(settings.rewind_margin, 5.0);
        assert_eq!(settings.initial_path_index, Some(0));
        assert!(settings.abbreviate_ids);
    }

    #[test]
    fn test_settings_file_round_trip() -> Result<()> {
        let td = tempdir()?;
        let path = td.path().join("settings.json");
        let path = path.to_string_lossy();
        let settings = PathSettings {
            rewind_margin: 12.5,
            initial_path_index: None,
            abbreviate_ids: false,
        };
        settings.save_to_path(&path)?;
        assert_eq!(PathSettings::load_from_path(&path)?, settings);
        Ok(())
    }
}
