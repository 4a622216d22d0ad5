//! Configuration file parsing for `snake.toml`.
//!
//! Searches the current directory then its ancestors. Missing files fall back
//! to defaults; command-line flags override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "snake.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct SnakeConfig {
    #[serde(default)]
    pub run: RunSection,
}

/// The `[run]` table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RunSection {
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_desnake")]
    pub desnake: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_call_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instructions: Option<u64>,
}

fn default_desnake() -> bool {
    true
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            debug: false,
            desnake: default_desnake(),
            max_call_depth: None,
            max_instructions: None,
        }
    }
}

impl SnakeConfig {
    pub fn from_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find `snake.toml` in `start` or the nearest ancestor and load it.
    /// `Ok(None)` when there is no such file.
    pub fn find_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let cfg = Self::load_from(&candidate)?;
                return Ok(Some((candidate, cfg)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Search from the current working directory.
    pub fn find() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        match std::env::current_dir() {
            Ok(dir) => Self::find_from(&dir),
            Err(_) => Ok(None),
        }
    }

    pub fn default_template() -> &'static str {
        r#"# Snakescript configuration

[run]
# Dump the desnaked source, tokens, AST and disassembly before running.
debug = false

# Set to false to read sources as plain text instead of snake layout.
desnake = true

# Abort after this many nested calls.
# max_call_depth = 10000

# Abort after executing this many instructions.
# max_instructions = 100000000
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_project(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("snake_test_config").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn empty_string_returns_default() {
        let cfg = SnakeConfig::from_str("").unwrap();
        assert_eq!(cfg, SnakeConfig::default());
        assert!(cfg.run.desnake);
        assert!(!cfg.run.debug);
    }

    #[test]
    fn parse_run_section() {
        let cfg = SnakeConfig::from_str(
            r#"
[run]
debug = true
desnake = false
max_call_depth = 64
max_instructions = 5000
"#,
        )
        .unwrap();
        assert!(cfg.run.debug);
        assert!(!cfg.run.desnake);
        assert_eq!(cfg.run.max_call_depth, Some(64));
        assert_eq!(cfg.run.max_instructions, Some(5000));
    }

    #[test]
    fn partial_run_section_keeps_desnake_on() {
        let cfg = SnakeConfig::from_str("[run]\ndebug = true\n").unwrap();
        assert!(cfg.run.desnake);
        assert_eq!(cfg.run.max_call_depth, None);
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(SnakeConfig::from_str("[run\ndebug = ").is_err());
        assert!(SnakeConfig::from_str("[run]\ndebug = \"yes\"").is_err());
    }

    #[test]
    fn default_template_round_trips() {
        let cfg = SnakeConfig::from_str(SnakeConfig::default_template()).unwrap();
        assert_eq!(cfg, SnakeConfig::default());
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut cfg = SnakeConfig::default();
        cfg.run.max_instructions = Some(10);
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(SnakeConfig::from_str(&text).unwrap(), cfg);
    }

    #[test]
    fn find_searches_ancestors() {
        let root = temp_project("ancestors");
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "[run]\nmax_call_depth = 3\n").unwrap();

        let (path, cfg) = SnakeConfig::find_from(&nested).unwrap().unwrap();
        assert_eq!(path, root.join(CONFIG_FILE));
        assert_eq!(cfg.run.max_call_depth, Some(3));
    }

    #[test]
    fn find_reports_broken_file() {
        let root = temp_project("broken");
        std::fs::write(root.join(CONFIG_FILE), "[run]\nmax_call_depth = -1\n").unwrap();
        match SnakeConfig::find_from(&root) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, root.join(CONFIG_FILE)),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
