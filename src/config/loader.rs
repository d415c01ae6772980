// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::WorkspaceConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".gaffer.json", ".gaffer/config.json", "gaffer.config.json"];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".gaffer.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".gaffer";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.gaffer/config.json.
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the workspace root.
///
/// Searches for config files in the following order:
/// 1. .gaffer.json
/// 2. .gaffer/config.json
/// 3. gaffer.config.json
pub fn load_workspace_config(
    workspace_root: &Path,
) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .gaffer.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    let path = workspace_root.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Save workspace configuration to a file.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &WorkspaceConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(".gaffer.json");
    let path = workspace_root.join(filename);

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    for ancestor in start.ancestors() {
        for filename in CONFIG_FILES {
            if ancestor.join(filename).exists() {
                return Some(ancestor.to_path_buf());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_workspace_config_missing() {
        let dir = tempdir().unwrap();
        let config = load_workspace_config(dir.path()).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".gaffer.json"),
            r#"{"hostUrl": "http://localhost:4096"}"#,
        )
        .unwrap();

        let config = load_workspace_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.host_url.as_deref(), Some("http://localhost:4096"));
    }

    #[test]
    fn test_load_config_file_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "hostUrl: http://localhost:4096\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.host_url.as_deref(), Some("http://localhost:4096"));
    }

    #[test]
    fn test_load_config_file_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(load_config_file(&path).is_err());
    }

    #[test]
    fn test_find_workspace_root() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".gaffer.json"), "{}").unwrap();

        let root = find_workspace_root(&nested);
        assert_eq!(root, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let config = WorkspaceConfig {
            host_url: Some("http://localhost:4096".to_string()),
            ..Default::default()
        };

        let path = save_workspace_config(dir.path(), &config, None).unwrap();
        assert!(path.ends_with(".gaffer.json"));

        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded.host_url, config.host_url);
    }
}
