// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::config::duration::parse_duration;
use crate::infrastructure::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_FIELD_MANAGER, DEFAULT_POD_RUNNING_TIMEOUT,
};
use crate::shared::error::{KruiseError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Plugin-wide defaults read from `~/.kube/kruise.toml`.
///
/// ```toml
/// field_manager = "my-tool"
/// pod_running_timeout = "2m"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
    /// Name of the manager used to track field ownership.
    pub field_manager: Option<String>,

    /// How long `exec` waits for at least one pod of a workload.
    pub pod_running_timeout: Option<String>,
}

impl PluginConfig {
    /// Loads the config from `$KUBECTL_KRUISE_CONFIG` or `~/.kube/kruise.toml`.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KruiseError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let conf: PluginConfig = toml::from_str(&content)?;
        tracing::debug!("Loaded plugin config from {}", path.display());
        Ok(conf)
    }

    fn default_path() -> Option<PathBuf> {
        config_path(std::env::var(CONFIG_ENV_VAR).ok(), home::home_dir())
    }

    /// Flag value > config file > built-in default.
    pub fn resolve_field_manager(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.field_manager.clone())
            .unwrap_or_else(|| DEFAULT_FIELD_MANAGER.to_string())
    }

    /// Flag value > config file > built-in default. The timeout must be
    /// greater than zero.
    pub fn resolve_pod_running_timeout(&self, flag: Option<&str>) -> Result<Duration> {
        let raw = flag
            .map(str::to_string)
            .or_else(|| self.pod_running_timeout.clone())
            .unwrap_or_else(|| DEFAULT_POD_RUNNING_TIMEOUT.to_string());
        let timeout = parse_duration(&raw)?;
        if timeout.is_zero() {
            return Err(KruiseError::usage("--pod-running-timeout must be higher than zero"));
        }
        Ok(timeout)
    }
}

/// `$KUBECTL_KRUISE_CONFIG` when set and non-empty, else `<home>/.kube/kruise.toml`.
fn config_path(env_override: Option<String>, home: Option<PathBuf>) -> Option<PathBuf> {
    match env_override {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => home.map(|home| home.join(".kube").join(CONFIG_FILE_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolution_order() {
        let conf = PluginConfig {
            field_manager: Some("from-file".to_string()),
            pod_running_timeout: Some("2m".to_string()),
        };
        assert_eq!(conf.resolve_field_manager(Some("flag")), "flag");
        assert_eq!(conf.resolve_field_manager(None), "from-file");
        assert_eq!(
            PluginConfig::default().resolve_field_manager(None),
            DEFAULT_FIELD_MANAGER
        );

        assert_eq!(
            conf.resolve_pod_running_timeout(None).unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(
            PluginConfig::default()
                .resolve_pod_running_timeout(None)
                .unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_config_path() {
        assert_eq!(
            config_path(Some("/etc/kruise.toml".to_string()), Some(PathBuf::from("/home/ops"))),
            Some(PathBuf::from("/etc/kruise.toml"))
        );
        assert_eq!(
            config_path(Some(String::new()), Some(PathBuf::from("/home/ops"))),
            Some(PathBuf::from("/home/ops/.kube/kruise.toml"))
        );
        assert_eq!(
            config_path(None, Some(PathBuf::from("/home/ops"))),
            Some(PathBuf::from("/home/ops/.kube/kruise.toml"))
        );
        assert_eq!(config_path(None, None), None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = PluginConfig::default()
            .resolve_pod_running_timeout(Some("0"))
            .unwrap_err();
        assert!(err.to_string().contains("higher than zero"));

        let conf = PluginConfig {
            pod_running_timeout: Some("99999999999999999999999999h".to_string()),
            ..Default::default()
        };
        assert!(conf.resolve_pod_running_timeout(None).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "field_manager = \"ops\"").unwrap();
        let conf = PluginConfig::from_file(file.path()).unwrap();
        assert_eq!(conf.field_manager.as_deref(), Some("ops"));
        assert_eq!(conf.pod_running_timeout, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nope = 1").unwrap();
        assert!(PluginConfig::from_file(file.path()).is_err());
    }
}
