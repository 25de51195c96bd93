//! Configuration module
//!
//! Settings are read from the process environment (after loading a `.env`
//! file when one is present). Only the object-storage client and the choice
//! of path backend are configurable; every operation otherwise receives its
//! inputs explicitly.

use std::env;

use crate::storage_types::StorageBackend;

const DEFAULT_MEMORY_CWD: &str = "/";

/// Runtime configuration for the storage layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Backend used for references that are not object-storage URIs.
    pub path_backend: StorageBackend,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Ceph, ...)
    pub s3_endpoint: Option<String>,
    pub s3_force_path_style: bool,
    /// Working directory used to resolve relative paths in the memory backend.
    pub memory_cwd: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path_backend: StorageBackend::Local,
            s3_region: None,
            s3_endpoint: None,
            s3_force_path_style: false,
            memory_cwd: DEFAULT_MEMORY_CWD.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_backend = match lookup("TINYFS_BACKEND") {
            Some(value) => value.trim().parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let s3_region = lookup("TINYFS_S3_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .filter(|s| !s.trim().is_empty());

        let s3_endpoint = lookup("TINYFS_S3_ENDPOINT").filter(|s| !s.trim().is_empty());

        let s3_force_path_style = match lookup("TINYFS_S3_FORCE_PATH_STYLE") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                anyhow::anyhow!(
                    "TINYFS_S3_FORCE_PATH_STYLE must be true or false, got: {}",
                    value
                )
            })?,
            None => false,
        };

        let memory_cwd = lookup("TINYFS_MEMORY_CWD")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEMORY_CWD.to_string());

        let config = Config {
            path_backend,
            s3_region,
            s3_endpoint,
            s3_force_path_style,
            memory_cwd,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.path_backend.is_path_backend() {
            return Err(anyhow::anyhow!(
                "TINYFS_BACKEND must be a path backend (local or memory), got: {}",
                self.path_backend
            ));
        }

        if let Some(ref endpoint) = self.s3_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "TINYFS_S3_ENDPOINT must start with http:// or https://, got: {}",
                    endpoint
                ));
            }
        }

        if !self.memory_cwd.starts_with('/') {
            return Err(anyhow::anyhow!(
                "TINYFS_MEMORY_CWD must be an absolute path, got: {}",
                self.memory_cwd
            ));
        }

        Ok(())
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_s3_settings() {
        let config = config_from(&[
            ("TINYFS_BACKEND", "memory"),
            ("AWS_REGION", "eu-west-1"),
            ("TINYFS_S3_ENDPOINT", "http://localhost:9000"),
            ("TINYFS_S3_FORCE_PATH_STYLE", "true"),
        ])
        .unwrap();

        assert_eq!(config.path_backend, StorageBackend::Memory);
        assert_eq!(config.s3_region(), Some("eu-west-1"));
        assert_eq!(config.s3_endpoint(), Some("http://localhost:9000"));
        assert!(config.s3_force_path_style);
    }

    #[test]
    fn tinyfs_region_wins_over_aws_region() {
        let config = config_from(&[("TINYFS_S3_REGION", "us-east-2"), ("AWS_REGION", "eu-west-1")])
            .unwrap();
        assert_eq!(config.s3_region(), Some("us-east-2"));
    }

    #[test]
    fn rejects_s3_as_path_backend() {
        assert!(config_from(&[("TINYFS_BACKEND", "s3")]).is_err());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config_from(&[("TINYFS_S3_ENDPOINT", "localhost:9000")]).is_err());
        assert!(config_from(&[("TINYFS_S3_FORCE_PATH_STYLE", "maybe")]).is_err());
        assert!(config_from(&[("TINYFS_MEMORY_CWD", "relative/dir")]).is_err());
    }
}
