use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::FhevmConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["fhevm.toml", "config/fhevm.toml"];

/// 指定配置文件路径的环境变量，优先级低于命令行参数。
pub const CONFIG_ENV_VAR: &str = "FHEVM_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config file {0} does not exist")]
    Missing(PathBuf),
}

pub fn load_config(path: Option<PathBuf>) -> Result<FhevmConfig, ConfigError> {
    let explicit = path.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Some(path) = explicit {
        return try_load_file(&path)?.ok_or(ConfigError::Missing(path));
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(FhevmConfig::default())
}

pub fn parse_config(contents: &str, path: &Path) -> Result<FhevmConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn try_load_file(path: &Path) -> Result<Option<FhevmConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&contents, path).map(Some)
}
