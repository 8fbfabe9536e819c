use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["chainpilot.toml", "config/chainpilot.toml"];

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
    #[error("failed to render config template: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("config already exists at {0}, pass --force to overwrite")]
    AlreadyExists(PathBuf),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// 按顺序查找配置文件；全部缺失时回退到默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            validate(&config)?;
            return Ok(config);
        }
    }

    Ok(AppConfig::default())
}

pub fn parse_config(contents: &str, origin: &Path) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

/// 将默认配置写成模版文件。
pub fn write_template(dir: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let target = dir.join(DEFAULT_CONFIG_PATHS[0]);
    if target.exists() && !force {
        return Err(ConfigError::AlreadyExists(target));
    }
    let rendered = toml::to_string_pretty(&AppConfig::default())?;
    fs::write(&target, rendered).map_err(|source| ConfigError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(target)
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let jupiter = &config.protocols.jupiter;
    if jupiter.default_slippage_bps > jupiter.max_slippage_bps {
        return Err(ConfigError::Invalid(format!(
            "protocols.jupiter.default_slippage_bps ({}) exceeds max_slippage_bps ({})",
            jupiter.default_slippage_bps, jupiter.max_slippage_bps
        )));
    }
    let jito = &config.protocols.jito;
    if jito.min_stake_lamports > jito.max_stake_lamports {
        return Err(ConfigError::Invalid(
            "protocols.jito.min_stake_lamports exceeds max_stake_lamports".to_string(),
        ));
    }
    let ltv = config.protocols.kamino.max_ltv;
    if !(ltv > 0.0 && ltv <= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "protocols.kamino.max_ltv must be within (0, 1], got {ltv}"
        )));
    }
    let pumpfun = &config.protocols.pumpfun;
    if pumpfun.min_token_amount > pumpfun.max_token_amount {
        return Err(ConfigError::Invalid(
            "protocols.pumpfun.min_token_amount exceeds max_token_amount".to_string(),
        ));
    }
    Ok(())
}
