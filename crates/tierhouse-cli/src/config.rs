//! Configuration loading for tierctl

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tierhouse_storage::TieringConfig;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tierhouse.toml";

/// Resolve the effective configuration.
///
/// An explicit `path` must exist. Without one, `tierhouse.toml` in the
/// working directory is used if present, else the built-in defaults.
/// `data_dir` overrides whatever the file says.
pub fn load(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<TieringConfig> {
    let mut config = match path {
        Some(path) => read(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                read(fallback)?
            } else {
                TieringConfig::default()
            }
        }
    };

    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    config
        .validate()
        .context("Invalid tiering configuration")?;
    Ok(config)
}

fn read(path: &Path) -> Result<TieringConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: TieringConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Save config to file
pub fn save(config: &TieringConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_toml(config)?)?;
    Ok(())
}

pub fn to_toml(config: &TieringConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration as TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_explicit_file_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
                data_dir = "/srv/billing"
                hot_to_cool_months = 1.5
                expedited_latency = 100
                standard_latency = 400
            "#,
        )
        .unwrap();

        let config = load(Some(&path), None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/billing"));
        assert_eq!(config.hot_to_cool_months, 1.5);
        assert_eq!(config.expedited_latency, Duration::from_millis(100));
        assert_eq!(config.cool_to_archive_months, 12.0);

        let config = load(Some(&path), Some(dir.path().join("data"))).unwrap();
        assert_eq!(config.data_dir, dir.path().join("data"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml")), None).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "expedited_latency = 20000\nstandard_latency = 1000\n").unwrap();
        assert!(load(Some(&path), None).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tierhouse.toml");
        let config = TieringConfig {
            archive_compression_level: tierhouse_core::CompressionLevel::new(7).unwrap(),
            serve_rehydrated_copies: false,
            ..TieringConfig::with_data_dir(dir.path().join("data"))
        };

        save(&config, &path).unwrap();
        assert_eq!(load(Some(&path), None).unwrap(), config);
    }
}
