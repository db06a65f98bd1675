use crate::cli::Args;
use anyhow::{Context, Result, bail};
use libchainfs::layout::{BLOCK_SIZE, DEFAULT_CONTAINER_SIZE, METADATA_REGION_LEN};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub disk: PathBuf,
    pub total_size: u64,
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12345,
            disk: PathBuf::from("filesystem.dat"),
            total_size: DEFAULT_CONTAINER_SIZE,
            max_line_length: 64 * 1024,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let cfg: Config = serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
    Ok(cfg)
}

impl Config {
    /// Command line and environment win over the config file.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        if let Some(host) = &args.host {
            cfg.host = host.clone();
        }
        if let Some(port) = args.port {
            cfg.port = port;
        }
        if let Some(disk) = &args.disk {
            cfg.disk = disk.clone();
        }
        if let Some(total_size) = args.total_size {
            cfg.total_size = total_size;
        }
        if let Some(max_line_length) = args.max_line_length {
            cfg.max_line_length = max_line_length;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let mut validation_errors = Vec::new();

        let min_size = (METADATA_REGION_LEN + BLOCK_SIZE) as u64;
        if self.total_size < min_size {
            validation_errors.push(format!(
                "total_size {} is too small, need at least {min_size} bytes",
                self.total_size
            ));
        }
        if self.port == 0 {
            validation_errors.push("port must be nonzero".to_string());
        }
        if self.max_line_length == 0 {
            validation_errors.push("max_line_length must be nonzero".to_string());
        }
        if let Some(parent) = self.disk.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                validation_errors.push(format!(
                    "The directory for the container `{}` does not exist",
                    parent.display()
                ));
            }
        }

        if !validation_errors.is_empty() {
            bail!("{}", validation_errors.join("\n"));
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
