//! Configuration loading: TOML file, then command-line and environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use docchat_rag::RagConfig;
use tracing::debug;

use crate::cli::Cli;

/// Resolve the session configuration for this run.
///
/// Values come from [`RagConfig::default`], then the TOML file named by
/// `--config`, then individual flags. The result is validated before any
/// document is read.
pub fn resolve(cli: &Cli) -> Result<RagConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => RagConfig::default(),
    };

    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = cli.chunk_overlap {
        config.chunk_overlap = chunk_overlap;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }

    config.validate()?;
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn load_file(path: &Path) -> Result<RagConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["docchat", "doc.txt"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docchat.toml");
        std::fs::write(&path, "chunk_size = 500\nchunk_overlap = 50\ntop_k = 3\n").unwrap();

        let config = resolve(&cli(&["--config", path.to_str().unwrap(), "--top-k", "6"])).unwrap();

        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 6);
    }

    #[test]
    fn invalid_combinations_fail_fast() {
        let err = resolve(&cli(&["--chunk-size", "100", "--chunk-overlap", "100"])).unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(resolve(&cli(&["--config", "/no/such/docchat.toml"])).is_err());
    }
}
