//! System paths for the gateway's default config file.
//!
//! Follows XDG Base Directory conventions on Linux and platform conventions
//! on macOS and Windows, via `directories::ProjectDirs`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const APP_QUALIFIER: &str = "rs";
const APP_ORGANIZATION: &str = "labiium";
const APP_NAME: &str = "mcp-gateway";

#[derive(Debug, Clone)]
pub struct GatewayPaths {
    pub config_dir: PathBuf,
}

impl GatewayPaths {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .context("failed to determine system directories")?;
        Ok(GatewayPaths {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn default_config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_file_lives_under_config_dir() {
        let paths = GatewayPaths::new().expect("should resolve system paths");
        assert_eq!(
            paths.default_config_file(),
            paths.config_dir.join("config.yaml")
        );
    }
}
