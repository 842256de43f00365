//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/dealsift/config.toml)
//! 3. Project config (.dealsift/config.toml)
//! 4. Environment variables (DEALSIFT_* prefix, `__` separates sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::constants;
use crate::types::{Result, SiftError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_with(Self::global_config_path(), &Self::project_config_path())
    }

    fn load_with(global_path: Option<PathBuf>, project_path: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global_path
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(project_path));
        }

        // e.g. DEALSIFT_PIPELINE__SHORTLIST_SIZE -> pipeline.shortlist_size
        figment = figment.merge(Env::prefixed("DEALSIFT_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| SiftError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/dealsift/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                directories::BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
            })
            .map(|p| p.join("dealsift"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(constants::storage::DATA_DIR)
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration (API keys are never printed)
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SiftError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize project directory and default config under `root`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(constants::storage::DATA_DIR);
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join("reports"))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_project_config() -> String {
        r#"# dealsift project configuration
# Values here override ~/.config/dealsift/config.toml.
# Environment overrides use DEALSIFT_<SECTION>__<KEY>, e.g. DEALSIFT_PIPELINE__SHORTLIST_SIZE=3

version = "1.0"

[llm]
provider = "openrouter"
# api_key falls back to OPENROUTER_API_KEY
max_concurrent_requests = 8
max_retries = 0

[pipeline]
extraction_concurrency = 5
filter_batch_size = 10
relevance_threshold = 0.5
shortlist_size = 5
max_document_chars = 8000

[models.scorer]
model = "openai/gpt-4o-mini"
max_tokens = 500
temperature = 0.3
timeout_secs = 30
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_files() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_with(None, &temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.pipeline.filter_batch_size, 10);
    }

    #[test]
    fn test_project_file_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(&global, "[pipeline]\nshortlist_size = 3\nfilter_batch_size = 4\n").unwrap();
        fs::write(&project, "[pipeline]\nshortlist_size = 7\n").unwrap();

        let config = ConfigLoader::load_with(Some(global), &project).unwrap();
        assert_eq!(config.pipeline.shortlist_size, 7);
        assert_eq!(config.pipeline.filter_batch_size, 4);
        assert_eq!(config.pipeline.relevance_threshold, 0.5);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[pipeline]\nrelevance_threshold = 2.0\n").unwrap();
        assert!(ConfigLoader::load_with(None, &path).is_err());
    }

    #[test]
    fn test_generated_project_config_parses() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert!(dir.join("reports").exists());
        let config = ConfigLoader::load_with(None, &dir.join("config.toml")).unwrap();
        assert_eq!(config.models.scorer.max_tokens, 500);
    }
}
