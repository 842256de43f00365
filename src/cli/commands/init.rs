//! Init Command
//!
//! Create `.dealsift/` with a default project config and an empty job store.

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::{Result, SiftError};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let data_dir = root.join(crate::constants::storage::DATA_DIR);

    if data_dir.exists() && !force {
        return Err(SiftError::Config(
            "Already initialized. Use --force to overwrite the project config.".to_string(),
        ));
    }

    ConfigLoader::init_project(&root, force)?;
    let config = ConfigLoader::load()?;
    let db = Database::open(&config.storage.path)?;
    db.initialize()?;

    let out = Output::new();
    out.success("Initialized dealsift in .dealsift/");
    println!("  Config:   {}", ConfigLoader::project_config_path().display());
    println!("  Database: {}", config.storage.path.display());
    println!();
    println!("Next steps:");
    println!("  1. Export OPENROUTER_API_KEY (or set llm.api_key)");
    println!("  2. dealsift run decks/*.pdf --sheet deals.csv --sector FinTech");

    Ok(())
}
