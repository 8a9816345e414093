use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory, its `store` and `.backups` subdirectories, and an initial
/// `config.json` with default settings.
///
/// # Arguments
/// - `home` - The directory that will be the root of data directory, e.g. `$HOME/fintrack`
///
/// # Errors
/// - `Config` if the directory is already initialized or any file operation fails.
pub async fn init(home: &Path) -> Result<Out<()>> {
    let config = Config::create(home).await?;
    Ok(format!(
        "Successfully created the fintrack directory at {}",
        config.root().display()
    )
    .into())
}
