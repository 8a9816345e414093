//! Export, import and clear: the commands that move the whole dataset at once.

use crate::api::Mode;
use crate::app::{Action, Applied};
use crate::args::{ConfirmArgs, ExportArgs, ExportFormat, ImportArgs};
use crate::commands::{finish, open_app, Out};
use crate::error::{ErrorType, IntoResult};
use crate::store::{categories_csv, export_snapshot, transactions_csv, Bundle, ImportMode, ImportSummary};
use crate::{utils, Config, Error, Result};
use anyhow::Context;
use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Writes the whole dataset to `args.dir()` (default: the current directory). JSON produces one
/// file that `import` can read back. CSV produces one file for transactions and one for
/// categories.
///
/// # Errors
/// - `Persistence` if a file cannot be written.
pub async fn export(config: Config, args: ExportArgs) -> Result<Out<Vec<PathBuf>>> {
    let loaded = config.persistence().load().await?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    let dataset = loaded.dataset;
    let dir = args.dir().unwrap_or_else(|| Path::new("."));
    let date = Local::now().format("%Y-%m-%d");

    let files = match args.format() {
        ExportFormat::Json => {
            let bundle = export_snapshot(&dataset, Utc::now());
            vec![(dir.join(format!("fintrack-backup-{date}.json")), bundle.to_json()?)]
        }
        ExportFormat::Csv => vec![
            (
                dir.join(format!("fintrack-transactions-{date}.csv")),
                transactions_csv(&dataset)?,
            ),
            (
                dir.join(format!("fintrack-categories-{date}.csv")),
                categories_csv(&dataset)?,
            ),
        ],
    };

    let mut paths = Vec::with_capacity(files.len());
    for (path, contents) in files {
        utils::write(&path, contents)
            .await
            .context("Unable to write the export file")
            .pub_result(ErrorType::Persistence)?;
        paths.push(path);
    }

    let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Ok(Out::new(
        format!(
            "Exported {} transactions and {} categories to {}",
            dataset.transactions.len(),
            dataset.categories.len(),
            listed.join(", ")
        ),
        paths,
    ))
}

/// Loads a JSON file written by `export`. Without `--merge` all local data is replaced, which
/// requires `--yes`. The local data is backed up first either way.
///
/// # Errors
/// - `Validation` if the file is not a valid export, or `--yes` is missing for a replace.
pub async fn import(config: Config, mode: Mode, args: ImportArgs) -> Result<Out<ImportSummary>> {
    let import_mode = if args.merge() {
        ImportMode::Merge
    } else {
        ImportMode::Replace
    };
    if import_mode == ImportMode::Replace && !args.yes() {
        return Err(Error::validation(
            "Importing without --merge replaces all local data, pass --yes to confirm",
        ));
    }

    let text = utils::read(args.path())
        .await
        .pub_result(ErrorType::Validation)?;
    let bundle = Bundle::from_json(&text)?;

    let mut app = open_app(&config, mode).await?;
    let applied = app
        .apply(Action::Import {
            bundle,
            mode: import_mode,
        })
        .await?;
    finish(app).await;
    match applied {
        Applied::Imported(summary) => Ok(Out::new(
            format!(
                "Import complete ({}): {} transactions and {} categories added, {} transactions \
                and {} categories in total",
                summary.mode,
                summary.transactions_added,
                summary.categories_added,
                summary.transactions_total,
                summary.categories_total
            ),
            summary,
        )),
        other => Err(Error::msg(
            ErrorType::Internal,
            format!("Unexpected result from the ledger: {other:?}"),
        )),
    }
}

/// Deletes every transaction and restores the built-in categories. Requires `--yes`. The local
/// data is backed up first.
pub async fn clear(config: Config, mode: Mode, args: ConfirmArgs) -> Result<Out<()>> {
    if !args.yes() {
        return Err(Error::validation(
            "Clearing deletes all local data, pass --yes to confirm",
        ));
    }
    let mut app = open_app(&config, mode).await?;
    app.apply(Action::Clear).await?;
    finish(app).await;
    Ok(format!(
        "All data was cleared, a backup was saved in {}",
        config.backups().display()
    )
    .into())
}
