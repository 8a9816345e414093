use clap::Parser;
use fintrack::args::{
    Args, CategorySubcommand, Command, RemoteSubcommand, ReportSubcommand, SyncSubcommand,
    TxSubcommand,
};
use fintrack::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with {} error: {e}", e.error_type());
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // This allows for running the program without a network. When FINTRACK_SYNC_IN_TEST_MODE is
    // set and non-zero in length, then the mode will be Mode::Test, otherwise it will be
    // Mode::Webhook.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Remote(remote_args) => {
            let config = Config::load(home).await?;
            match remote_args.action() {
                RemoteSubcommand::Set(args) => {
                    commands::remote_set(config, args.clone()).await?.print()
                }
                RemoteSubcommand::Show => commands::remote_show(config).await?.print(),
            }
        }

        Command::Tx(tx_args) => {
            let config = Config::load(home).await?;
            match tx_args.action() {
                TxSubcommand::Add(args) => {
                    commands::tx_add(config, mode, args.clone()).await?.print()
                }
                TxSubcommand::Edit(args) => {
                    commands::tx_edit(config, mode, args.clone()).await?.print()
                }
                TxSubcommand::Delete(args) => {
                    commands::tx_delete(config, mode, args.clone())
                        .await?
                        .print()
                }
                TxSubcommand::List(args) => commands::tx_list(config, args.clone()).await?.print(),
            }
        }

        Command::Category(category_args) => {
            let config = Config::load(home).await?;
            match category_args.action() {
                CategorySubcommand::Add(args) => {
                    commands::category_add(config, mode, args.clone())
                        .await?
                        .print()
                }
                CategorySubcommand::Delete(args) => {
                    commands::category_delete(config, mode, args.clone())
                        .await?
                        .print()
                }
                CategorySubcommand::List(args) => {
                    commands::category_list(config, args.clone())
                        .await?
                        .print()
                }
            }
        }

        Command::Report(report_args) => {
            let config = Config::load(home).await?;
            match report_args.report() {
                ReportSubcommand::Dashboard(args) => {
                    commands::report_dashboard(config, args.clone())
                        .await?
                        .print()
                }
                ReportSubcommand::Yearly(args) => {
                    commands::report_yearly(config, args.clone())
                        .await?
                        .print()
                }
                ReportSubcommand::Top(args) => {
                    commands::report_top(config, args.clone()).await?.print()
                }
                ReportSubcommand::Balance(args) => {
                    commands::report_balance(config, args.clone())
                        .await?
                        .print()
                }
            }
        }

        Command::Export(export_args) => {
            let config = Config::load(home).await?;
            commands::export(config, export_args.clone()).await?.print()
        }

        Command::Import(import_args) => {
            let config = Config::load(home).await?;
            commands::import(config, mode, import_args.clone())
                .await?
                .print()
        }

        Command::Clear(confirm_args) => {
            let config = Config::load(home).await?;
            commands::clear(config, mode, confirm_args.clone())
                .await?
                .print()
        }

        Command::Sync(sync_args) => {
            let config = Config::load(home).await?;
            match sync_args.direction() {
                SyncSubcommand::Up => commands::sync_up(config, mode).await?.print(),
                SyncSubcommand::Down(args) => {
                    commands::sync_down(config, mode, args.clone())
                        .await?
                        .print()
                }
                SyncSubcommand::Auto => commands::sync_auto(config, mode).await?.print(),
                SyncSubcommand::Status => commands::sync_status(config).await?.print(),
            }
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
