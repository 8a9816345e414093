//! Sync command handlers.

use crate::api::{Mode, SyncOutcome, SyncScheduler, SyncStatus};
use crate::app::App;
use crate::args::ConfirmArgs;
use crate::commands::remote::RemoteInfo;
use crate::commands::{require_gateway, Out};
use crate::store::Persistence;
use crate::{Config, Error, ErrorType, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often `sync auto` re-reads the local data, so that changes made by other commands while it
/// runs are included in the next push.
const RELOAD: Duration = Duration::from_secs(60);

/// Pushes all local data to the remote now.
///
/// # Errors
/// - `Config` if no remote is set.
/// - `Sync` if the push fails. Local data is unaffected.
pub async fn sync_up(config: Config, mode: Mode) -> Result<Out<SyncOutcome>> {
    let gateway = require_gateway(&config, mode).await?;
    let loaded = config.persistence().load().await?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    let outcome = gateway.push_now(&loaded.dataset).await;
    match &outcome {
        SyncOutcome::Synced { transactions, .. } => Ok(Out::new(
            format!("Pushed {transactions} transactions to the remote"),
            outcome.clone(),
        )),
        SyncOutcome::Failed { reason } => Err(Error::msg(ErrorType::Sync, reason)),
    }
}

/// Replaces all local data with the remote's data. Local data is backed up first.
///
/// # Errors
/// - `Validation` without `--yes`. Nothing is contacted or changed.
/// - `Sync` if the pull fails. Local data is unchanged.
pub async fn sync_down(config: Config, mode: Mode, args: ConfirmArgs) -> Result<Out<()>> {
    let gateway = require_gateway(&config, mode).await?;
    let (app, warnings) = App::open(config.persistence()).await?;
    for warning in &warnings {
        warn!("{warning}");
    }
    let mut app = app.with_backup(config.backup());
    let dataset = app.pull_latest(&gateway, args.yes()).await?;
    Ok(format!(
        "Replaced local data with {} transactions and {} categories from the remote",
        dataset.transactions.len(),
        dataset.categories.len()
    )
    .into())
}

/// Pushes right away, then every interval from the configuration, until Ctrl-C.
pub async fn sync_auto(config: Config, mode: Mode) -> Result<Out<SyncStatus>> {
    let gateway = require_gateway(&config, mode).await?;
    let scheduler = SyncScheduler::new(
        gateway,
        config.sync().debounce(),
        config.sync().interval(),
    );
    info!(
        "Pushing every {} minutes, press Ctrl-C to stop",
        config.sync().interval().as_secs() / 60
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    let status = run_auto(&scheduler, &config.persistence(), shutdown).await?;
    Ok(Out::new("Stopped automatic sync", status))
}

async fn run_auto<F>(
    scheduler: &SyncScheduler,
    persistence: &Persistence,
    shutdown: F,
) -> Result<SyncStatus>
where
    F: Future<Output = ()>,
{
    let mut status = scheduler.subscribe();
    scheduler.schedule(persistence.load().await?.dataset).await;
    scheduler.flush().await;
    scheduler.start_periodic().await;

    let mut reload = tokio::time::interval(RELOAD);
    reload.tick().await;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                match &*status.borrow_and_update() {
                    SyncStatus::Synced { at } => info!("Synced at {at}"),
                    SyncStatus::Failed { reason } => warn!("Sync failed: {reason}"),
                    other => debug!("Sync status: {other:?}"),
                }
            }
            _ = reload.tick() => match persistence.load().await {
                Ok(loaded) => scheduler.set_latest(loaded.dataset).await,
                Err(e) => warn!("Unable to reload local data: {e}"),
            },
        }
    }
    scheduler.stop_periodic().await;
    Ok(scheduler.status())
}

/// Shows the remote endpoint and when the last successful push happened.
pub async fn sync_status(config: Config) -> Result<Out<RemoteInfo>> {
    let info = RemoteInfo::load(&config).await?;
    Ok(Out::new(info.describe(), info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{SyncGateway, TestRemote, DEFAULT_INTERVAL};
    use crate::args::{CategoryRef, TxAddArgs};
    use crate::commands::tx_add;
    use crate::model::Kind;
    use crate::store::MemoryStore;
    use crate::test::TestEnv;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn add(env: &TestEnv, description: &str) {
        tx_add(
            env.config(),
            env.mode(),
            TxAddArgs::new(
                Kind::Expense,
                description,
                "8".parse().unwrap(),
                None,
                CategoryRef::Name("Leisure".into()),
            ),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_changes_are_pushed_and_pulled() {
        let env = TestEnv::new().await;
        add(&env, "Cinema").await;
        // Every change is flushed to the remote before the command returns.
        let state = env.remote().get_state();
        assert_eq!(state.pushes, 1);
        assert_eq!(state.dataset.transactions.len(), 1);

        let out = sync_up(env.config(), env.mode()).await.unwrap();
        assert!(out.structure().unwrap().is_synced());
        let status = sync_status(env.config()).await.unwrap();
        assert!(status.structure().unwrap().last_sync.is_some());

        let mut state = env.remote().get_state();
        state.dataset = crate::model::Dataset::with_defaults();
        env.remote().set_state(state);
        let e = sync_down(env.config(), env.mode(), ConfirmArgs::new(false))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        let loaded = env.config().persistence().load().await.unwrap();
        assert_eq!(loaded.dataset.transactions.len(), 1);

        sync_down(env.config(), env.mode(), ConfirmArgs::new(true))
            .await
            .unwrap();
        let loaded = env.config().persistence().load().await.unwrap();
        assert!(loaded.dataset.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_push_is_a_sync_error() {
        let env = TestEnv::new().await;
        let mut state = env.remote().get_state();
        state.fail_with = Some("offline".into());
        env.remote().set_state(state);

        // Local changes still succeed.
        add(&env, "Concert").await;
        let e = sync_up(env.config(), env.mode()).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Sync);
    }

    #[tokio::test]
    async fn test_sync_without_remote() {
        let env = TestEnv::without_remote().await;
        add(&env, "Museum").await;
        let e = sync_up(env.config(), env.mode()).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_pushes_periodically() {
        let persistence = Persistence::new(Arc::new(MemoryStore::new()));
        let remote = TestRemote::new(format!("test://{}", Uuid::new_v4()));
        let gateway = SyncGateway::new(Arc::new(remote.clone()), persistence.clone());
        let scheduler = SyncScheduler::with_defaults(gateway);

        let shutdown = tokio::time::sleep(DEFAULT_INTERVAL * 2 + Duration::from_secs(1));
        let status = run_auto(&scheduler, &persistence, shutdown).await.unwrap();
        // One push at start, then one per interval.
        assert_eq!(remote.get_state().pushes, 3);
        assert!(matches!(status, SyncStatus::Synced { .. }));
        assert!(!scheduler.is_periodic_running().await);
    }
}
