use crate::api::{extract_spreadsheet_id, RemoteConfig};
use crate::args::RemoteSetArgs;
use crate::commands::Out;
use crate::{Config, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What `remote show` and `sync status` report.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteInfo {
    pub remote: Option<RemoteConfig>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl RemoteInfo {
    pub(super) async fn load(config: &Config) -> Result<Self> {
        let persistence = config.persistence();
        Ok(Self {
            remote: persistence.remote_config().await?,
            last_sync: persistence.last_sync().await?,
        })
    }

    pub(super) fn describe(&self) -> String {
        let endpoint = match &self.remote {
            Some(remote) if remote.spreadsheet_id().is_empty() => {
                format!("Remote endpoint: {}", remote.webhook_url())
            }
            Some(remote) => format!(
                "Remote endpoint: {} (spreadsheet {})",
                remote.webhook_url(),
                remote.spreadsheet_id()
            ),
            None => "No remote endpoint is set".to_string(),
        };
        let last = match self.last_sync {
            Some(at) => format!("Last successful push: {}", at.to_rfc3339()),
            None => "Never pushed".to_string(),
        };
        format!("{endpoint}\n{last}")
    }
}

/// Validates and saves the remote endpoint settings.
///
/// # Errors
/// - `Validation` if the webhook URL is not an http(s) URL or the spreadsheet URL has no id.
/// - `Persistence` if the settings cannot be saved.
pub async fn remote_set(config: Config, args: RemoteSetArgs) -> Result<Out<RemoteConfig>> {
    let mut remote = RemoteConfig::new(args.webhook_url().trim())
        .with_api_key(args.api_key())
        .with_client_id(args.client_id());
    if let Some(sheet_url) = args.sheet_url() {
        remote = remote.with_spreadsheet_id(extract_spreadsheet_id(sheet_url)?);
    }
    // Reject a bad URL now rather than at the first push.
    remote.url()?;

    config.persistence().set_remote_config(&remote).await?;
    Ok(Out::new(
        format!("Saved remote endpoint {}", remote.webhook_url()),
        remote,
    ))
}

/// Shows the saved remote settings and the time of the last successful push.
pub async fn remote_show(config: Config) -> Result<Out<RemoteInfo>> {
    let info = RemoteInfo::load(&config).await?;
    Ok(Out::new(info.describe(), info))
}
