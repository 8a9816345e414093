//! Implements the `Remote` trait by calling a spreadsheet script endpoint over HTTP.

use crate::api::{ImportRequest, Remote, RemoteResponse, SyncPayload};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::Dataset;
use crate::Result;
use anyhow::Context;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Pushes with a JSON `POST` to the webhook URL, and pulls with a `GET` that carries the request
/// in a `data` query parameter.
pub struct WebhookRemote {
    url: Url,
    client: reqwest::Client,
}

impl WebhookRemote {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("Unable to create the HTTP client")
            .pub_result(ErrorType::Internal)?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL for a pull: `<webhook>?data={"action":"import"}`, percent-encoded.
    fn import_url(&self) -> Res<Url> {
        let data = serde_json::to_string(&ImportRequest::default())
            .context("Unable to serialize the import request")?;
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("data", &data);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Remote for WebhookRemote {
    async fn push(&self, payload: &SyncPayload) -> Res<()> {
        debug!(
            "Pushing {} transactions to {}",
            payload.transaction_count(),
            self.url
        );
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .context("Failed to send the sync request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        if !status.is_success() {
            anyhow::bail!("The sync request failed with status {status}: {body}");
        }
        trace!("Sync response: {body}");

        // Some script deployments answer a push with an empty or non-JSON body. Only an explicit
        // `success: false` is treated as a failure.
        if let Ok(parsed) = serde_json::from_str::<RemoteResponse>(&body) {
            parsed.check()?;
        }
        Ok(())
    }

    async fn pull(&self) -> Res<Dataset> {
        let url = self.import_url()?;
        debug!("Pulling data from {}", self.url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send the import request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("The import request failed with status {status}: {body}");
        }

        let parsed: RemoteResponse = response
            .json()
            .await
            .context("Failed to parse the import response")?;
        parsed.into_dataset()
    }
}
