//! Download-queue client for the Sonarr and Radarr v3 API.
//!
//! # Design
//! - Both services expose the same paginated `/api/v3/queue` shape.
//! - Pages are followed until `totalRecords` are collected or a page comes back empty.

use std::time::Duration;

use arrsync_config::ServiceConfig;
use arrsync_core::{QueuePage, QueueRecord, QueueSource, ServiceKind, SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Header carrying the service API key.
pub const HEADER_API_KEY: &str = "X-Api-Key";
/// Records requested per page.
pub const QUEUE_PAGE_SIZE: u32 = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Queue client bound to one service.
#[derive(Debug, Clone)]
pub struct ArrClient {
    client: Client,
    service: ServiceKind,
    endpoint: Url,
    api_key: String,
    page_size: u32,
}

impl ArrClient {
    /// Build a client with the standard request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ClientError::ClientBuild { source })?;
        Ok(Self::with_client(client, config))
    }

    /// Build around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            service: config.kind,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            page_size: QUEUE_PAGE_SIZE,
        }
    }

    /// Override the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// URL of one queue page.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the endpoint cannot carry a path.
    pub fn queue_url(&self, page: u32) -> ClientResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidEndpoint {
                url: self.endpoint.to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "v3", "queue"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &self.page_size.to_string());
        Ok(url)
    }

    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or an
    /// undecodable body.
    pub async fn fetch_page(&self, page: u32) -> ClientResult<QueuePage> {
        let response = self
            .client
            .get(self.queue_url(page)?)
            .header(HEADER_API_KEY, &self.api_key)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                operation: "arr.queue.send",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                operation: "arr.queue",
                status: status.as_u16(),
            });
        }

        response
            .json::<QueuePage>()
            .await
            .map_err(|source| ClientError::Decode {
                operation: "arr.queue.decode",
                source,
            })
    }

    /// Fetch every page of the queue.
    ///
    /// # Errors
    ///
    /// Returns the first page failure; partial results are discarded.
    pub async fn fetch_all(&self) -> ClientResult<Vec<QueueRecord>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(page).await?;
            let total = usize::try_from(batch.total_records).unwrap_or(usize::MAX);
            let empty = batch.records.is_empty();
            records.extend(batch.records);
            debug!(
                service = %self.service,
                page,
                collected = records.len(),
                total,
                "fetched queue page"
            );
            if empty || records.len() >= total {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}

#[async_trait]
impl QueueSource for ArrClient {
    async fn fetch_queue(&self) -> SyncResult<Vec<QueueRecord>> {
        self.fetch_all()
            .await
            .map_err(|err| SyncError::queue(self.service, "arr.fetch_queue", err))
    }
}
