use crate::error::{FetchError, Result};
use crate::result::{Tunebook, TunebookPage};
use crate::retry::RetryPolicy;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://thesession.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);
pub const PER_PAGE: u32 = 50;
pub const USER_AGENT: &str = "tunemirror/0.1 (tunebook mirror; polite crawler)";

/// Anything that can produce a member's full tunebook. The scanner and the
/// recommend entry point are written against this so they can be driven by
/// a scripted source in tests.
#[allow(async_fn_in_trait)]
pub trait TunebookSource {
    async fn fetch_tunebook(&self, member_id: u32) -> Result<Tunebook>;
}

pub struct CatalogClient {
    client: Client,
    base_url: Url,
    request_delay: Duration,
    retry_policy: RetryPolicy,
    timeout_secs: u64,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            request_delay: DEFAULT_REQUEST_DELAY,
            retry_policy: RetryPolicy::none(),
            timeout_secs,
        })
    }

    /// Pause applied before every request, including the first page.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn tunebook_url(&self, member_id: u32, page: u32) -> Result<Url> {
        let id = member_id.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["members", id.as_str(), "tunebook"]);
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("perpage", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Fetch a single page. 404 and 410 map to `NotFound` regardless of page.
    pub async fn fetch_page(&self, member_id: u32, page: u32) -> Result<TunebookPage> {
        tokio::time::sleep(self.request_delay).await;

        let url = self.tunebook_url(member_id, page)?;
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::NotFound {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                page,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode { page, source })
    }

    /// Fetch every page of a member's tunebook. Either all pages arrive and
    /// the whole tunebook is returned, or nothing is.
    pub async fn fetch_tunebook(&self, member_id: u32) -> Result<Tunebook> {
        let first = self.fetch_page(member_id, 1).await?;
        let total_pages = first.pages.max(1);
        let authoritative_id = first.member.as_ref().map_or(member_id, |m| m.id);
        let mut tunes = first.tunes;

        let mut page = 1;
        while page < total_pages {
            page += 1;
            let next = self
                .fetch_page(member_id, page)
                .await
                .map_err(|e| match e {
                    // A member that disappears mid-pagination is not a miss.
                    FetchError::NotFound { status } => FetchError::Status { status, page },
                    other => other,
                })?;
            tunes.extend(next.tunes);
        }

        debug!(
            "Member {} tunebook: {} tunes across {} page(s)",
            authoritative_id,
            tunes.len(),
            total_pages
        );

        Ok(Tunebook {
            requested_id: member_id,
            member_id: authoritative_id,
            tunes,
        })
    }

    /// `fetch_tunebook` under this client's retry policy.
    pub async fn fetch_tunebook_with_retry(&self, member_id: u32) -> Result<Tunebook> {
        self.retry_policy
            .run(move || self.fetch_tunebook(member_id))
            .await
    }
}

impl TunebookSource for CatalogClient {
    async fn fetch_tunebook(&self, member_id: u32) -> Result<Tunebook> {
        self.fetch_tunebook_with_retry(member_id).await
    }
}
