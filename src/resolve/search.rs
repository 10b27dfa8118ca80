use std::sync::Arc;
use std::time::Duration;

use furse::Furse;
use thiserror::Error;

use crate::config::global::{ProviderKind, SearchConfig};
use crate::mod_site::Slug;
use crate::uwu_colors::{ErrStyle, PROJECT_ID_STYLE, PROVIDER_STYLE, SLUG_STYLE};

const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";
const BING_URL: &str = "https://www.bing.com/search";

/// Maps a query to a project slug.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider worked but found nothing usable.
    async fn search(&self, query: &str) -> Result<Option<Slug>, SearchError>;
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Query {0:?} is not a CurseForge project ID")]
    BadQuery(String),
    #[error("CurseForge Error: {0}")]
    Furse(#[from] furse::Error),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Looks the project up directly through the CurseForge API and classifies its website URL.
pub struct CurseForgeApiSearch {
    furse: Arc<Furse>,
}

impl CurseForgeApiSearch {
    pub fn new(furse: Arc<Furse>) -> Self {
        Self { furse }
    }
}

#[async_trait::async_trait]
impl SearchProvider for CurseForgeApiSearch {
    fn name(&self) -> &str {
        "CurseForge"
    }

    async fn search(&self, query: &str) -> Result<Option<Slug>, SearchError> {
        let project_id = query
            .trim()
            .parse::<i32>()
            .map_err(|_| SearchError::BadQuery(query.to_string()))?;
        let furse_mod = self.furse.get_mod(project_id).await?;
        Ok(Slug::find_in(furse_mod.links.website_url.as_str()))
    }
}

/// Scrapes a search engine's HTML result page for the first CurseForge project link.
pub struct WebSearch {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl WebSearch {
    /// The query is sent to `endpoint` as the `q` parameter.
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn duckduckgo(client: reqwest::Client) -> Self {
        Self::new("DuckDuckGo", DUCKDUCKGO_URL, client)
    }

    pub fn bing(client: reqwest::Client) -> Self {
        Self::new("Bing", BING_URL, client)
    }
}

#[async_trait::async_trait]
impl SearchProvider for WebSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Option<Slug>, SearchError> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(Slug::find_in(&body))
    }
}

/// Providers in priority order. The first usable answer wins and later providers are not
/// asked.
pub struct SearchChain {
    providers: Vec<Box<dyn SearchProvider>>,
    timeout: Duration,
}

impl SearchChain {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    /// Builds the configured providers. The CurseForge provider is left out without an API
    /// key.
    pub fn from_config(
        config: &SearchConfig,
        furse: Option<Arc<Furse>>,
        client: &reqwest::Client,
    ) -> Self {
        let mut providers: Vec<Box<dyn SearchProvider>> = Vec::with_capacity(config.providers.len());
        for kind in &config.providers {
            match kind {
                ProviderKind::CurseForge => match &furse {
                    Some(furse) => providers.push(Box::new(CurseForgeApiSearch::new(furse.clone()))),
                    None => log::debug!("No CurseForge API key, skipping the CurseForge search provider"),
                },
                ProviderKind::DuckDuckGo => providers.push(Box::new(WebSearch::duckduckgo(client.clone()))),
                ProviderKind::Bing => providers.push(Box::new(WebSearch::bing(client.clone()))),
            }
        }
        Self::new(providers, config.timeout())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn lookup(&self, project_id: u32) -> Option<Slug> {
        let query = project_id.to_string();
        for provider in &self.providers {
            let result = tokio::time::timeout(self.timeout, provider.search(&query))
                .await
                .unwrap_or(Err(SearchError::Timeout(self.timeout)));
            match result {
                Ok(Some(slug)) => {
                    log::debug!(
                        "[{}] Project {} is {}",
                        provider.name().errstyle(PROVIDER_STYLE),
                        project_id.errstyle(PROJECT_ID_STYLE),
                        slug.errstyle(SLUG_STYLE)
                    );
                    return Some(slug);
                }
                Ok(None) => log::debug!(
                    "[{}] No usable result for project {}",
                    provider.name().errstyle(PROVIDER_STYLE),
                    project_id.errstyle(PROJECT_ID_STYLE)
                ),
                Err(e) => log::debug!(
                    "[{}] Search for project {} failed: {}",
                    provider.name().errstyle(PROVIDER_STYLE),
                    project_id.errstyle(PROJECT_ID_STYLE),
                    e
                ),
            }
        }
        None
    }
}
