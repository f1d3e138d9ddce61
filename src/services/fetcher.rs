//! Resilient page fetching.
//!
//! Every attempt, direct or proxied, draws a fresh identity from the
//! header pool so consecutive requests do not reuse a fingerprint. In
//! proxy mode the fetcher walks candidate lists with a fail-fast timeout
//! and refreshes the list when it is exhausted, up to a bounded number of
//! rounds. Pages that carry a bot-challenge marker are handed to a
//! pluggable solver before being returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{HunterConfig, ProxyConfig};
use crate::services::proxies::{FreeProxyListProvider, ProxyProvider, StaticProxyProvider};

/// Explicitly owned pool of identity headers.
///
/// No process-wide rotation state: tests inject a single-entry pool to get
/// deterministic requests.
#[derive(Debug, Clone)]
pub struct HeaderRotator {
    user_agents: Vec<String>,
}

impl HeaderRotator {
    pub fn new(user_agents: Vec<String>) -> Result<Self> {
        if user_agents.is_empty() {
            return Err(AppError::config("identity pool must not be empty"));
        }
        Ok(Self { user_agents })
    }

    /// Draw a random identity from the pool.
    pub fn next_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .expect("pool is non-empty by construction")
    }
}

/// Bot-challenge variants a solver can be asked to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Tick-the-box style challenge
    Checkbox,
    /// Invisible token-style challenge
    Token,
}

/// A fetched page before extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the content was fetched from
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl FetchedPage {
    /// Parse the body as an HTML document.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Detect a bot-challenge marker in the body, and which variant.
    pub fn challenge(&self) -> Option<ChallengeKind> {
        if !self.body.contains("g-recaptcha") {
            return None;
        }
        if self.body.contains("recaptcha-checkbox") {
            Some(ChallengeKind::Checkbox)
        } else {
            Some(ChallengeKind::Token)
        }
    }
}

/// Pluggable bot-challenge solver.
///
/// Implementations cover the checkbox and token variants; the fetcher only
/// detects the challenge and delegates.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Solve the challenge on `page` and return the unlocked content.
    async fn solve(&self, page: &FetchedPage, kind: ChallengeKind) -> Result<FetchedPage>;
}

/// HTTP fetcher with identity rotation, proxy fallback and challenge
/// delegation.
pub struct ResilientFetcher {
    client: reqwest::Client,
    rotator: HeaderRotator,
    request_delay: Duration,
    proxies: Option<Arc<dyn ProxyProvider>>,
    proxy_config: ProxyConfig,
    solver: Option<Arc<dyn ChallengeSolver>>,
}

impl ResilientFetcher {
    /// Create a direct (proxyless) fetcher.
    pub fn new(rotator: HeaderRotator, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rotator,
            request_delay: Duration::ZERO,
            proxies: None,
            proxy_config: ProxyConfig::default(),
            solver: None,
        })
    }

    /// Build a fetcher from the application configuration, wiring up the
    /// request delay and the proxy provider when proxy mode is enabled.
    /// A configured `static_list` takes precedence over scraping the
    /// proxy-list page.
    pub fn from_config(config: &HunterConfig) -> Result<Self> {
        let rotator = HeaderRotator::new(config.crawler.user_agents.clone())?;
        let mut fetcher = Self::new(rotator, Duration::from_secs(config.crawler.timeout_secs))?
            .with_request_delay(Duration::from_millis(config.crawler.request_delay_ms));
        if config.uses_proxy() {
            let provider: Arc<dyn ProxyProvider> = if config.proxy.static_list.is_empty() {
                Arc::new(FreeProxyListProvider::new(&config.proxy)?)
            } else {
                Arc::new(StaticProxyProvider::new(config.proxy.static_list.clone()))
            };
            fetcher = fetcher.with_proxies(provider, config.proxy.clone());
        }
        Ok(fetcher)
    }

    /// Pause this long before every fetch, pacing requests to the sites.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Route all fetches through rotating proxies from `provider`.
    pub fn with_proxies(
        mut self,
        provider: Arc<dyn ProxyProvider>,
        proxy_config: ProxyConfig,
    ) -> Self {
        self.proxies = Some(provider);
        self.proxy_config = proxy_config;
        self
    }

    /// Delegate detected bot challenges to `solver`.
    pub fn with_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Fetch a URL, rotating identity per attempt.
    ///
    /// Honors the configured request delay before touching the network.
    /// Dropping the returned future cancels the fetch at the next await
    /// point; callers needing a deadline race this against a timer.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let page = match &self.proxies {
            Some(provider) => self.fetch_via_proxies(url, provider.as_ref()).await?,
            None => self.fetch_direct(url).await?,
        };

        if let (Some(kind), Some(solver)) = (page.challenge(), &self.solver) {
            log::info!("Bot challenge ({kind:?}) on {url}, delegating to solver");
            return solver.solve(&page, kind).await;
        }
        Ok(page)
    }

    /// Single direct request. Non-200 responses are logged and returned
    /// as-is; only transport failures are errors.
    async fn fetch_direct(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.rotator.next_user_agent())
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;

        if !status.is_success() {
            log::warn!("Got response ({}) from {url}", status.as_u16());
        }

        Ok(FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// Walk fresh candidate lists until one proxy delivers an HTTP
    /// success, refreshing the list when it is exhausted. Bounded by
    /// `proxy.max_rounds` so a dead pool cannot block a run forever.
    async fn fetch_via_proxies(
        &self,
        url: &str,
        provider: &dyn ProxyProvider,
    ) -> Result<FetchedPage> {
        let timeout = Duration::from_millis(self.proxy_config.timeout_ms);

        for round in 1..=self.proxy_config.max_rounds {
            let candidates = provider.fresh_proxies().await?;
            log::debug!(
                "Proxy round {round}/{}: {} candidates",
                self.proxy_config.max_rounds,
                candidates.len()
            );

            for proxy in &candidates {
                match self.fetch_via_proxy(url, proxy, timeout).await {
                    Ok(page) if (200..300).contains(&page.status) => return Ok(page),
                    Ok(page) => {
                        log::warn!("Got response ({}) via proxy {proxy}", page.status);
                    }
                    Err(e) => {
                        log::warn!("Proxy {proxy} failed: {e}. Trying next proxy.");
                    }
                }
            }
        }

        Err(AppError::fetch(
            url,
            format!(
                "no working proxy after {} rounds",
                self.proxy_config.max_rounds
            ),
        ))
    }

    async fn fetch_via_proxy(
        &self,
        url: &str,
        proxy: &str,
        timeout: Duration,
    ) -> Result<FetchedPage> {
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy)?)
            .timeout(timeout)
            .build()?;

        let response = client
            .get(url)
            .header(USER_AGENT, self.rotator.next_user_agent())
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://example.com".to_string(),
            status: 200,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_rotator_rejects_empty_pool() {
        assert!(HeaderRotator::new(vec![]).is_err());
    }

    #[test]
    fn test_rotator_single_entry_is_deterministic() {
        let rotator = HeaderRotator::new(vec!["test-agent/1.0".into()]).unwrap();
        for _ in 0..10 {
            assert_eq!(rotator.next_user_agent(), "test-agent/1.0");
        }
    }

    #[test]
    fn test_challenge_detection() {
        assert_eq!(page("<html>plain listing</html>").challenge(), None);
        assert_eq!(
            page("<div class=\"g-recaptcha\" data-sitekey=\"x\"></div>").challenge(),
            Some(ChallengeKind::Token)
        );
        assert_eq!(
            page("<div class=\"g-recaptcha\"><span class=\"recaptcha-checkbox\"></span></div>")
                .challenge(),
            Some(ChallengeKind::Checkbox)
        );
    }

    #[test]
    fn test_document_parses_body() {
        let page = page("<html><body><h1>Flat</h1></body></html>");
        let sel = scraper::Selector::parse("h1").unwrap();
        let document = page.document();
        let title: String = document.select(&sel).next().unwrap().text().collect();
        assert_eq!(title, "Flat");
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProxyProvider for CountingProvider {
        async fn fresh_proxies(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_request_delay_is_applied() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let rotator = HeaderRotator::new(vec!["test-agent/1.0".into()]).unwrap();
        let proxy_config = ProxyConfig {
            enabled: true,
            max_rounds: 1,
            ..ProxyConfig::default()
        };
        let fetcher = ResilientFetcher::new(rotator, Duration::from_secs(5))
            .unwrap()
            .with_request_delay(Duration::from_millis(50))
            .with_proxies(Arc::clone(&provider) as Arc<dyn ProxyProvider>, proxy_config);

        let started = std::time::Instant::now();
        let result = fetcher.fetch("https://example.com/liste").await;

        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_from_config_wires_static_proxies() {
        let mut config = crate::models::HunterConfig::default();
        config.proxy.enabled = true;
        config.proxy.static_list = vec!["http://10.0.0.1:8080".into()];

        // No proxy-list page is scraped when a static list is configured,
        // so construction succeeds without touching the network.
        assert!(ResilientFetcher::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_proxy_retry_is_bounded() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let rotator = HeaderRotator::new(vec!["test-agent/1.0".into()]).unwrap();
        let proxy_config = ProxyConfig {
            enabled: true,
            max_rounds: 3,
            ..ProxyConfig::default()
        };
        let fetcher = ResilientFetcher::new(rotator, Duration::from_secs(5))
            .unwrap()
            .with_proxies(Arc::clone(&provider) as Arc<dyn ProxyProvider>, proxy_config);

        let result = fetcher.fetch("https://example.com/liste").await;

        assert!(matches!(result, Err(AppError::Fetch { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }
}
