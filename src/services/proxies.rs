//! Proxy candidate providers for the resilient fetcher.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ProxyConfig;

/// Source of fresh proxy candidate lists.
///
/// The fetcher asks for a new list every time it exhausts the previous
/// one, so providers should not cache aggressively.
#[async_trait]
pub trait ProxyProvider: Send + Sync {
    /// Return a fresh list of proxy URLs (e.g. `http://1.2.3.4:8080`).
    async fn fresh_proxies(&self) -> Result<Vec<String>>;
}

/// Provider backed by a fixed list, for configuration-supplied proxies
/// and tests.
#[derive(Debug, Clone)]
pub struct StaticProxyProvider {
    proxies: Vec<String>,
}

impl StaticProxyProvider {
    pub fn new(proxies: Vec<String>) -> Self {
        Self { proxies }
    }
}

#[async_trait]
impl ProxyProvider for StaticProxyProvider {
    async fn fresh_proxies(&self) -> Result<Vec<String>> {
        Ok(self.proxies.clone())
    }
}

/// Provider that scrapes a public proxy-list page.
///
/// Expects the free-proxy-list table layout: one `<tr>` per proxy with the
/// IP in the first cell and the port in the second.
pub struct FreeProxyListProvider {
    client: reqwest::Client,
    list_url: String,
}

impl FreeProxyListProvider {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            list_url: config.list_url.clone(),
        })
    }
}

#[async_trait]
impl ProxyProvider for FreeProxyListProvider {
    async fn fresh_proxies(&self) -> Result<Vec<String>> {
        let html = self
            .client
            .get(&self.list_url)
            .send()
            .await?
            .text()
            .await?;

        let proxies = parse_proxy_table(&html);
        if proxies.is_empty() {
            return Err(AppError::fetch(
                &self.list_url,
                "proxy list page yielded no candidates",
            ));
        }
        Ok(proxies)
    }
}

/// Extract `http://ip:port` candidates from a proxy-list HTML table.
fn parse_proxy_table(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse("table tbody tr").expect("valid selector");
    let cell_sel = Selector::parse("td").expect("valid selector");

    document
        .select(&row_sel)
        .filter_map(|row| {
            let mut cells = row.select(&cell_sel);
            let ip: String = cells.next()?.text().collect();
            let port: String = cells.next()?.text().collect();
            let ip = ip.trim();
            let port = port.trim();
            if ip.is_empty() || port.parse::<u16>().is_err() {
                return None;
            }
            Some(format!("http://{ip}:{port}"))
        })
        .collect()
}
