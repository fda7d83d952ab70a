//! HTTP feed fetcher with SSRF protection and resource limits.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{FeedFetcher, FetchOutcome};
use crate::article::{ArticleRepository, NewArticle};
use crate::config::FetcherConfig;
use crate::db::Database;
use crate::feed::{Feed, FeedRepository};
use crate::{FeedkeeperError, Result};

/// Window used to recompute a feed's publishing cadence.
const CADENCE_WINDOW_DAYS: i64 = 30;

/// Maximum entries stored per refresh.
const MAX_ENTRIES_PER_FETCH: usize = 200;

/// A parsed feed entry.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Default [`FeedFetcher`]: downloads over HTTP, parses with feed-rs and
/// stores new articles in the database.
pub struct HttpFeedFetcher {
    client: Client,
    db: Database,
    max_feed_size: u64,
}

impl HttpFeedFetcher {
    /// Create a fetcher from configuration.
    pub fn new(db: Database, config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FeedkeeperError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            db,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Download and parse the feed at `url`.
    async fn download(&self, url: &str) -> Result<Vec<ParsedEntry>> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedkeeperError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FeedkeeperError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FeedkeeperError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedkeeperError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(FeedkeeperError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        parse_feed(&bytes)
    }

    /// Store parsed entries and return the refresh outcome.
    async fn store(
        &self,
        feed_id: i64,
        entries: Vec<ParsedEntry>,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome> {
        let articles = ArticleRepository::new(self.db.pool());
        let mut new_articles = 0;

        for entry in entries.into_iter().take(MAX_ENTRIES_PER_FETCH) {
            let mut article = NewArticle::new(
                feed_id,
                entry.guid,
                entry.title,
                entry.published_at.unwrap_or(now),
            );
            if let Some(link) = entry.link {
                article = article.with_url(link);
            }
            if let Some(content) = entry.content {
                article = article.with_content(content);
            }

            if articles.create_or_ignore(&article).await?.is_some() {
                new_articles += 1;
            }
        }

        let since = now - chrono::Duration::days(CADENCE_WINDOW_DAYS);
        let articles_per_month = articles.count_published_since(feed_id, since).await? as f64;

        Ok(FetchOutcome {
            new_articles,
            articles_per_month,
        })
    }

    async fn refresh(&self, feed: &Feed, now: DateTime<Utc>) -> Result<FetchOutcome> {
        let entries = self.download(&feed.url).await?;
        self.store(feed.id, entries, now).await
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch_feed(
        &self,
        cancel: &CancellationToken,
        feed: &Feed,
        is_manual: bool,
    ) -> Result<FetchOutcome> {
        if cancel.is_cancelled() {
            return Err(FeedkeeperError::Cancelled);
        }

        debug!(
            "Refreshing feed {} ({}){}",
            feed.id,
            feed.url,
            if is_manual { " [manual]" } else { "" }
        );

        let now = Utc::now();
        let feeds = FeedRepository::new(self.db.pool());

        match self.refresh(feed, now).await {
            Ok(outcome) => {
                feeds
                    .record_success(feed.id, now, outcome.articles_per_month)
                    .await?;
                if outcome.new_articles > 0 {
                    info!(
                        "Feed {} updated: {} new article(s)",
                        feed.id, outcome.new_articles
                    );
                } else {
                    debug!("Feed {} updated: no new articles", feed.id);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!("Failed to refresh feed {}: {}", feed.id, e);
                if let Err(err) = feeds.record_failure(feed.id, now, &e.to_string()).await {
                    error!("Failed to record error for feed {}: {}", feed.id, err);
                }
                Err(e)
            }
        }
    }
}

/// Validate a URL for SSRF protection.
///
/// Only http and https are accepted, and the host may not be a loopback,
/// private or reserved address or an internal hostname.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| FeedkeeperError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(FeedkeeperError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| FeedkeeperError::Fetch("URL has no host".to_string()))?;

    let forbidden = match host {
        url::Host::Domain(domain) => is_forbidden_hostname(domain),
        url::Host::Ipv4(ipv4) => is_private_ip(&IpAddr::V4(ipv4)),
        url::Host::Ipv6(ipv6) => is_private_ip(&IpAddr::V6(ipv6)),
    };
    if forbidden {
        return Err(FeedkeeperError::Fetch(format!("forbidden host: {}", host)));
    }

    Ok(())
}

fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    if host == "localhost" {
        return true;
    }

    [".local", ".localhost", ".internal", ".intranet", ".corp", ".home", ".lan"]
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let first = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (first & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Parse RSS, Atom or JSON Feed bytes into entries.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<ParsedEntry>> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedkeeperError::Fetch(format!("failed to parse feed: {}", e)))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| ParsedEntry {
            guid: entry.id,
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string()),
            link: entry.links.first().map(|l| l.href.clone()),
            content: entry
                .content
                .and_then(|c| c.body)
                .or(entry.summary.map(|s| s.content)),
            published_at: entry.published.or(entry.updated),
        })
        .collect();

    Ok(entries)
}
