//! Kernel access for monitoring sessions.
//!
//! The polling loop and the audit follower only see the [`DashboardSource`]
//! and [`EventSource`] seams; [`KernelClient`] is the HTTP implementation.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use vitals_core::{Assignment, AuditRecord, DeviceVitals};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("kernel unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("kernel answered HTTP {0}")]
    Status(u16),
}

/// Roster and recent vitals, as needed by one poll.
pub trait DashboardSource: Send + Sync {
    fn fetch_roster(&self) -> impl Future<Output = Result<Vec<Assignment>, SourceError>> + Send;

    /// `pairs` are `(device_id, since)`; only readings strictly newer than `since` come back.
    fn fetch_recent_vitals(
        &self,
        pairs: &[(String, String)],
        n: usize,
    ) -> impl Future<Output = Result<Vec<DeviceVitals>, SourceError>> + Send;
}

/// The kernel's two append-only logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFeed {
    /// Registrations, removals, account changes.
    Events,
    /// One `Data received` record per ingested reading.
    DataLog,
}

impl AuditFeed {
    pub fn path(self) -> &'static str {
        match self {
            AuditFeed::Events => "/events",
            AuditFeed::DataLog => "/datalog",
        }
    }
}

pub trait EventSource: Send + Sync {
    /// Records of `feed`, newest first.
    fn fetch_events(&self, feed: AuditFeed) -> impl Future<Output = Result<Vec<AuditRecord>, SourceError>> + Send;
}

#[derive(Debug, Clone)]
pub struct KernelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl KernelClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.http.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Repeated `deviceIds`/`timestamps` parameters, paired by position.
fn vitals_query(pairs: &[(String, String)], n: usize) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(pairs.len() * 2 + 1);
    for (device_id, since) in pairs {
        query.push(("deviceIds", device_id.clone()));
        query.push(("timestamps", since.clone()));
    }
    query.push(("n", n.to_string()));
    query
}

impl DashboardSource for KernelClient {
    async fn fetch_roster(&self) -> Result<Vec<Assignment>, SourceError> {
        Self::fetch_json(self.get("/patients")).await
    }

    async fn fetch_recent_vitals(&self, pairs: &[(String, String)], n: usize) -> Result<Vec<DeviceVitals>, SourceError> {
        let query = vitals_query(pairs, n);
        Self::fetch_json(self.get("/data").query(&query)).await
    }
}

impl EventSource for KernelClient {
    async fn fetch_events(&self, feed: AuditFeed) -> Result<Vec<AuditRecord>, SourceError> {
        Self::fetch_json(self.get(feed.path())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vitals_query_keeps_pairs_in_order() {
        let pairs = vec![
            ("w-1".to_string(), "2025-03-01T10:00:00Z".to_string()),
            ("w-2".to_string(), "2025-03-01T11:00:00Z".to_string()),
        ];
        let query = vitals_query(&pairs, 120);
        assert_eq!(
            query,
            vec![
                ("deviceIds", "w-1".to_string()),
                ("timestamps", "2025-03-01T10:00:00Z".to_string()),
                ("deviceIds", "w-2".to_string()),
                ("timestamps", "2025-03-01T11:00:00Z".to_string()),
                ("n", "120".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = KernelClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
