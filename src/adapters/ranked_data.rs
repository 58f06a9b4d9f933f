//! External ranked-data lookup (spec §1 "Deliberately out of scope ...
//! third-party ranked-data lookup", §6 configuration `ranked_data`).
//! Grounded on the teacher's `Retriever` (`services/retriever/mod.rs`):
//! a thin struct holding the remote host, reused across requests via a
//! shared `reqwest::Client`.

use crate::error::CoreError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RankedLookup {
    pub summoner_name: String,
    pub tier: String,
    pub division: String,
    pub league_points: i32,
}

#[async_trait]
pub trait RankedDataClient: Send + Sync {
    async fn lookup(&self, summoner_name: &str) -> Result<Option<RankedLookup>, CoreError>;
}

pub struct HttpRankedDataClient {
    client: Client,
    base_url: String,
}

impl HttpRankedDataClient {
    pub fn new(base_url: String) -> Self {
        HttpRankedDataClient {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl RankedDataClient for HttpRankedDataClient {
    async fn lookup(&self, summoner_name: &str) -> Result<Option<RankedLookup>, CoreError> {
        let url = format!("{}/ranked/{}", self.base_url, summoner_name);
        debug!("looking up ranked data at {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::DownstreamUnavailable {
                what: "ranked_data",
                source: Box::new(e),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        response
            .error_for_status()
            .map_err(|e| CoreError::DownstreamUnavailable {
                what: "ranked_data",
                source: Box::new(e),
            })?
            .json::<RankedLookup>()
            .await
            .map(Some)
            .map_err(|e| CoreError::DownstreamUnavailable {
                what: "ranked_data",
                source: Box::new(e),
            })
    }
}

/// Used when `ranked_data.enabled = false` (spec §6 configuration).
pub struct DisabledRankedDataClient;

#[async_trait]
impl RankedDataClient for DisabledRankedDataClient {
    async fn lookup(&self, _summoner_name: &str) -> Result<Option<RankedLookup>, CoreError> {
        Ok(None)
    }
}
