//! Indexing service client
//!
//! The indexer lists bare multisig outputs for an address. Spent status is
//! read from an Esplora-compatible `outspend` endpoint, which may live on a
//! different host.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{CandidateUtxo, IndexerError, OutspendStatus, UtxoListing};

/// UTXO discovery and spent-status lookups
#[async_trait]
pub trait IndexerApi: Send + Sync {
    /// Bare multisig outputs currently held by `address`
    async fn list_utxos(&self, address: &str) -> Result<Vec<CandidateUtxo>, IndexerError>;

    /// Whether `txid:vout` has been spent
    async fn is_spent(&self, txid: &str, vout: u32) -> Result<bool, IndexerError>;
}

/// HTTP implementation of [`IndexerApi`]
pub struct HttpIndexer {
    http: Client,
    indexer_url: String,
    spent_check_url: String,
}

impl std::fmt::Debug for HttpIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIndexer")
            .field("indexer_url", &self.indexer_url)
            .field("spent_check_url", &self.spent_check_url)
            .finish_non_exhaustive()
    }
}

impl HttpIndexer {
    pub fn new(
        indexer_url: &str,
        spent_check_url: &str,
        timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, indexer_url, spent_check_url))
    }

    /// Reuse an existing client (shared connection pool)
    pub fn with_client(http: Client, indexer_url: &str, spent_check_url: &str) -> Self {
        Self {
            http,
            indexer_url: indexer_url.trim_end_matches('/').to_string(),
            spent_check_url: spent_check_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, IndexerError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            log::debug!("GET {} failed with status {}", url, status);
            return Err(IndexerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IndexerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IndexerApi for HttpIndexer {
    async fn list_utxos(&self, address: &str) -> Result<Vec<CandidateUtxo>, IndexerError> {
        let url = format!("{}/addresses/{}/bare-multisig-utxos", self.indexer_url, address);
        let listing: UtxoListing = self.get_json(&url).await?;
        Ok(listing.into_utxos())
    }

    async fn is_spent(&self, txid: &str, vout: u32) -> Result<bool, IndexerError> {
        let url = format!("{}/tx/{}/outspend/{}", self.spent_check_url, txid, vout);
        let status: OutspendStatus = self.get_json(&url).await?;
        Ok(status.spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_trimmed() {
        let indexer =
            HttpIndexer::new("https://indexer.test/", "https://esplora.test/api//", Duration::from_secs(1))
                .unwrap();
        assert_eq!(indexer.indexer_url, "https://indexer.test");
        assert_eq!(indexer.spent_check_url, "https://esplora.test/api");
    }

    #[test]
    fn test_debug_hides_client() {
        let indexer =
            HttpIndexer::new("https://indexer.test", "https://esplora.test", Duration::from_secs(1))
                .unwrap();
        let debug = format!("{:?}", indexer);
        assert!(debug.contains("indexer.test"));
        assert!(debug.contains(".."));
    }
}
