//! Previous transaction retrieval
//!
//! Raw transactions are fetched from an ordered list of providers. A provider
//! that errors, times out or returns bytes for the wrong transaction is
//! skipped in favour of the next one. Results are cached by txid, failures
//! included, so each transaction is requested at most once per provider.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bitcoin::Transaction;

use super::types::IndexerError;
use crate::core::decode_transaction;

/// Source of raw transactions by txid
#[async_trait]
pub trait RawTxProvider: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Consensus-serialized bytes of `txid`
    async fn fetch_raw_tx(&self, txid: &str) -> Result<Vec<u8>, IndexerError>;
}

/// Esplora-compatible provider (`GET {base}/tx/{txid}/hex`)
#[derive(Debug, Clone)]
pub struct EsploraProvider {
    http: Client,
    base_url: String,
}

impl EsploraProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IndexerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RawTxProvider for EsploraProvider {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn fetch_raw_tx(&self, txid: &str) -> Result<Vec<u8>, IndexerError> {
        let url = format!("{}/tx/{}/hex", self.base_url, txid);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(IndexerError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        hex::decode(body.trim()).map_err(|e| IndexerError::Decode(e.to_string()))
    }
}

/// Txid-keyed cache over an ordered provider list
pub struct PrevTxFetcher {
    providers: Vec<Box<dyn RawTxProvider>>,
    timeout: Duration,
    cache: HashMap<String, Option<Transaction>>,
}

impl std::fmt::Debug for PrevTxFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("PrevTxFetcher")
            .field("providers", &names)
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl PrevTxFetcher {
    pub fn new(providers: Vec<Box<dyn RawTxProvider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            cache: HashMap::new(),
        }
    }

    /// Esplora providers for each endpoint, in order
    pub fn esplora(endpoints: &[String], timeout: Duration) -> Result<Self, IndexerError> {
        let http = Client::builder().timeout(timeout).build()?;
        let providers = endpoints
            .iter()
            .map(|endpoint| {
                Box::new(EsploraProvider::with_client(http.clone(), endpoint))
                    as Box<dyn RawTxProvider>
            })
            .collect();
        Ok(Self::new(providers, timeout))
    }

    /// Fetch every distinct txid not already cached.
    ///
    /// Returns the number of transactions no provider could supply.
    pub async fn prefetch<'a, I>(&mut self, txids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let pending: Vec<&str> = txids
            .into_iter()
            .filter(|txid| !self.cache.contains_key(*txid) && seen.insert(*txid))
            .collect();

        log::debug!("Fetching {} previous transactions", pending.len());

        let mut failed = 0;
        for txid in pending {
            let fetched = self.fetch_uncached(txid).await;
            if fetched.is_none() {
                failed += 1;
            }
            self.cache.insert(txid.to_string(), fetched);
        }
        failed
    }

    /// Cached transaction, if it was fetched successfully
    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.cache.get(txid).and_then(|tx| tx.as_ref())
    }

    async fn fetch_uncached(&self, txid: &str) -> Option<Transaction> {
        for provider in &self.providers {
            match self.fetch_from(provider.as_ref(), txid).await {
                Ok(tx) => {
                    log::debug!("Fetched {} from {}", txid, provider.name());
                    return Some(tx);
                }
                Err(e) => {
                    log::debug!("Provider {} failed for {}: {}", provider.name(), txid, e);
                }
            }
        }

        log::warn!(
            "Transaction {} unavailable from all {} providers",
            txid,
            self.providers.len()
        );
        None
    }

    async fn fetch_from(
        &self,
        provider: &dyn RawTxProvider,
        txid: &str,
    ) -> Result<Transaction, IndexerError> {
        let raw = tokio::time::timeout(self.timeout, provider.fetch_raw_tx(txid))
            .await
            .map_err(|_| IndexerError::Timeout(self.timeout))??;

        let tx = decode_transaction(&raw)?;
        let actual = tx.compute_txid().to_string();
        if !actual.eq_ignore_ascii_case(txid) {
            return Err(IndexerError::Decode(format!(
                "expected {}, got {}",
                txid, actual
            )));
        }
        Ok(tx)
    }
}
