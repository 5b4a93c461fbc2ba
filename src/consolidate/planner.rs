//! Consolidation planning and execution
//!
//! Discovers bare multisig outputs at an address, keeps the ones our key can
//! sign, reads their exact values from the previous transactions and sweeps
//! them into a single output.

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::{Amount, OutPoint, ScriptBuf, Transaction, TxOut};
use serde::Serialize;

use crate::config::{ConsolidateOptions, ConsolidatorConfig};
use crate::core::{
    address_to_script, consolidation_fee, consolidation_transaction,
    estimate_consolidation_vsize, FeeRate,
};
use crate::crypto::{KeyError, KeyMaterial};
use crate::error::ConsolidationError;
use crate::indexer::{CandidateUtxo, HttpIndexer, IndexerApi, PrevTxFetcher};
use crate::multisig::{
    finalize_inputs, sign_inputs, ScriptClassification, ScriptClassifier, SigningOptions,
    SigningSession,
};

// =============================================================================
// Plan Types
// =============================================================================

/// How many UTXOs each planning stage dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// Reported by the indexer
    pub listed: usize,
    /// Not signable with our key
    pub unclassifiable: usize,
    pub spent: usize,
    /// Spent lookups that failed; those UTXOs are kept
    pub spent_check_failed: usize,
    /// Previous transaction unavailable from every provider
    pub unavailable: usize,
    /// Previous output missing or different from the indexer's script
    pub prevout_mismatch: usize,
    /// Eligible but over the input cap
    pub capped: usize,
}

impl std::fmt::Display for FilterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "listed {}, unclassifiable {}, spent {}, spent check failed {}, unavailable {}, \
             prevout mismatch {}, capped {}",
            self.listed,
            self.unclassifiable,
            self.spent,
            self.spent_check_failed,
            self.unavailable,
            self.prevout_mismatch,
            self.capped
        )
    }
}

/// One input of the consolidation
#[derive(Debug, Clone)]
pub struct PlannedInput {
    pub utxo: CandidateUtxo,
    pub outpoint: OutPoint,
    pub classification: ScriptClassification,
    /// Exact value read from the previous transaction
    pub amount_sats: u64,
}

/// Inputs, destination and fee of a consolidation, ready to sign
#[derive(Debug, Clone)]
pub struct ConsolidationPlan {
    pub inputs: Vec<PlannedInput>,
    pub destination_script: ScriptBuf,
    pub fee_rate: FeeRate,
    pub fee: u64,
    pub output_value: u64,
    pub stats: FilterStats,
}

impl ConsolidationPlan {
    pub fn total_input_value(&self) -> u64 {
        self.inputs.iter().map(|i| i.amount_sats).sum()
    }

    pub fn estimated_vsize(&self) -> usize {
        estimate_consolidation_vsize(self.inputs.len(), &[self.destination_script.len()])
    }

    /// The unsigned single-output transaction spending every planned input
    pub fn unsigned_transaction(&self) -> Transaction {
        consolidation_transaction(
            self.inputs.iter().map(|i| i.outpoint),
            TxOut {
                value: Amount::from_sat(self.output_value),
                script_pubkey: self.destination_script.clone(),
            },
        )
    }

    pub fn classifications(&self) -> Vec<ScriptClassification> {
        self.inputs.iter().map(|i| i.classification.clone()).collect()
    }
}

/// A listed UTXO our key can sign, before its previous transaction is read
struct Eligible {
    utxo: CandidateUtxo,
    outpoint: OutPoint,
    script: ScriptBuf,
    classification: ScriptClassification,
}

// =============================================================================
// Planner
// =============================================================================

/// Drives discovery, filtering, fee calculation, signing and finalization
pub struct ConsolidationPlanner {
    indexer: Box<dyn IndexerApi>,
    fetcher: PrevTxFetcher,
    classifier: ScriptClassifier,
    config: ConsolidatorConfig,
}

impl std::fmt::Debug for ConsolidationPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationPlanner")
            .field("fetcher", &self.fetcher)
            .field("classifier", &self.classifier)
            .field("network", &self.config.network)
            .finish_non_exhaustive()
    }
}

impl ConsolidationPlanner {
    pub fn new(
        indexer: Box<dyn IndexerApi>,
        fetcher: PrevTxFetcher,
        config: ConsolidatorConfig,
    ) -> Self {
        Self {
            indexer,
            fetcher,
            classifier: ScriptClassifier::default(),
            config,
        }
    }

    /// Planner backed by the HTTP indexer and Esplora providers in `config`
    pub fn from_config(config: ConsolidatorConfig) -> Result<Self, ConsolidationError> {
        config.validate()?;
        let timeout = config.request_timeout();
        let indexer = HttpIndexer::new(&config.indexer_url, &config.spent_check_url, timeout)?;
        let fetcher = PrevTxFetcher::esplora(&config.raw_tx_endpoints, timeout)?;
        Ok(Self::new(Box::new(indexer), fetcher, config))
    }

    /// Replace the default matcher chain
    pub fn with_classifier(mut self, classifier: ScriptClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &ConsolidatorConfig {
        &self.config
    }

    /// Build, sign and finalize a consolidation, returning the raw hex.
    ///
    /// Nothing is broadcast.
    pub async fn consolidate(
        &mut self,
        private_key: &str,
        source_address: &str,
        fee_rate_sat_per_vbyte: f64,
        destination_address: Option<&str>,
        options: ConsolidateOptions,
    ) -> Result<String, ConsolidationError> {
        let keys = KeyMaterial::parse(private_key)?;
        let fee_rate = FeeRate::from_sat_per_vbyte(fee_rate_sat_per_vbyte).ok_or(
            ConsolidationError::InvalidFeeRate {
                rate: fee_rate_sat_per_vbyte,
                max: self.config.max_fee_rate,
            },
        )?;

        let plan = self
            .plan(&keys, source_address, fee_rate, destination_address, options)
            .await?;
        let tx = self.sign(&keys, &plan)?;

        log::info!(
            "Consolidated {} inputs into {} sats (fee {} sats, txid {})",
            plan.inputs.len(),
            plan.output_value,
            plan.fee,
            tx.compute_txid()
        );
        Ok(serialize_hex(&tx))
    }

    /// Discover and filter UTXOs and size the single output
    pub async fn plan(
        &mut self,
        keys: &KeyMaterial,
        source_address: &str,
        fee_rate: FeeRate,
        destination_address: Option<&str>,
        options: ConsolidateOptions,
    ) -> Result<ConsolidationPlan, ConsolidationError> {
        if !fee_rate.is_within(self.config.max_fee_rate) {
            return Err(ConsolidationError::InvalidFeeRate {
                rate: fee_rate.as_sat_per_vbyte(),
                max: self.config.max_fee_rate,
            });
        }
        if options.max_inputs_per_tx == Some(0) {
            return Err(ConsolidationError::InvalidInputCap);
        }
        let destination = destination_address.unwrap_or(source_address);
        let destination_script = address_to_script(destination, self.config.network)?;

        let utxos = self.indexer.list_utxos(source_address).await?;
        if utxos.is_empty() {
            return Err(ConsolidationError::NoUtxos);
        }

        let mut stats = FilterStats {
            listed: utxos.len(),
            ..FilterStats::default()
        };
        log::info!("Indexer reported {} bare multisig UTXOs for {}", utxos.len(), source_address);

        let eligible = self.select_signable(keys, utxos, &mut stats)?;
        let eligible = if options.skip_spent_check {
            eligible
        } else {
            self.drop_spent(eligible, &mut stats).await
        };

        let mut inputs = self.resolve_amounts(eligible, &mut stats).await;
        if inputs.is_empty() {
            log::warn!("No UTXOs left after filtering ({})", stats);
            return Err(ConsolidationError::NoSuitableUtxos { stats });
        }

        if let Some(max) = options.max_inputs_per_tx {
            if inputs.len() > max {
                stats.capped = inputs.len() - max;
                inputs.truncate(max);
            }
        }
        log::info!("Planning with {} inputs ({})", inputs.len(), stats);

        let available = inputs
            .iter()
            .fold(0u64, |sum, input| sum.saturating_add(input.amount_sats));
        let fee = consolidation_fee(inputs.len(), destination_script.len(), fee_rate);
        if available <= fee {
            log::warn!("Inputs worth {} sats cannot cover fee of {} sats", available, fee);
            return Err(ConsolidationError::InsufficientFunds { available, fee });
        }

        Ok(ConsolidationPlan {
            inputs,
            destination_script,
            fee_rate,
            fee,
            output_value: available - fee,
            stats,
        })
    }

    /// Sign and finalize every input of `plan`
    pub fn sign(
        &self,
        keys: &KeyMaterial,
        plan: &ConsolidationPlan,
    ) -> Result<Transaction, ConsolidationError> {
        let classifications = plan.classifications();
        let mut session = SigningSession::new(plan.unsigned_transaction(), self.signing_options());

        sign_inputs(&mut session, keys, &classifications)?;
        finalize_inputs(&mut session, &classifications)?;
        Ok(session.extract_tx()?)
    }

    fn signing_options(&self) -> SigningOptions {
        self.config.signing_options()
    }

    /// Keep UTXOs our key can sign; malformed records abort the run
    fn select_signable(
        &self,
        keys: &KeyMaterial,
        utxos: Vec<CandidateUtxo>,
        stats: &mut FilterStats,
    ) -> Result<Vec<Eligible>, ConsolidationError> {
        let compressed = keys.compressed();
        let uncompressed = keys.uncompressed();
        let mut eligible = Vec::with_capacity(utxos.len());

        for utxo in utxos {
            let malformed = |source| ConsolidationError::MalformedUtxo {
                txid: utxo.txid.clone(),
                vout: utxo.vout,
                source,
            };
            let script = utxo.script_pubkey().map_err(malformed)?;
            let outpoint = utxo.outpoint().map_err(malformed)?;

            match self.classifier.classify(&script, &compressed, &uncompressed) {
                Some(classification) if classification.can_sign() => eligible.push(Eligible {
                    utxo,
                    outpoint,
                    script,
                    classification,
                }),
                _ => {
                    log::debug!("Skipping {}:{}: not signable with our key", utxo.txid, utxo.vout);
                    stats.unclassifiable += 1;
                }
            }
        }

        log::debug!("{} UTXOs signable with our key", eligible.len());
        Ok(eligible)
    }

    /// Drop UTXOs the spent-check endpoint reports as spent.
    ///
    /// A failed lookup keeps the UTXO.
    async fn drop_spent(&self, eligible: Vec<Eligible>, stats: &mut FilterStats) -> Vec<Eligible> {
        let mut unspent = Vec::with_capacity(eligible.len());
        for candidate in eligible {
            match self.indexer.is_spent(&candidate.utxo.txid, candidate.utxo.vout).await {
                Ok(true) => {
                    log::debug!("Skipping {}:{}: already spent", candidate.utxo.txid, candidate.utxo.vout);
                    stats.spent += 1;
                }
                Ok(false) => unspent.push(candidate),
                Err(e) => {
                    log::warn!(
                        "Spent check failed for {}:{} ({}), keeping it",
                        candidate.utxo.txid,
                        candidate.utxo.vout,
                        e
                    );
                    stats.spent_check_failed += 1;
                    unspent.push(candidate);
                }
            }
        }
        unspent
    }

    /// Read exact prevout values, fetching each previous transaction once
    async fn resolve_amounts(
        &mut self,
        eligible: Vec<Eligible>,
        stats: &mut FilterStats,
    ) -> Vec<PlannedInput> {
        let failed = self
            .fetcher
            .prefetch(eligible.iter().map(|c| c.utxo.txid.as_str()))
            .await;
        if failed > 0 {
            log::warn!("{} previous transactions could not be fetched", failed);
        }

        let mut inputs = Vec::with_capacity(eligible.len());
        for candidate in eligible {
            let Some(prev_tx) = self.fetcher.get(&candidate.utxo.txid) else {
                stats.unavailable += 1;
                continue;
            };

            let prevout = prev_tx.output.get(candidate.utxo.vout as usize);
            match prevout {
                Some(output) if output.script_pubkey == candidate.script => {
                    let amount_sats = output.value.to_sat();
                    if amount_sats != candidate.utxo.reported_sats() {
                        log::debug!(
                            "{}:{} indexer reports {} sats, previous transaction has {}",
                            candidate.utxo.txid,
                            candidate.utxo.vout,
                            candidate.utxo.reported_sats(),
                            amount_sats
                        );
                    }
                    inputs.push(PlannedInput {
                        amount_sats,
                        utxo: candidate.utxo,
                        outpoint: candidate.outpoint,
                        classification: candidate.classification,
                    });
                }
                _ => {
                    log::warn!(
                        "Skipping {}:{}: previous output missing or script differs",
                        candidate.utxo.txid,
                        candidate.utxo.vout
                    );
                    stats.prevout_mismatch += 1;
                }
            }
        }
        inputs
    }
}

/// Consolidate with HTTP collaborators built from `config`
pub async fn consolidate_bare_multisig(
    config: ConsolidatorConfig,
    private_key: &str,
    source_address: &str,
    fee_rate_sat_per_vbyte: f64,
    destination_address: Option<&str>,
    options: ConsolidateOptions,
) -> Result<String, ConsolidationError> {
    // Blank keys fail before any client is built
    if private_key.trim().is_empty() {
        return Err(KeyError::MissingPrivateKey.into());
    }
    let mut planner = ConsolidationPlanner::from_config(config)?;
    planner
        .consolidate(
            private_key,
            source_address,
            fee_rate_sat_per_vbyte,
            destination_address,
            options,
        )
        .await
}
