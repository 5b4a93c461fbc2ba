//! Bare-Multisig Consolidator CLI
//!
//! Builds and signs a consolidation of bare multisig outputs and prints the
//! raw transaction hex. Nothing is broadcast.

use bare_multisig_consolidator::core::{p2pkh_address, Network};
use bare_multisig_consolidator::multisig::{ScriptClassifier, SignType};
use bare_multisig_consolidator::{
    ConsolidateOptions, ConsolidationError, ConsolidationPlanner, ConsolidatorConfig, FeeRate,
    KeyMaterial,
};
use bitcoin::ScriptBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bare-multisig-consolidate")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Consolidate bare multisig UTXOs into a single output", long_about = None)]
struct Cli {
    /// JSON config file (endpoints, network, signing policy)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network override (bitcoin, testnet, regtest)
    #[arg(short, long, global = true)]
    network: Option<Network>,

    /// Indexer base URL override
    #[arg(long, global = true)]
    indexer_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, sign and print a consolidation transaction
    Consolidate {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show what would be consolidated without signing
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Check whether a script can be signed with a key
    Classify {
        /// Private key (hex or WIF)
        #[arg(long, env = "CONSOLIDATOR_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        /// Output script in hex
        #[arg(long)]
        script: String,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Private key (hex or WIF)
    #[arg(long, env = "CONSOLIDATOR_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Address holding the bare multisig outputs (default: P2PKH of the key)
    #[arg(short, long)]
    source: Option<String>,

    /// Fee rate in sat/vbyte, fractions allowed
    #[arg(short, long)]
    fee_rate: f64,

    /// Where to send the funds (default: source address)
    #[arg(short, long)]
    destination: Option<String>,

    /// Maximum number of inputs
    #[arg(long)]
    max_inputs: Option<usize>,

    /// Trust the indexer and skip spent lookups
    #[arg(long)]
    skip_spent_check: bool,
}

impl TargetArgs {
    fn options(&self) -> ConsolidateOptions {
        ConsolidateOptions {
            max_inputs_per_tx: self.max_inputs,
            skip_spent_check: self.skip_spent_check,
        }
    }

    fn source_address(&self, keys: &KeyMaterial, network: Network) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| p2pkh_address(keys.public_key(), network).to_string())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the transaction
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConsolidatorConfig::from_file(path)?,
        None => ConsolidatorConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(url) = cli.indexer_url {
        config.indexer_url = url;
    }

    match cli.command {
        Commands::Consolidate { target } => run_consolidate(config, &target),
        Commands::Plan { target } => run_plan(config, &target),
        Commands::Classify {
            private_key,
            script,
        } => cmd_classify(&private_key, &script),
    }
}

fn run_consolidate(
    config: ConsolidatorConfig,
    target: &TargetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = KeyMaterial::parse(&target.private_key)?;
    let source = target.source_address(&keys, config.network);
    let rt = tokio::runtime::Runtime::new()?;

    let raw_hex = rt.block_on(async {
        let mut planner = ConsolidationPlanner::from_config(config)?;
        planner
            .consolidate(
                &target.private_key,
                &source,
                target.fee_rate,
                target.destination.as_deref(),
                target.options(),
            )
            .await
    })?;

    println!("{}", raw_hex);
    Ok(())
}

fn run_plan(
    config: ConsolidatorConfig,
    target: &TargetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let keys = KeyMaterial::parse(&target.private_key)?;
    let source = target.source_address(&keys, config.network);
    let fee_rate = FeeRate::from_sat_per_vbyte(target.fee_rate).ok_or(
        ConsolidationError::InvalidFeeRate {
            rate: target.fee_rate,
            max: config.max_fee_rate,
        },
    )?;
    let rt = tokio::runtime::Runtime::new()?;

    let plan = rt.block_on(async {
        let mut planner = ConsolidationPlanner::from_config(config)?;
        planner
            .plan(
                &keys,
                &source,
                fee_rate,
                target.destination.as_deref(),
                target.options(),
            )
            .await
    })?;

    println!("📋 Consolidation plan for {}", source);
    println!("   Inputs:       {}", plan.inputs.len());
    for input in &plan.inputs {
        println!(
            "     {}:{}  {} sats  ({:?})",
            input.utxo.txid, input.utxo.vout, input.amount_sats, input.classification.sign_type
        );
    }
    println!("   Total in:     {} sats", plan.total_input_value());
    println!("   Est. vsize:   {} vB", plan.estimated_vsize());
    println!("   Fee:          {} sats ({} sat/vB)", plan.fee, plan.fee_rate.as_sat_per_vbyte());
    println!("   Output:       {} sats", plan.output_value);
    println!("   Filtered:     {}", plan.stats);
    Ok(())
}

fn cmd_classify(private_key: &str, script_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
    let keys = KeyMaterial::parse(private_key)?;
    let script = ScriptBuf::from_bytes(hex::decode(script_hex.trim())?);

    match ScriptClassifier::default().classify(&script, &keys.compressed(), &keys.uncompressed()) {
        Some(classification) => {
            let kind = match classification.sign_type {
                SignType::Compressed => "compressed key",
                SignType::Uncompressed => "uncompressed key",
                SignType::InvalidPubkeys => "raw match in data-carrying script",
            };
            println!("✅ Signable ({})", kind);
            println!("   Compressed key present:   {}", classification.our_key_is_compressed);
            println!("   Uncompressed key present: {}", classification.our_key_is_uncompressed);
        }
        None => println!("❌ Not signable with this key"),
    }
    Ok(())
}
