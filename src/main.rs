use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use txledger::sync::{run_double_spend, ScenarioOptions};
use txledger::tx::{Amount, TransactionCodec};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "ledger-sim")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a four-node network and double-spend across the split
    Doublespend {
        /// Mine node 0's spends before the network heals
        #[arg(long)]
        mine_block: bool,
        /// Coins each funded wallet starts with
        #[arg(long, default_value = "750")]
        starting_balance: Amount,
        /// Fee on the raw double-spend (negative)
        #[arg(long, default_value = "-0.02", allow_hyphen_values = true)]
        doublespend_fee: Amount,
    },
    /// Decode a hex-encoded transaction and check its id
    Decode {
        hex: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Doublespend {
            mine_block,
            starting_balance,
            doublespend_fee,
        } => {
            let options = ScenarioOptions::new()
                .with_mine_block(mine_block)
                .with_starting_balance(starting_balance)
                .with_doublespend_fee(doublespend_fee);
            info!(mine_block, %starting_balance, %doublespend_fee, "running double-spend scenario");

            match run_double_spend(&options) {
                Ok(report) => {
                    println!("{report}");
                    if !report.is_consistent() {
                        std::process::exit(2);
                    }
                }
                Err(e) => {
                    error!("scenario failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Decode { hex } => match TransactionCodec::decode_hex(&hex) {
            Ok(tx) => {
                println!("txid:    {}", tx.id());
                println!("id ok:   {}", tx.compute_id() == *tx.id());
                println!("fee:     {}", tx.fee());
                for input in tx.inputs() {
                    println!("input:   {input}");
                }
                for output in tx.outputs() {
                    println!("output:  {} {}", output.address(), output.amount());
                }
            }
            Err(e) => {
                error!("decode failed: {}", e);
                std::process::exit(1);
            }
        },
    }
}
