use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lpwallet_client::{
    all_networks, checksummed, collect_all, compute_range, create_and_encrypt,
    get_tick_at_sqrt_ratio, load_mint_requests, load_pool_state, network, parse_address,
    parse_decimal_to_ratio, plan_mints, prompt_new_password, ratio_to_sqrt_price_x96,
    remove_position, size_from_single_sided_amount, summarize_position, unix_now, Address,
    CollectParams, DecreaseLiquidityParams, KeyCache, PositionRange, TerminalPrompt, Token,
};

const KEY_FILE_ENV: &str = "LPWALLET_KEY_FILE";

#[derive(Parser)]
#[command(name = "lpwallet-cli")]
#[command(about = "encrypted key vault and liquidity position planning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key and store it encrypted at PATH.
    KeyCreate {
        path: PathBuf,
    },
    /// Print the address of the key in the key file.
    KeyAddress {
        #[command(flatten)]
        key: KeyArgs,
    },
    Tick {
        #[arg(long)]
        price: String,
    },
    Range {
        #[command(flatten)]
        prices: PriceArgs,
        #[arg(long)]
        pool_state: PathBuf,
    },
    Size {
        #[command(flatten)]
        prices: PriceArgs,
        #[arg(long)]
        pool_state: PathBuf,
        #[arg(long)]
        amount: u128,
        /// Commit token1 instead of token0.
        #[arg(long)]
        token1: bool,
    },
    Status {
        #[arg(long, allow_hyphen_values = true)]
        tick_lower: i32,
        #[arg(long, allow_hyphen_values = true)]
        tick_upper: i32,
        #[arg(long)]
        liquidity: u128,
        #[arg(long)]
        pool_state: PathBuf,
    },
    MintPlan {
        /// CSV with token0,token1,fee,maxAmount0,maxAmount1,priceLower,priceUpper
        /// columns, or a JSON array of requests.
        #[arg(long)]
        requests: PathBuf,
        #[arg(long)]
        pool_state: PathBuf,
        #[command(flatten)]
        recipient: RecipientArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    RemovePlan {
        #[arg(long)]
        token_id: u128,
        #[arg(long)]
        liquidity: u128,
        #[command(flatten)]
        recipient: RecipientArgs,
    },
    CollectPlan {
        #[arg(long)]
        token_id: u128,
        #[command(flatten)]
        recipient: RecipientArgs,
    },
    Networks {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args, Clone)]
struct KeyArgs {
    /// Falls back to LPWALLET_KEY_FILE.
    #[arg(long)]
    key_file: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct PriceArgs {
    #[arg(long)]
    price_lower: String,
    #[arg(long)]
    price_upper: String,
}

#[derive(Args, Clone)]
struct RecipientArgs {
    /// Explicit recipient; otherwise the unlocked key's address.
    #[arg(long)]
    recipient: Option<String>,
    #[command(flatten)]
    key: KeyArgs,
    #[arg(long, default_value = "goerli")]
    network: String,
}

#[derive(Serialize)]
struct RemovePlanOutput {
    network: &'static str,
    chain_id: u64,
    #[serde(with = "checksummed")]
    position_manager: Address,
    decrease: DecreaseLiquidityParams,
    collect: CollectParams,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cache = KeyCache::new();
    match cli.command {
        Commands::KeyCreate { path } => {
            let password = prompt_new_password(&TerminalPrompt)?;
            let (_, key) = create_and_encrypt(&path, &password)?;
            println!("key_file={}", path.display());
            println!("address={}", key.address()?);
        }
        Commands::KeyAddress { key } => {
            let path = resolve_key_file(&key)?;
            let signing_key = cache.unlock(&path, &TerminalPrompt)?;
            println!("address={}", signing_key.address()?);
        }
        Commands::Tick { price } => {
            let ratio = parse_decimal_to_ratio(&price)?;
            let sqrt_price = ratio_to_sqrt_price_x96(&ratio)?;
            let tick = get_tick_at_sqrt_ratio(&sqrt_price)?;
            println!("ratio={ratio}");
            println!("sqrt_price_x96={sqrt_price}");
            println!("tick={tick}");
        }
        Commands::Range { prices, pool_state } => {
            let pool = load_pool_state(&pool_state)?;
            let range = compute_range(&prices.price_lower, &prices.price_upper, &pool)?;
            println!("tick_lower={}", range.tick_lower);
            println!("tick_upper={}", range.tick_upper);
        }
        Commands::Size {
            prices,
            pool_state,
            amount,
            token1,
        } => {
            let pool = load_pool_state(&pool_state)?;
            let range = compute_range(&prices.price_lower, &prices.price_upper, &pool)?;
            let committed = if token1 { Token::Token1 } else { Token::Token0 };
            let sized = size_from_single_sided_amount(&pool, &range, amount, committed)?;
            println!("tick_lower={}", range.tick_lower);
            println!("tick_upper={}", range.tick_upper);
            println!("liquidity={}", sized.liquidity);
            println!("amount0={}", sized.amount0);
            println!("amount1={}", sized.amount1);
        }
        Commands::Status {
            tick_lower,
            tick_upper,
            liquidity,
            pool_state,
        } => {
            let pool = load_pool_state(&pool_state)?;
            let range = PositionRange {
                tick_lower,
                tick_upper,
            };
            let summary = summarize_position(&pool, &range, liquidity)?;
            println!("status={}", summary.status);
            println!("amount0={}", summary.amount0);
            println!("amount1={}", summary.amount1);
        }
        Commands::MintPlan {
            requests,
            pool_state,
            recipient,
            out,
        } => {
            let pool = load_pool_state(&pool_state)?;
            let requests = load_mint_requests(&requests)?;
            let net = network(&recipient.network)?;
            let to = resolve_recipient(&recipient, &cache)?;
            let plans = plan_mints(&requests, &pool, to, unix_now()?)?;
            tracing::info!(count = plans.len(), network = net.name, "planned mints");
            let serialized = serde_json::to_string_pretty(&serde_json::json!({
                "network": net.name,
                "chain_id": net.chain_id,
                "position_manager": net.position_manager.to_checksum(None),
                "plans": plans,
            }))?;
            write_output(&serialized, out.as_deref())?;
        }
        Commands::RemovePlan {
            token_id,
            liquidity,
            recipient,
        } => {
            let net = network(&recipient.network)?;
            let to = resolve_recipient(&recipient, &cache)?;
            let (decrease, collect) = remove_position(token_id, liquidity, to, unix_now()?)?;
            let output = RemovePlanOutput {
                network: net.name,
                chain_id: net.chain_id,
                position_manager: net.position_manager,
                decrease,
                collect,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::CollectPlan {
            token_id,
            recipient,
        } => {
            let net = network(&recipient.network)?;
            let to = resolve_recipient(&recipient, &cache)?;
            let serialized = serde_json::to_string_pretty(&serde_json::json!({
                "network": net.name,
                "position_manager": net.position_manager.to_checksum(None),
                "collect": collect_all(token_id, to),
            }))?;
            println!("{serialized}");
        }
        Commands::Networks { name } => {
            let networks = match name {
                Some(name) => vec![network(&name)?],
                None => all_networks()?,
            };
            println!("{}", serde_json::to_string_pretty(&networks)?);
        }
    }
    Ok(())
}

fn resolve_key_file(args: &KeyArgs) -> Result<PathBuf, String> {
    if let Some(path) = &args.key_file {
        return Ok(path.clone());
    }
    match std::env::var(KEY_FILE_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(PathBuf::from(value)),
        _ => Err(format!("no key file provided: pass --key-file or set {KEY_FILE_ENV}")),
    }
}

fn resolve_recipient(args: &RecipientArgs, cache: &KeyCache) -> Result<Address, String> {
    if let Some(recipient) = &args.recipient {
        return parse_address(recipient).map_err(|e| e.to_string());
    }
    let path = resolve_key_file(&args.key)?;
    let key = cache
        .unlock(&path, &TerminalPrompt)
        .map_err(|e| e.to_string())?;
    key.address().map_err(|e| e.to_string())
}

fn write_output(serialized: &str, out: Option<&Path>) -> Result<(), String> {
    if let Some(path) = out {
        fs::write(path, serialized).map_err(|e| e.to_string())?;
    } else {
        println!("{serialized}");
    }
    Ok(())
}
