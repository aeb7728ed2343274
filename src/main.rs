//! Paper Trading Client CLI
//!
//! Operational front end for the library: onboarding, trades, positions,
//! rankings, and competition settlement against the configured deployment.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paper_trading_client::accounts::PositionDirection;
use paper_trading_client::client::PaperTradingClient;
use paper_trading_client::config::{self, EngineConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

fn print_usage() {
    eprintln!("Usage: paper_trading_client <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                                    Initialization state of every pair");
    eprintln!("  init <SYMBOL>                             Create the pair account, paying the entry fee");
    eprintln!("  balances <SYMBOL>                         Balances of one pair");
    eprintln!("  buy <SYMBOL> <QUOTE_AMOUNT> <PRICE>       Spend quote on the base asset");
    eprintln!("  sell <SYMBOL> <BASE_AMOUNT> <PRICE>       Sell base back to quote");
    eprintln!("  open <SYMBOL> <long|short> <SIZE_QUOTE> <PRICE> [TAKE_PROFIT] [STOP_LOSS]");
    eprintln!("  close <POSITION_ADDRESS> <PRICE>          Close an active position");
    eprintln!("  positions                                 Active positions of the session identity");
    eprintln!("  leaderboard <INDEX:PRICE>...              Rankings at the given pair prices");
    eprintln!("  competition                               Current competition record");
    eprintln!("  join                                      Enroll the session identity in the competition");
    eprintln!("  settle                                    Apply the settle system to the competition");
    eprintln!("  airdrop <LAMPORTS>                        Request devnet lamports on the base chain");
    eprintln!("  env-example                               Print a template .env file");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_amount(raw: &str, what: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("{} must be a number, got {:?}", what, raw))
}

fn parse_direction(raw: &str) -> Result<PositionDirection> {
    match raw.to_ascii_lowercase().as_str() {
        "long" => Ok(PositionDirection::Long),
        "short" => Ok(PositionDirection::Short),
        other => bail!("direction must be long or short, got {:?}", other),
    }
}

/// Parse `INDEX:PRICE` arguments into the price map the leaderboard expects
fn parse_prices(args: &[String]) -> Result<HashMap<u8, f64>> {
    let mut prices = HashMap::new();
    for arg in args {
        let (index, price) = arg
            .split_once(':')
            .with_context(|| format!("expected INDEX:PRICE, got {:?}", arg))?;
        let index: u8 = index
            .parse()
            .with_context(|| format!("bad pair index in {:?}", arg))?;
        let price = parse_amount(price, "price")?;
        prices.insert(index, price);
    }
    Ok(prices)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    if command == "env-example" {
        print!("{}", config::create_env_example());
        return Ok(());
    }

    let config = EngineConfig::from_env()?;
    let client = PaperTradingClient::new(config)?;

    match (command.as_str(), &args[1..]) {
        ("status", []) => print_json(&client.account_status().await?)?,
        ("init", [symbol]) => print_json(&client.initialize_account(symbol).await?)?,
        ("balances", [symbol]) => match client.balances(symbol).await? {
            Some(view) => print_json(&view)?,
            None => println!("{} account not initialized", symbol),
        },
        ("buy", [symbol, amount, price]) => {
            let receipt = client
                .buy(
                    symbol,
                    parse_amount(amount, "quote amount")?,
                    parse_amount(price, "price")?,
                )
                .await?;
            print_json(&receipt)?;
        }
        ("sell", [symbol, amount, price]) => {
            let receipt = client
                .sell(
                    symbol,
                    parse_amount(amount, "base amount")?,
                    parse_amount(price, "price")?,
                )
                .await?;
            print_json(&receipt)?;
        }
        ("open", [symbol, direction, size, price, rest @ ..]) if rest.len() <= 2 => {
            let take_profit = rest
                .first()
                .map(|raw| parse_amount(raw, "take profit"))
                .transpose()?;
            let stop_loss = rest
                .get(1)
                .map(|raw| parse_amount(raw, "stop loss"))
                .transpose()?;
            let receipt = client
                .open_position(
                    symbol,
                    parse_direction(direction)?,
                    parse_amount(size, "position size")?,
                    parse_amount(price, "price")?,
                    take_profit,
                    stop_loss,
                )
                .await?;
            print_json(&receipt)?;
        }
        ("close", [address, price]) => {
            let address = Pubkey::from_str(address)
                .with_context(|| format!("bad position address {:?}", address))?;
            let receipt = client
                .close_position(&address, parse_amount(price, "price")?)
                .await?;
            print_json(&receipt)?;
        }
        ("positions", []) => print_json(&client.open_positions().await?)?,
        ("leaderboard", prices) if !prices.is_empty() => {
            print_json(&client.leaderboard(&parse_prices(prices)?).await?)?;
        }
        ("competition", []) => match client.competition().await? {
            Some(record) => print_json(&record)?,
            None => println!("No competition record on chain"),
        },
        ("join", []) => print_json(&client.join_competition().await?)?,
        ("settle", []) => print_json(&client.settle_competition().await?)?,
        ("airdrop", [lamports]) => {
            let lamports: u64 = lamports
                .parse()
                .with_context(|| format!("lamports must be an integer, got {:?}", lamports))?;
            let signature = client.request_airdrop(lamports).await?;
            println!("{}", signature);
        }
        _ => {
            print_usage();
            bail!("unknown command or wrong arguments: {:?}", args);
        }
    }

    Ok(())
}
