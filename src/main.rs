//! Currency Router command line
//!
//! ```text
//! currency_router [--env <env>] balance <account-uuid>
//! currency_router [--env <env>] transfer <from-uuid> <to-uuid> <amount> [description]
//! ```
//!
//! Loads `config/<env>.yaml`, validates the ledger, registers the configured
//! regions and runs one operation.

use anyhow::{Context, Result, bail};

use currency_router::config::AppConfig;
use currency_router::logging::init_logging;
use currency_router::{AccountId, Amount, CurrencyService, TransactionKind, TransferContext, TransferRequest};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional arguments with `--env <value>` removed
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args.iter().skip(1) {
        if skip {
            skip = false;
            continue;
        }
        if arg == "--env" || arg == "-e" {
            skip = true;
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn parse_account(raw: &str) -> Result<AccountId> {
    raw.parse()
        .with_context(|| format!("invalid account id: {}", raw))
}

fn usage() -> &'static str {
    "usage: currency_router [--env <env>] balance <account> | transfer <from> <to> <amount> [description]"
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let config = AppConfig::load(&env).with_context(|| format!("loading config for {}", env))?;
    let _log_guard = init_logging(&config);

    tracing::info!(
        "Starting currency router {} in {} mode",
        env!("CARGO_PKG_VERSION"),
        env
    );

    let service = CurrencyService::from_config(&config)?;
    service.start().await;

    let positional = positional(&args);
    match positional.first().map(String::as_str) {
        Some("balance") => {
            let Some(raw) = positional.get(1) else {
                bail!(usage());
            };
            let account = parse_account(raw)?;
            let balance = service.router.query_balance(account).await;
            println!("{} {}", account, balance);
        }
        Some("transfer") => {
            if positional.len() < 4 {
                bail!(usage());
            }
            let from = parse_account(&positional[1])?;
            let to = parse_account(&positional[2])?;
            let amount: Amount = positional[3]
                .parse()
                .with_context(|| format!("invalid amount: {}", positional[3]))?;
            let description = positional
                .get(4)
                .cloned()
                .unwrap_or_else(|| "Command line transfer".to_string());

            let request = TransferRequest::new(
                from,
                to,
                amount,
                TransferContext::new(TransactionKind::Gift, description),
            );
            let result = service.router.transfer(&request).await;
            println!("{}", result);
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        _ => bail!(usage()),
    }

    Ok(())
}
