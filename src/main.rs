//! wallet_ledger - command line entry point
//!
//! Composition root: loads `config/{env}.yaml`, initializes logging, picks
//! the store (PostgreSQL when `postgres_url` is set, in-memory otherwise),
//! wires the services and runs one command. Results are printed as JSON on
//! stdout; logs go to the log file and stderr.
//!
//! ```text
//! wallet_ledger [--env dev] open <owner> [currency]
//! wallet_ledger [--env dev] deposit <number> <amount> [description]
//! wallet_ledger [--env dev] withdraw <number> <amount> [description]
//! wallet_ledger [--env dev] transfer <from> <to> <amount> [description]
//! wallet_ledger [--env dev] balance <number>
//! wallet_ledger [--env dev] history <number> [limit]
//! wallet_ledger [--env dev] accounts <owner>
//! wallet_ledger [--env dev] convert <amount> <from> <to>
//! wallet_ledger [--env dev] demo
//! ```
//!
//! Amounts are `"100.50"` (account currency) or `"100.50 USD"`.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;

use wallet_ledger::account::AccountService;
use wallet_ledger::config::AppConfig;
use wallet_ledger::db::Database;
use wallet_ledger::fx::{CurrencyConverter, CurrencyExchange, FixedRates, OpenErApiConverter};
use wallet_ledger::ledger::HistoryService;
use wallet_ledger::money::{Currency, Money};
use wallet_ledger::store::{LedgerStore, MemoryStore, PgStore};
use wallet_ledger::transfer::TransferOrchestrator;
use wallet_ledger::{WalletError, logging};

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

/// Everything after the program name that is not `--env <value>`.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--env" || arg == "-e" {
            iter.next();
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>", name))
}

/// `"100.50"` in the fallback currency, or `"100.50 USD"`.
fn parse_amount(raw: &str, fallback: Currency) -> Result<Money, WalletError> {
    let mut parts = raw.split_whitespace();
    let amount = parts.next().unwrap_or("");
    match parts.next() {
        Some(code) => Money::parse(amount, code),
        None => Money::parse(amount, fallback.as_str()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================
// WIRING
// ============================================================

struct App {
    accounts: AccountService,
    orchestrator: TransferOrchestrator,
    history: HistoryService,
    exchange: CurrencyExchange,
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect_with(url, &config.db)
                .await
                .context("failed to connect to PostgreSQL")?;
            db.ensure_schema().await.context("failed to create schema")?;
            Ok(Arc::new(PgStore::new(&db)))
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory store (nothing is persisted)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_converter(config: &AppConfig) -> anyhow::Result<Arc<dyn CurrencyConverter>> {
    if config.fx.enabled {
        let converter =
            OpenErApiConverter::new(&config.fx).context("failed to build HTTP client")?;
        return Ok(Arc::new(converter));
    }
    Ok(Arc::new(FixedRates::from_config(&config.fx.fixed_rates)?))
}

impl App {
    fn new(config: &AppConfig, store: Arc<dyn LedgerStore>) -> anyhow::Result<Self> {
        Ok(Self {
            accounts: AccountService::new(store.clone(), &config.ledger)?,
            orchestrator: TransferOrchestrator::new(store.clone()),
            history: HistoryService::new(store),
            exchange: CurrencyExchange::new(build_converter(config)?),
        })
    }

    async fn currency_of(&self, number: &str) -> Result<Currency, WalletError> {
        Ok(self.accounts.account_by_number(number).await?.currency())
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        let Some(command) = args.first() else {
            bail!("missing command (open, deposit, withdraw, transfer, balance, history, accounts, convert, demo)");
        };
        let description = |idx: usize| args.get(idx).cloned().unwrap_or_default();

        match command.as_str() {
            "open" => {
                let owner = arg(args, 1, "owner")?;
                let currency = args.get(2).map(|c| Currency::parse(c)).transpose()?;
                print_json(&self.accounts.open_account(owner, currency).await?)
            }
            "deposit" | "withdraw" => {
                let number = arg(args, 1, "number")?;
                let amount = parse_amount(arg(args, 2, "amount")?, self.currency_of(number).await?)?;
                let id = self.orchestrator.resolve(number).await?;
                let entry = if command == "deposit" {
                    self.orchestrator.deposit(id, amount, description(3)).await?
                } else {
                    self.orchestrator.withdraw(id, amount, description(3)).await?
                };
                print_json(&entry)
            }
            "transfer" => {
                let from = arg(args, 1, "from")?;
                let to = arg(args, 2, "to")?;
                let amount = parse_amount(arg(args, 3, "amount")?, self.currency_of(from).await?)?;
                let receipt = self
                    .orchestrator
                    .transfer_by_number(from, to, amount, description(4))
                    .await?;
                print_json(&receipt)
            }
            "balance" => {
                let account = self.accounts.account_by_number(arg(args, 1, "number")?).await?;
                print_json(&account)
            }
            "history" => {
                let number = arg(args, 1, "number")?;
                let entries = match args.get(2) {
                    Some(limit) => {
                        let limit: usize = limit.parse().context("limit must be a number")?;
                        let id = self.orchestrator.resolve(number).await?;
                        self.history.latest(id, limit).await?
                    }
                    None => self.history.history(number).await?,
                };
                print_json(&entries)
            }
            "accounts" => print_json(&self.accounts.accounts_of(arg(args, 1, "owner")?, false).await?),
            "convert" => {
                let from = Currency::parse(arg(args, 2, "from")?)?;
                let to = Currency::parse(arg(args, 3, "to")?)?;
                let amount = parse_amount(arg(args, 1, "amount")?, from)?;
                print_json(&self.exchange.convert(&amount, to).await?)
            }
            "demo" => self.demo().await,
            other => bail!("unknown command: {}", other),
        }
    }

    /// Scripted walk-through: open, fund, transfer, reject an overdraft.
    async fn demo(&self) -> anyhow::Result<()> {
        let currency = self.accounts.default_currency();
        let money = |raw: &str| Money::parse(raw, currency.as_str());

        let alice = self.accounts.open_account("demo-alice", None).await?;
        let bob = self.accounts.open_account("demo-bob", None).await?;
        self.orchestrator
            .deposit(alice.id(), money("1000.00")?, "opening deposit")
            .await?;
        let receipt = self
            .orchestrator
            .transfer(alice.id(), bob.id(), money("400.00")?, "demo transfer")
            .await?;
        print_json(&receipt)?;

        match self.orchestrator.withdraw(bob.id(), money("500.00")?, "").await {
            Err(err) => tracing::info!(code = err.code(), "Overdraft rejected as expected"),
            Ok(_) => bail!("overdraft was accepted"),
        }

        print_json(&self.accounts.all_accounts().await?)
    }
}

// ============================================================
// MAIN
// ============================================================

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    message: String,
}

/// JSON body for a failed command, when the failure is a wallet error.
fn wallet_error_json(err: &anyhow::Error) -> Option<String> {
    let wallet_err = err.downcast_ref::<WalletError>()?;
    let output = ErrorOutput {
        error: wallet_err.code(),
        message: wallet_err.to_string(),
    };
    serde_json::to_string_pretty(&output).ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let app_config = AppConfig::load(&env)?;
    // Dropped when main returns, flushing the file appender
    let _log_guard = logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting wallet_ledger in {} mode",
        env
    );

    let store = build_store(&app_config).await?;
    let app = App::new(&app_config, store)?;

    match app.run(&positional(&args)).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match wallet_error_json(&err) {
            Some(json) => {
                eprintln!("{}", json);
                Ok(ExitCode::FAILURE)
            }
            None => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_env_and_positional_split() {
        let raw = args(&["wallet_ledger", "--env", "prod", "balance", "1234567890"]);
        assert_eq!(get_env(&raw), "prod");
        assert_eq!(positional(&raw), args(&["balance", "1234567890"]));
        assert_eq!(get_env(&args(&["wallet_ledger"])), "dev");
    }

    #[test]
    fn test_wallet_error_rendered_as_json() {
        let err = anyhow::Error::new(WalletError::SameAccountTransfer("x".into()));
        let json = wallet_error_json(&err).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"], "SAME_ACCOUNT_TRANSFER");
        assert!(value["message"].as_str().unwrap().contains("same"));

        assert!(wallet_error_json(&anyhow::anyhow!("missing argument <owner>")).is_none());
    }

    #[test]
    fn test_parse_amount_with_and_without_currency() {
        let pen = Currency::parse("PEN").unwrap();
        assert_eq!(parse_amount("10.5", pen).unwrap().to_string(), "10.50 PEN");
        assert_eq!(parse_amount("10.5 usd", pen).unwrap().to_string(), "10.50 USD");
        assert!(parse_amount("ten", pen).is_err());
    }
}
