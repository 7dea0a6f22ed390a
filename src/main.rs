// Thin shell around the import pipeline.
//
// Usage:
//   bankline import <data-dir> <account-id> <statement.csv>
//   bankline balance <data-dir> <account-id>
//
// The statement file is a six-column CSV extract:
// description,amount,start_balance,end_balance,value_date,currency

use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use bankline::{
    format_eur, LedgerSet, Pipeline, Registries, StatementRow, TerminalDecisions,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("import") if args.len() == 5 => run_import(&args[2], &args[3], &args[4]),
        Some("balance") if args.len() == 4 => run_balance(&args[2], &args[3]),
        _ => {
            eprintln!("usage: bankline import <data-dir> <account-id> <statement.csv>");
            eprintln!("       bankline balance <data-dir> <account-id>");
            bail!("invalid arguments");
        }
    }
}

fn run_import(data_dir: &str, account: &str, statement: &str) -> Result<()> {
    let base = Path::new(data_dir);
    let mut registries = Registries::load(base)?;
    let mut ledgers = LedgerSet::open_all(base, &registries.accounts)?;
    let rows = read_statement(statement)?;
    tracing::info!(rows = rows.len(), account, "statement loaded");

    let mut decisions = TerminalDecisions;
    let summary = Pipeline::new(&mut registries, &mut decisions)
        .import(account, &rows, &mut ledgers)
        .with_context(|| format!("import into account {account} failed, nothing persisted"))?;

    // atomic per batch: only a fully imported statement reaches the store
    registries.flush(base)?;
    ledgers.save_all(base)?;

    let balance = ledgers
        .get(account)
        .map(|ledger| ledger.balance())
        .unwrap_or(0);
    println!(
        "imported {} rows into {account}, balance {}",
        summary.appended,
        format_eur(balance)
    );
    Ok(())
}

fn run_balance(data_dir: &str, account: &str) -> Result<()> {
    let base = Path::new(data_dir);
    let registries = Registries::load(base)?;
    let ledgers = LedgerSet::open_all(base, &registries.accounts)?;
    let ledger = ledgers
        .get(account)
        .with_context(|| format!("unknown account {account}"))?;
    println!("{}: {}", ledger.meta.name, format_eur(ledger.balance()));
    Ok(())
}

fn read_statement(path: &str) -> Result<Vec<StatementRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open statement file {path}"))?;

    let mut rows = Vec::new();
    for (line, result) in reader.deserialize().enumerate() {
        let row: StatementRow =
            result.with_context(|| format!("failed to parse statement line {}", line + 2))?;
        rows.push(row);
    }
    Ok(rows)
}
