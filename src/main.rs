//! Command-line front end for the land-acquisition ledger.
//!
//! # Usage
//! ```text
//! land-ledger [OPTIONS] <COMMAND>
//! ```
//!
//! # Options
//! - `--data-dir <path>`: RocksDB directory (default `./land_ledger_db`)
//! - `--difficulty <n>`: mining difficulty, 0 to 6 (default 2)
//! - `--verify-on-load`: validate every stored block when opening
//!
//! # Commands
//! - `stats`: print ledger statistics
//! - `validate`: validate the chain, exit 1 when it is invalid
//! - `lookup <survey|village|tehsil> <value>`: list matching transactions
//! - `tx <transaction_id>`: print one transaction and its block
//! - `record <kind> key=value...`: submit a record and seal it
//!
//! Options can also be set through `LEDGER_DATA_DIR`, `LEDGER_DIFFICULTY`,
//! `LEDGER_POOL_CAPACITY` and `LEDGER_VERIFY_ON_LOAD`; `LEDGER_LOG` sets the
//! log level.

use land_ledger::config::LedgerConfig;
use land_ledger::core::ledger::{Ledger, SealOutcome};
use land_ledger::core::transaction::TransactionKind;
use land_ledger::storage::index::IndexKey;
use land_ledger::types::hash::Hash;
use land_ledger::utils::log;
use land_ledger::{error, warn};
use std::collections::BTreeMap;
use std::env;
use std::process;
use std::sync::Arc;

enum Command {
    Stats,
    Validate,
    Lookup(IndexKey, String),
    Tx(Hash),
    Record(TransactionKind, BTreeMap<String, String>),
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {program} [--data-dir <path>] [--difficulty <n>] [--verify-on-load] <command>\n\
         \n\
         Commands:\n  \
           stats\n  \
           validate\n  \
           lookup <survey|village|tehsil> <value>\n  \
           tx <transaction_id>\n  \
           record <kind> key=value...\n\
         \n\
         Kinds: AWARD_DECLARATION, COMPENSATION_PAYMENT, CITIZEN_QUERY, LITIGATION"
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let (name, rest) = args.split_first().ok_or("missing command")?;
    match (name.as_str(), rest) {
        ("stats", []) => Ok(Command::Stats),
        ("validate", []) => Ok(Command::Validate),
        ("lookup", [key, value]) => {
            let key = key.parse::<IndexKey>().map_err(|e| e.to_string())?;
            Ok(Command::Lookup(key, value.clone()))
        }
        ("tx", [id]) => {
            let id = id
                .parse::<Hash>()
                .map_err(|e| format!("invalid transaction id: {e}"))?;
            Ok(Command::Tx(id))
        }
        ("record", [kind, pairs @ ..]) => {
            let kind = kind.parse::<TransactionKind>().map_err(|e| e.to_string())?;
            let mut fields = BTreeMap::new();
            for pair in pairs {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected key=value, got {pair:?}"))?;
                fields.insert(key.trim().to_string(), value.to_string());
            }
            Ok(Command::Record(kind, fields))
        }
        (other, _) => Err(format!("unknown command or wrong arguments: {other}")),
    }
}

#[tokio::main]
async fn main() {
    log::init_from_env();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("land-ledger");

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(program);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let mut config = LedgerConfig::from_env().unwrap_or_else(|e| fail(e));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    fail("--data-dir requires an argument");
                }
                config = config.with_data_dir(&args[i]);
                i += 1;
            }
            "--difficulty" => {
                i += 1;
                if i >= args.len() {
                    fail("--difficulty requires an argument");
                }
                let difficulty = args[i]
                    .parse()
                    .unwrap_or_else(|_| fail(format!("Invalid difficulty: {}", args[i])));
                config = config.with_difficulty(difficulty);
                i += 1;
            }
            "--verify-on-load" => {
                config = config.with_verify_on_load(true);
                i += 1;
            }
            _ => break,
        }
    }

    let command = match parse_command(&args[i..]) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n");
            print_usage(program);
            process::exit(1);
        }
    };

    let ledger = Arc::new(Ledger::open(&config).unwrap_or_else(|e| fail(e)));
    let mut exit_code = 0;

    match command {
        Command::Stats => {
            let stats = ledger.stats().unwrap_or_else(|e| fail(e));
            println!("{stats}");
        }
        Command::Validate => match ledger.validation_report() {
            Ok(()) => println!("chain is valid ({} blocks)", ledger.len()),
            Err(failure) => {
                println!("chain is INVALID: {failure}");
                exit_code = 1;
            }
        },
        Command::Lookup(key, value) => {
            let found = ledger.lookup(key, &value).unwrap_or_else(|e| fail(e));
            if found.is_empty() {
                println!("no transactions for {key} {value:?}");
            }
            for tx in found {
                println!("{tx}");
            }
        }
        Command::Tx(id) => match ledger.transaction(&id).unwrap_or_else(|e| fail(e)) {
            Some((block_index, tx)) => println!("block {block_index}: {tx}"),
            None => {
                println!("transaction {id} not found");
                exit_code = 1;
            }
        },
        Command::Record(kind, fields) => {
            let id = ledger
                .submit_fields(kind, &fields)
                .unwrap_or_else(|e| fail(e));
            println!("transaction {id}");
            match ledger.clone().seal_pending_async().await {
                Ok(SealOutcome::Sealed(block)) => println!(
                    "sealed block {} hash={} nonce={}",
                    block.index(),
                    block.hash,
                    block.header.nonce
                ),
                Ok(SealOutcome::NoPending) => println!("nothing to seal"),
                Err(e) => fail(e),
            }
        }
    }

    match Arc::try_unwrap(ledger) {
        Ok(ledger) => {
            if let Err(e) = ledger.shutdown() {
                error!("Shutdown failed: {e}");
                exit_code = 1;
            }
        }
        Err(_) => warn!("Ledger still shared at exit; skipping flush"),
    }
    process::exit(exit_code);
}
