//! ledger-runner: headless front end for a clientbook database.
//!
//! Usage:
//!   ledger-runner --db book.db --client 3
//!   ledger-runner --db book.db --client 3 --export-csv ledger.csv
//!   ledger-runner --db book.db --refresh-all
//!   ledger-runner --db book.db --treasury
//!   ledger-runner --db book.db --backfill
//!   ledger-runner --db book.db --issue-token --client 3
//!   ledger-runner --db book.db --public <token>
//!   ledger-runner --db book.db --ipc-mode

use anyhow::Result;
use clientbook_core::{
    book::ClientBook,
    client::{ClientSort, NewClient},
    config::LedgerConfig,
    error::LedgerError,
    ledger::Ledger,
    operation::{Operation, OperationEdit},
    retry::CancellationToken,
    statistics::{Period, TreasuryReport},
    types::ClientId,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    SearchClients {
        #[serde(default)]
        query: String,
        #[serde(default)]
        sort: ClientSort,
    },
    CreateClient {
        client: NewClient,
    },
    GetLedger {
        client_id: ClientId,
    },
    RecordOperation {
        operation: Operation,
    },
    EditOperation {
        id: String,
        edit: OperationEdit,
    },
    DeleteOperation {
        id: String,
        reason: Option<String>,
    },
    RefreshBalance {
        client_id: ClientId,
    },
    RefreshAll,
    Treasury {
        #[serde(default)]
        period: Period,
    },
    IssueToken {
        client_id: ClientId,
    },
    PublicView {
        token: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or("clientbook.db");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let client: Option<ClientId> = parse_arg(&args, "--client");

    let config = LedgerConfig::load(data_dir)?;
    let mut book = ClientBook::open(db, config)?;

    if ipc_mode {
        return run_ipc_loop(&mut book);
    }

    println!("clientbook — ledger-runner");
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    if args.iter().any(|a| a == "--backfill") {
        let report = book.normalize_references()?;
        println!(
            "Backfilled {} references ({} ambiguous, {} unknown)",
            report.backfilled, report.ambiguous, report.unknown
        );
    }

    if args.iter().any(|a| a == "--refresh-all") {
        let outcomes = book.refresh_all(&CancellationToken::new())?;
        let corrected = outcomes.iter().filter(|o| o.changed()).count();
        println!("Refreshed {} clients, {corrected} corrected", outcomes.len());
    }

    if args.iter().any(|a| a == "--treasury") {
        print_treasury(&book.treasury(Period::all_time())?);
    }

    if let Some(token) = flag_value(&args, "--public") {
        let view = book.public_view(token)?;
        println!(
            "Public view: {} {}",
            view.profile.first_name, view.profile.last_name
        );
        print_ledger(&view.ledger);
    }

    if let Some(client_id) = client {
        if args.iter().any(|a| a == "--issue-token") {
            let token = book.issue_token(client_id)?;
            println!("Token: {}", token.token);
            if let Some(at) = token.expires_at {
                println!("  expires: {}", at.to_rfc3339());
            }
        }

        if let Some(path) = flag_value(&args, "--export-csv") {
            let file = std::fs::File::create(path)?;
            book.export_ledger_csv(client_id, io::BufWriter::new(file))?;
            println!("Ledger for client {client_id} written to {path}");
        } else {
            print_ledger(&book.ledger(client_id)?);
        }
    }

    Ok(())
}

fn run_ipc_loop(book: &mut ClientBook) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(book, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("IPC command failed: {e}");
                serde_json::json!({ "error": e.user_message() })
            }
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(book: &mut ClientBook, cmd: IpcCommand) -> Result<serde_json::Value, LedgerError> {
    let token = CancellationToken::new();
    let value = match cmd {
        IpcCommand::SearchClients { query, sort } => {
            serde_json::to_value(book.search_clients(&query, sort)?)?
        }
        IpcCommand::CreateClient { client } => serde_json::to_value(book.create_client(&client)?)?,
        IpcCommand::GetLedger { client_id } => serde_json::to_value(book.ledger(client_id)?)?,
        IpcCommand::RecordOperation { operation } => {
            serde_json::to_value(book.record_operation(operation)?)?
        }
        IpcCommand::EditOperation { id, edit } => {
            serde_json::to_value(book.edit_operation(&id, &edit)?)?
        }
        IpcCommand::DeleteOperation { id, reason } => {
            serde_json::to_value(book.delete_operation(&id, reason.as_deref())?)?
        }
        IpcCommand::RefreshBalance { client_id } => {
            serde_json::to_value(book.refresh_balance(client_id, &token)?)?
        }
        IpcCommand::RefreshAll => serde_json::to_value(book.refresh_all(&token)?)?,
        IpcCommand::Treasury { period } => serde_json::to_value(book.treasury(period)?)?,
        IpcCommand::IssueToken { client_id } => serde_json::to_value(book.issue_token(client_id)?)?,
        IpcCommand::PublicView { token } => serde_json::to_value(book.public_view(&token)?)?,
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_ledger(ledger: &Ledger) {
    let Some(client_id) = ledger.client_id else {
        println!("  (no such client)");
        return;
    };
    println!("=== LEDGER: client {client_id} ===");
    if ledger.is_empty() {
        println!("  (no operations)");
    }
    for e in &ledger.entries {
        let date = e
            .operation
            .effective_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!(
            "  {date} | {:<18} | {:>10.2} | {:>10.2} -> {:>10.2}",
            e.operation.id, e.impact, e.balance_before, e.balance_after
        );
    }
    println!("  final balance:  {:.2}", ledger.final_balance);
    if let Some(d) = &ledger.drift {
        println!(
            "  DRIFT: stored {:.2}, reconstructed {:.2} (difference {:.2})",
            d.stored, d.reconstructed, d.difference
        );
    }
    if !ledger.unattributed.is_empty() {
        println!("  unattributed:   {}", ledger.unattributed.join(", "));
    }
}

fn print_treasury(report: &TreasuryReport) {
    println!("=== TREASURY ===");
    println!("  clients:          {} ({} active)", report.client_count, report.active_clients);
    println!("  operations:       {}", report.operation_count());
    println!("  deposits:         {:.2}", report.totals.deposits);
    println!("  withdrawals:      {:.2}", report.totals.withdrawals);
    println!("  transfers:        {:.2}", report.totals.transfers);
    println!("  direct transfers: {:.2}", report.totals.direct_transfers);
    println!("  net flow:         {:.2}", report.net_flow);
    println!("  treasury:         {:.2}", report.treasury);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    flag_value(args, flag).and_then(|v| v.parse().ok())
}
