//! MaungDB - CLI Client
//!
//! An interactive MaungQL shell, or a one-shot runner when a statement is
//! passed as arguments (`maung "TINGALI pegawai"`).

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::error;
use tracing_subscriber::EnvFilter;

use maungdb::auth::{Identity, Role, SessionProvider, StaticSession};
use maungdb::config::EngineConfig;
use maungdb::executor::{ExecutionResult, Executor};

const PROMPT: &str = "maung> ";

/// Print welcome banner
fn print_banner() {
    println!(
        r#"
 __  __                         ____  ____
|  \/  | __ _ _   _ _ __   __ _|  _ \| __ )
| |\/| |/ _` | | | | '_ \ / _` | | | |  _ \
| |  | | (_| | |_| | | | | (_| | |_| | |_) |
|_|  |_|\__,_|\__,_|_| |_|\__, |____/|____/
                          |___/
 A flat-file database speaking MaungQL
 Type '.help' for help, '.quit' to exit
"#
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .quit              Exit MaungDB
  .createdb <name>   Create a database
  .use <name>        Select a database
  .whoami            Show the current identity

MaungQL (Sundanese or English keywords):
  DAMEL t id:INT:PK, nama:STRING        CREATE TABLE
  SIMPEN t 1|Asep                        INSERT
  TINGALI t DIMANA id = 1                SELECT
  OMEAN t JADI nama=Euis DIMANA id = 1   UPDATE
  MICEUN TI t DIMANA id = 1              DELETE
  TANDAIN t DINA nama                    CREATE INDEX
  MIMITIAN / JADIKEUN / BATALKEUN        BEGIN / COMMIT / ROLLBACK
  TINGALI PANGKAL                        SHOW DATABASES
"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.chars().count());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in rows {
        let line: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:<width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", line));
    }
    if !rows.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", rows.len()));
    output
}

fn print_result(result: &ExecutionResult) {
    if !result.columns.is_empty() {
        print!("{}", format_results(&result.columns, &result.rows));
    }
    if let Some(message) = &result.message {
        println!("{}", message);
    }
}

/// Handle dot commands. Returns `false` when the shell should exit.
fn handle_special_command(cmd: &str, executor: &Executor, session: &StaticSession) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return false,
        Some(".createdb") => match parts.get(1) {
            Some(name) => match executor.create_database(name) {
                Ok(()) => println!("Database '{}' created", name),
                Err(e) => eprintln!("{}", e),
            },
            None => eprintln!("Usage: .createdb <name>"),
        },
        Some(".use") => match parts.get(1) {
            Some(name) if executor.storage().database_exists(name) => {
                match session.use_database(*name) {
                    Ok(()) => println!("Using database '{}'", name),
                    Err(e) => eprintln!("{}", e),
                }
            }
            Some(name) => eprintln!("Database '{}' not found", name),
            None => eprintln!("Usage: .use <name>"),
        },
        Some(".whoami") => match session.current_identity() {
            Ok(identity) => println!(
                "{} ({}) on {}",
                identity.username,
                identity.role,
                identity.database.as_deref().unwrap_or("<no database>")
            ),
            Err(e) => eprintln!("{}", e),
        },
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    true
}

/// Main REPL loop
fn run_repl(executor: &Executor, session: &StaticSession) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    print_banner();

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                if line.starts_with('.') {
                    if !handle_special_command(line, executor, session) {
                        break;
                    }
                    continue;
                }

                match executor.run(line) {
                    Ok(result) => print_result(&result),
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!("Readline error: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Identity from `MAUNG_USER`, `MAUNG_ROLE` and `MAUNG_DB`
fn identity_from_env() -> Result<Identity> {
    let username = env::var("MAUNG_USER").unwrap_or_else(|_| "maung".to_string());
    let role: Role = env::var("MAUNG_ROLE")
        .unwrap_or_else(|_| "supermaung".to_string())
        .parse()
        .context("invalid MAUNG_ROLE")?;

    let identity = Identity::new(username, role);
    Ok(match env::var("MAUNG_DB") {
        Ok(db) if !db.is_empty() => identity.with_database(db),
        _ => identity,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maungdb=info")),
        )
        .with_target(false)
        .init();

    let mut config = EngineConfig::new();
    if let Ok(dir) = env::var("MAUNG_DATA_DIR") {
        config = config.data_dir(dir);
    }

    let session = Arc::new(StaticSession::logged_in(identity_from_env()?));
    let executor = Executor::open(config, session.clone()).context("failed to open data directory")?;

    let args: Vec<String> = env::args().skip(1).collect();
    if !args.is_empty() {
        let result = executor
            .run(&args.join(" "))
            .context("statement failed")?;
        print_result(&result);
        return Ok(());
    }

    run_repl(&executor, &session)
}
