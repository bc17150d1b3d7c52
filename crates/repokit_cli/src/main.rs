//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a database file through the repository façade and print the row
//!   count of one table.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `repokit <database-path> <table>`. Remaining settings come from
//! `REPOKIT_*` environment variables; `REPOKIT_LOG_DIR` enables file logging.

use log::{error, info};
use repokit_core::{default_log_level, init_logging, DbRepository, RepositoryConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(database_path), Some(table)) = (args.next(), args.next()) else {
        eprintln!("usage: repokit <database-path> <table>");
        return ExitCode::from(2);
    };

    if let Ok(log_dir) = std::env::var("REPOKIT_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let config = RepositoryConfig {
        database_path: database_path.into(),
        ..RepositoryConfig::from_env()
    };
    let repository = DbRepository::from_config(&config);

    match repository.count_all(&table, None, None) {
        Ok(rows) => {
            info!("event=cli_count module=cli status=ok table={table} rows={rows}");
            println!("table={table} rows={rows}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_count module=cli status=error table={table} error={err}");
            eprintln!("repokit: {err}");
            ExitCode::FAILURE
        }
    }
}
