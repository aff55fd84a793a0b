//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open (and migrate) the configured store to verify `outline_core` wiring.
//! - Keep output deterministic for quick local sanity checks.

use log::info;
use outline_core::config::DEFAULT_CONFIG_FILE_NAME;
use outline_core::db::migrations::current_version;
use outline_core::{core_version, init_logging, open_db_with, OutlineConfig};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("outline: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.to_string());
    let config = OutlineConfig::load(&config_path)?.with_env_overrides()?;
    init_logging(&config.logging)?;

    let conn = open_db_with(&config.store.db_path, config.store.connection_options())?;
    let schema_version = current_version(&conn)?;
    info!(
        "event=cli_probe module=cli status=ok db_path={} schema_version={}",
        config.store.db_path.display(),
        schema_version
    );

    println!("outline_core version={}", core_version());
    println!("outline_core schema_version={schema_version}");
    Ok(())
}
