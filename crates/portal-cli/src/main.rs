//! Intranet portal shell - drive the session core from a terminal.
//!
//! Stands in for the web view layer: every action goes through the
//! `SessionContext`, exactly as the portal's components do.

mod shell;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portal_core::{
    Config, CredentialStore, FileStorage, KeyValueStore, MemoryStorage, SessionContext,
    SessionManager,
};

use shell::Shell;

// ============================================================================
// Constants
// ============================================================================

/// Directory for log files; logs go to stderr when unset
const LOG_DIR_ENV: &str = "PORTAL_LOG_DIR";

/// Log file name inside `PORTAL_LOG_DIR`
const LOG_FILE: &str = "portal.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer on drop and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(PathBuf::from(dir), LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

fn open_storage(config: &Config, in_memory: bool) -> Result<Arc<dyn KeyValueStore>> {
    if in_memory {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    let dir = config.data_dir()?;
    info!(dir = %dir.display(), "Using file storage");
    Ok(Arc::new(FileStorage::new(dir)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let has_flag = |flag: &str| args.iter().any(|a| a == flag);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };

    let storage = open_storage(&config, has_flag("--memory"))?;
    let manager = Arc::new(SessionManager::new(
        CredentialStore::seeded(),
        storage,
        config.session_settings(),
    ));

    if has_flag("--list-users") {
        for identity in manager.credentials().list_all() {
            println!("{}", shell::format_identity(&identity));
        }
        return Ok(());
    }
    if has_flag("--logout") {
        manager.try_logout()?;
        println!("Session cleared.");
        return Ok(());
    }

    info!("Portal shell starting");

    let context = SessionContext::with_check_interval(manager, config.expiry_check_interval());
    context.hydrate();

    let mut shell = Shell::new(context, config);
    let result = shell.run().await;

    info!("Portal shell shutting down");
    result
}
