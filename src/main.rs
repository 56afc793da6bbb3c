//! brewhausd — the controller daemon.
//!
//! Usage: `brewhausd [config.json] [state.json]`
//!
//! Loads configuration and the storage state file, brings up the
//! hardware bus, resolves every active session, and runs until killed.

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use brewhaus::bus::BusContext;
use brewhaus::config::Config;
use brewhaus::error::Error;
use brewhaus::manager::SessionManager;
use brewhaus::store::{MemoryStore, Store};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("brewhausd {} starting", env!("CARGO_PKG_VERSION"));

    let mut args = env::args().skip(1);
    let config_path = args.next();
    let state_path = args.next();

    let config = match &config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            serde_json::from_str::<Config>(&raw)
                .with_context(|| format!("parsing config file {path}"))?
        }
        None => Config::default(),
    };
    config.validate()?;

    let store: Arc<dyn Store> = match &state_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading state file {path}"))?;
            Arc::new(MemoryStore::from_json(&raw).map_err(Error::from)?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let ctx = BusContext::new(&config)?;
    let manager = SessionManager::init(store, ctx, &config)?;
    info!("{} session(s) under control", manager.session_count());

    // Runs until the process is killed; the kernel drops the latch
    // outputs with the SPI device.
    manager.run();
    Ok(())
}
