//! # nskv Demo
//!
//! Purpose: Show the client end to end: build a manager, write a key with a
//! TTL, read it back.
//!
//! Usage: `nskv-demo [options.json]`. `NSKV_ADDRESS`, `NSKV_PASSWORD`,
//! `NSKV_PREFIX` and `NSKV_DB` override values from the file.

use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{Context as _, Result};
use nskv_client::{Manager, Options, Ttl};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_KEY: &str = "demo:greeting";
const DEMO_TTL: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = load_options(env::args().nth(1))?;
    let manager = Manager::new(options).context("connecting to the store")?;

    manager
        .set_string(DEMO_KEY, "hello from nskv", Some(DEMO_TTL))
        .context("writing the demo key")?;
    let value = manager
        .get_string(DEMO_KEY)
        .context("reading the demo key")?;
    let ttl = manager.ttl(DEMO_KEY).context("reading the demo ttl")?;

    info!(key = %manager.prefix_key(DEMO_KEY), "round trip complete");
    match value {
        Some(value) => println!("{DEMO_KEY} = {value}"),
        None => println!("{DEMO_KEY} is missing"),
    }
    if let Ttl::ExpiresIn(left) = ttl {
        println!("expires in {}s", left.as_secs());
    }
    Ok(())
}

fn load_options(path: Option<String>) -> Result<Options> {
    let mut options = match path {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => Options::default(),
    };

    if let Ok(address) = env::var("NSKV_ADDRESS") {
        options = options.with_address(address);
    }
    if let Ok(password) = env::var("NSKV_PASSWORD") {
        options = options.with_password(password);
    }
    if let Ok(prefix) = env::var("NSKV_PREFIX") {
        options = options.with_prefix(prefix);
    }
    if let Ok(db) = env::var("NSKV_DB") {
        let db = db
            .parse()
            .with_context(|| format!("NSKV_DB must be an integer, got {db:?}"))?;
        options = options.with_db(db);
    }
    Ok(options)
}
