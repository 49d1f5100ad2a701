//! ipwho - IP OSINT Lookup CLI
//!
//! A command-line interface for the ipwho lookup library.
//! Queries WHOIS, GeoIP, Shodan, AbuseIPDB and a local Nmap scan for one IP
//! address and prints a combined report.

use ipwho_core::{
    args::{IpwhoArgs, USAGE},
    config::Config,
    orchestrator::Orchestrator,
    report::{banner, render},
    sink::{Sink, SinkReport},
    target::address_scope,
};
use std::env;
use std::process;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
const LOG_ENV_VAR: &str = "IPWHO_LOG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let args = match IpwhoArgs::from_iter_safe(env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try 'ipwho -h' for more information.");
            process::exit(1);
        }
    };

    if args.help {
        print!("{}", USAGE);
        return Ok(());
    }

    if args.version {
        println!("ipwho {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    args.validate()?;
    init_logging(args.verbose);

    let config = args.apply_to(Config::from_env());
    debug!(?config, "configuration loaded");

    let request = args.lookup_request()?;
    if let Some(scope) = address_scope(&request.ip()) {
        warn!(
            ip = %request.ip(),
            "target is a {} address; public sources will have little or no data",
            scope
        );
    }

    let orchestrator = Orchestrator::new(&config)?;
    let report = orchestrator.run(&request).await;

    let text = format!("{}{}", banner(env!("CARGO_PKG_VERSION")), render(&report));
    let sink = Sink::new(&config.output_dir, args.output.as_deref());
    if let SinkReport::Saved(path) = sink.emit(&text)? {
        println!("\n[INFO] Results saved to {}", path.display());
    }

    Ok(())
}

/// Installs the stderr log subscriber
///
/// `IPWHO_LOG` takes precedence; otherwise `-v` enables debug output for
/// this crate and the library.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,ipwho=debug,ipwho_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
