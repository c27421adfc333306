//! crestcheck - Validate EVE Online ids against CREST
//!
//! Looks up each id at the given endpoint, serving fresh results from the
//! local cache, and prints one JSON line per id found.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crestcheck::cli::{Cli, LookupOutput, RunConfig};
use crestcheck::Validator;

/// Sets up logging to stderr so stdout only carries results
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crestcheck=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let run = match RunConfig::from_cli(&cli) {
        Ok(run) => run,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(ExitCode::from(2));
        }
    };

    let validator = match Validator::new(&run.settings) {
        Ok(validator) => validator,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(ExitCode::from(2));
        }
    };

    // Ids are independent lookups, so run them together
    let lookups = run
        .ids
        .iter()
        .map(|id| validator.validate(&run.endpoint, id.clone(), run.cache_bypass));
    let results = futures::future::join_all(lookups).await;

    let mut failed = false;
    for (id, result) in run.ids.iter().zip(results) {
        match result {
            Ok(payload) => {
                let line = serde_json::to_string(&LookupOutput {
                    endpoint: &run.endpoint,
                    id,
                    payload: &payload,
                })?;
                println!("{}", line);
            }
            Err(err) => {
                eprintln!("error: {}: {}", err, err.cause);
                failed = true;
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
