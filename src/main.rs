//! Trynex cart command line

use std::{io, process::ExitCode};

use tracing::{debug, error};
use trynex_cart::prelude::{CartStore, FileStorage};

use crate::config::CliConfig;

mod commands;
mod config;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from .env and CLI arguments
    let config = match CliConfig::load() {
        Ok(config) => config,
        Err(parse_error) => {
            // Prints help and version requests as well as genuine errors.
            _ = parse_error.print();

            return if parse_error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(init_error) = logging::init_subscriber(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialize, must use eprintln"
        )]
        {
            eprintln!("Logging error: {init_error}");
        }

        return ExitCode::FAILURE;
    }

    let storage = match FileStorage::open(&config.storage_dir) {
        Ok(storage) => storage,
        Err(storage_error) => {
            error!(%storage_error, dir = %config.storage_dir.display(), "failed to open storage");

            return ExitCode::FAILURE;
        }
    };

    let store = CartStore::open_with_key(storage, config.cart_key);

    debug!(?store, "cart ready");

    let policy = config.delivery.policy();

    match commands::run(&store, config.command, &policy, &mut io::stdout().lock()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(command_error) => {
            error!(%command_error, "command failed");

            #[expect(clippy::print_stderr, reason = "errors are reported to the shopper")]
            {
                eprintln!("Error: {command_error}");
            }

            ExitCode::FAILURE
        }
    }
}
