mod args;
mod client;
mod config;
mod domain;
mod entry;
mod error;
mod logger;
mod metrics;
mod scenarios;
mod shutdown;
mod shutdown_handlers;
mod sinks;

use error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
