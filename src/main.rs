mod args;
mod config;
mod coordinator;
mod entry;
mod error;
mod logger;
mod report;
mod shutdown;
mod shutdown_handlers;
mod target;
mod worker;

use error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
