//! blockvm CLI
//!
//! Runs block-script projects from JSON fixtures and inspects configuration.

use blockvm_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
