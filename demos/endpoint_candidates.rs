//! Print the candidate endpoints the current configuration produces.
//!
//! Run with: cargo run --example endpoint_candidates

use dashboard_client::client::candidates;
use dashboard_client::ClientConfig;

fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env()?;

    println!("Endpoint candidates");
    println!("===================\n");
    println!("  primary relative: {}", config.primary_is_relative());
    println!("  dev fallback:     {}\n", config.dev_fallback);

    for (index, base) in candidates(&config).iter().enumerate() {
        println!("  {}. {}", index + 1, base);
    }
    Ok(())
}
