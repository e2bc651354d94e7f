//! Gateway status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    correlation: String,
    timeout_ms: u64,
    in_flight: usize,
    calls: u64,
    replies: u64,
    timeouts: u64,
    dropped_replies: u64,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Gateway Status");
    println!("═══════════════════════════════════════");
    println!("  Correlation     : {}", resp.correlation);
    println!("  Timeout         : {} ms", resp.timeout_ms);
    println!("  In flight       : {}", resp.in_flight);
    println!("  Calls           : {}", resp.calls);
    println!("  Replies         : {}", resp.replies);
    println!("  Timeouts        : {}", resp.timeouts);
    println!("  Dropped replies : {}", resp.dropped_replies);

    Ok(())
}
