//! Round-trip commands: ping and arbitrary requests.

use anyhow::{Context, Result};
use serde_json::Value;

use super::http::{base_url, get_json_with_status, post_json_body};

pub async fn cmd_ping(port: u16) -> Result<()> {
    let started = std::time::Instant::now();
    let (status, body): (u16, Value) =
        get_json_with_status(&format!("{}/ping", base_url(port))).await?;
    print_outcome(status, &body, started.elapsed().as_millis());
    Ok(())
}

pub async fn cmd_request(port: u16, raw: &str) -> Result<()> {
    let request: Value = serde_json::from_str(raw).context("request must be valid JSON")?;
    let started = std::time::Instant::now();
    let (status, body): (u16, Value) =
        post_json_body(&format!("{}/request", base_url(port)), &request).await?;
    print_outcome(status, &body, started.elapsed().as_millis());
    Ok(())
}

fn print_outcome(status: u16, body: &Value, elapsed_ms: u128) {
    match (status, body.get("response"), body.get("error")) {
        (200, Some(response), _) => {
            println!("  ┌─ reply in {} ms", elapsed_ms);
            if let Some(message) = response.get("message") {
                println!("  │  message  : {}", message);
            }
            if let Some(received) = response.get("received") {
                println!("  │  received : {}", received);
            }
            println!("  └─ raw      : {}", response);
        }
        (_, _, Some(error)) => {
            println!("  ✗ {} after {} ms: {}", status, elapsed_ms, error);
        }
        _ => println!("  ? {} after {} ms: {}", status, elapsed_ms, body),
    }
}
