use crate::*;

use mqbridge_core::config::CorrelationMode;
use serde_json::json;

// ══════════════════════════════════════════════════════════════════════════════
//  Concurrent Callers
// ══════════════════════════════════════════════════════════════════════════════

async fn fire(url: String, count: u64) -> Result<Vec<(u16, Value)>> {
    let mut calls = tokio::task::JoinSet::new();
    for n in 0..count {
        let url = url.clone();
        calls.spawn(async move {
            let request = json!({ "ask": "ping", "n": n });
            post_json(&url, &request).await.map(|reply| (n, reply))
        });
    }

    let mut results = vec![(0, Value::Null); count as usize];
    while let Some(joined) = calls.join_next().await {
        let (n, reply) = joined??;
        results[n as usize] = reply;
    }
    Ok(results)
}

/// Keyed calls in flight together each get their own reply.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_keyed_calls_get_their_own_replies() -> Result<()> {
    let echo = spawn_echo().await?;
    let bridge = start_bridge(Some(&echo), 5_000, CorrelationMode::Keyed).await?;

    let results = fire(bridge.endpoint("/request"), 20).await?;

    for (n, (status, body)) in results.iter().enumerate() {
        assert_eq!(*status, 200, "call {n} failed: {body}");
        assert_eq!(body["response"]["message"], "pong");
        assert_eq!(body["response"]["received"]["n"], n as u64, "call {n} got another reply");
    }

    let status = bridge.gateway.status();
    assert_eq!(status.replies, 20);
    assert_eq!(status.dropped_replies, 0);
    assert_eq!(status.in_flight, 0);
    Ok(())
}

/// Single-slot calls take turns and still pair up correctly.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_slot_calls_take_turns() -> Result<()> {
    let echo = spawn_echo().await?;
    let bridge = start_bridge(Some(&echo), 10_000, CorrelationMode::SingleSlot).await?;

    let results = fire(bridge.endpoint("/request"), 5).await?;

    for (n, (status, body)) in results.iter().enumerate() {
        assert_eq!(*status, 200, "call {n} failed: {body}");
        assert_eq!(body["response"]["received"]["n"], n as u64, "call {n} got another reply");
    }
    assert_eq!(bridge.gateway.status().timeouts, 0);
    Ok(())
}
