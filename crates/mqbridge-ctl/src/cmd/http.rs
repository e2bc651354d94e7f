//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Status code plus decoded body. Non-2xx answers still carry JSON.
pub async fn get_json_with_status<T: for<'de> Deserialize<'de>>(url: &str) -> Result<(u16, T)> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to gateway at {} — is it running?", url))?;
    let status = response.status().as_u16();
    let body = response
        .json::<T>()
        .await
        .context("failed to parse response")?;
    Ok((status, body))
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    Ok(get_json_with_status(url).await?.1)
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<(u16, R)>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let response = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to gateway at {} — is it running?", url))?;
    let status = response.status().as_u16();
    let body = response
        .json::<R>()
        .await
        .context("failed to parse response")?;
    Ok((status, body))
}
