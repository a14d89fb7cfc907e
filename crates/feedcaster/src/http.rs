//! Blocking HTTP helpers shared by the collaborators.

use crate::config::HttpConfig;
use anyhow::Result;
use feedcaster_core::CollaboratorError;
use reqwest::blocking::{Client, Response};
use std::io::Read;
use std::time::Duration;

pub fn client(config: &HttpConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Map a transport error onto the collaborator error shape.
pub fn transport_error(operation: &str, err: reqwest::Error) -> CollaboratorError {
    let code = err
        .status()
        .map(|s| s.as_u16().to_string())
        .unwrap_or_else(|| if err.is_timeout() { "timeout" } else { "transport" }.to_string());
    CollaboratorError::new(operation, code, err.to_string())
}

/// Fail on non-success statuses, keeping the response body as the message.
pub fn check_status(operation: &str, resp: Response) -> Result<Response, CollaboratorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(CollaboratorError::new(operation, status.as_u16().to_string(), message))
}

pub fn get_json(client: &Client, operation: &str, url: &str) -> Result<serde_json::Value, CollaboratorError> {
    let resp = client
        .get(url)
        .send()
        .map_err(|e| transport_error(operation, e))?;
    check_status(operation, resp)?
        .json()
        .map_err(|e| transport_error(operation, e))
}

pub fn get_text(client: &Client, operation: &str, url: &str) -> Result<String, CollaboratorError> {
    let resp = client
        .get(url)
        .send()
        .map_err(|e| transport_error(operation, e))?;
    check_status(operation, resp)?
        .text()
        .map_err(|e| transport_error(operation, e))
}

/// Download at most `limit` bytes. Larger bodies are refused without being
/// read in full, announced length or not.
pub fn get_bytes(client: &Client, operation: &str, url: &str, limit: u64) -> Result<Vec<u8>, CollaboratorError> {
    let resp = client
        .get(url)
        .send()
        .map_err(|e| transport_error(operation, e))?;
    let resp = check_status(operation, resp)?;
    if let Some(len) = resp.content_length() {
        if len > limit {
            return Err(CollaboratorError::new(
                operation,
                "too_large",
                format!("{} is {} bytes (max {})", url, len, limit),
            ));
        }
    }
    read_capped(resp, limit).map_err(|e| match e {
        CapError::TooLarge => CollaboratorError::new(
            operation,
            "too_large",
            format!("{} is over {} bytes", url, limit),
        ),
        CapError::Io(e) => CollaboratorError::new(operation, "transport", e.to_string()),
    })
}

enum CapError {
    TooLarge,
    Io(std::io::Error),
}

/// Read at most `limit` bytes, stopping one byte past it.
fn read_capped(reader: impl Read, limit: u64) -> Result<Vec<u8>, CapError> {
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(CapError::Io)?;
    if body.len() as u64 > limit {
        return Err(CapError::TooLarge);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_read_refuses_oversized_bodies() {
        let body: &[u8] = b"0123456789";
        assert_eq!(read_capped(body, 10).ok().as_deref(), Some(&body[..]));
        assert!(matches!(read_capped(body, 9), Err(CapError::TooLarge)));
        assert!(matches!(read_capped(&b""[..], 0), Ok(v) if v.is_empty()));
    }
}
