//! Upstream GET helper and failure reporting.

use std::error::Error as StdError;

use reqwest::{RequestBuilder, StatusCode};

use crate::Error;

/// Send `request` and return the body of a 2xx response.
///
/// Transport and body-read failures become [`Error::Http`]; any other
/// status becomes [`Error::Upstream`] carrying the upstream's code.
pub async fn get_text(request: RequestBuilder, service: &'static str) -> Result<String, Error> {
    let resp = request
        .send()
        .await
        .map_err(|e| Error::Http(format!("{service} request failed: {}", format_error_chain(&e))))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Http(format!("{service} body read failed: {}", format_error_chain(&e))))?;

    if !status.is_success() {
        return Err(upstream_error(service, status, &body));
    }
    Ok(body)
}

/// Error for a non-2xx answer. An empty body falls back to the reason phrase.
pub fn upstream_error(service: &'static str, status: StatusCode, body: &str) -> Error {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        summarize_body(body)
    };
    Error::Upstream {
        service,
        status: status.as_u16(),
        message,
    }
}

/// Render an error with its chain of causes so DNS/TLS/socket failures are visible.
pub fn format_error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

/// Single-line, length-capped copy of an upstream response body for logs and errors.
pub fn summarize_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    let trimmed = compact.trim();
    match trimmed.char_indices().nth(MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_body_flattens_and_caps() {
        assert_eq!(summarize_body("bad\nrequest\r\n"), "bad request");

        let long = "é".repeat(600);
        let summary = summarize_body(&long);
        assert_eq!(summary.chars().count(), 501);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_upstream_error_message() {
        let err = upstream_error("eBird", StatusCode::FORBIDDEN, "  \n");
        assert_eq!(err.to_string(), "eBird returned status 403: Forbidden");

        let err = upstream_error("Mapbox", StatusCode::UNPROCESSABLE_ENTITY, "{\"message\":\"bad\nquery\"}");
        assert_eq!(err.upstream_status(), Some(422));
        assert_eq!(err.to_string(), "Mapbox returned status 422: {\"message\":\"bad query\"}");
    }

    #[tokio::test]
    async fn test_get_text_unreachable_host_is_http_error() {
        let client = reqwest::Client::new();
        let err = get_text(client.get("http://127.0.0.1:1/unreachable"), "FCC")
            .await
            .unwrap_err();
        match err {
            Error::Http(msg) => assert!(msg.starts_with("FCC request failed"), "{msg}"),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        assert!(format_error_chain(&outer).contains("connection reset"));
    }
}
