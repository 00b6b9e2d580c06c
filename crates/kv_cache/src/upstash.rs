//! Upstash Redis over its REST API.
//!
//! `GET {url}/get/{key}` → `{"result": "<value>" | null}`
//! `POST {url}/set/{key}?EX={secs}` with the value as body → `{"result": "OK"}`
//! Failures come back as `{"error": "..."}` with a 4xx/5xx status.

use std::time::Duration;

use async_trait::async_trait;
use common::http::{format_error_chain, summarize_body};
use common::Error;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::KvStore;

#[derive(Debug, Deserialize)]
pub struct UpstashReply {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Decode a reply body into its `result`, surfacing `error` as a cache error.
pub fn parse_reply(body: &str) -> Result<Option<serde_json::Value>, Error> {
    let reply: UpstashReply = serde_json::from_str(body)
        .map_err(|e| Error::Cache(format!("malformed Upstash reply: {e}")))?;
    if let Some(error) = reply.error {
        return Err(Error::Cache(format!("Upstash error: {error}")));
    }
    Ok(reply.result.filter(|v| !v.is_null()))
}

#[derive(Debug, Clone)]
pub struct UpstashStore {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl UpstashStore {
    pub fn new(rest_url: &str, token: &str) -> Result<Self, Error> {
        if rest_url.trim().is_empty() || token.trim().is_empty() {
            return Err(Error::Config(
                "Upstash cache needs both a REST URL and a token".into(),
            ));
        }
        let base_url = Url::parse(rest_url.trim())
            .map_err(|e| Error::Config(format!("invalid Upstash REST URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Upstash REST URL cannot be a base: {rest_url}")));
        }

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Cache(format!("failed to build Upstash HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: token.trim().to_string(),
        })
    }

    /// `{base}/{command}/{key}` with the key percent-encoded as one path segment.
    pub fn command_url(&self, command: &str, key: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(command);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<serde_json::Value>, Error> {
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Cache(format!("Upstash request failed: {}", format_error_chain(&e))))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Cache(format!("Upstash body read failed: {}", format_error_chain(&e))))?;

        if !status.is_success() {
            return Err(Error::Cache(format!(
                "Upstash returned {}: {}",
                status.as_u16(),
                summarize_body(&body)
            )));
        }
        parse_reply(&body)
    }
}

#[async_trait]
impl KvStore for UpstashStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let url = self.command_url("get", Some(key));
        debug!("Upstash GET {}", key);
        match self.send(self.client.get(url)).await? {
            Some(serde_json::Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(Error::Cache(format!(
                "Upstash GET {key} returned a non-string value: {other}"
            ))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let mut url = self.command_url("set", Some(key));
        url.query_pairs_mut()
            .append_pair("EX", &ttl.as_secs().max(1).to_string());
        debug!("Upstash SET {} (ttl={}s)", key, ttl.as_secs());
        self.send(self.client.post(url).body(value.to_string())).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), Error> {
        let url = self.command_url("ping", None);
        match self.send(self.client.get(url)).await? {
            Some(serde_json::Value::String(pong)) if pong == "PONG" => Ok(()),
            other => Err(Error::Cache(format!("unexpected PING reply: {other:?}"))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "upstash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_variants() {
        assert_eq!(
            parse_reply(r#"{"result": "[1,2]"}"#).unwrap(),
            Some(serde_json::Value::String("[1,2]".into()))
        );
        assert_eq!(parse_reply(r#"{"result": null}"#).unwrap(), None);
        assert!(parse_reply(r#"{"error": "WRONGPASS invalid password"}"#).is_err());
        assert!(parse_reply("<html>").is_err());
    }

    #[test]
    fn test_command_url_encodes_key() {
        let store = UpstashStore::new("https://eu1-fine-bird.upstash.io/", "tok").unwrap();
        assert_eq!(
            store.command_url("get", Some("region-hotspots-US-WA-033")).as_str(),
            "https://eu1-fine-bird.upstash.io/get/region-hotspots-US-WA-033"
        );
        assert_eq!(
            store.command_url("get", Some("a/b c")).as_str(),
            "https://eu1-fine-bird.upstash.io/get/a%2Fb%20c"
        );
        assert_eq!(
            store.command_url("ping", None).as_str(),
            "https://eu1-fine-bird.upstash.io/ping"
        );
    }

    #[test]
    fn test_requires_url_and_token() {
        assert!(UpstashStore::new("", "tok").is_err());
        assert!(UpstashStore::new("https://x.upstash.io", " ").is_err());
        assert!(UpstashStore::new("not a url", "tok").is_err());
    }
}
