//! Consul KV directory adapter.
//!
//! Talks to the agent's HTTP API:
//!   PUT  /v1/kv/{name}                 body = raw address, reply = true|false
//!   GET  /v1/kv/{prefix}?recurse=true  reply = [{"Key": .., "Value": base64|null}]
//! A 404 on listing means no key carries the prefix yet.

use std::time::Duration;

use base64::Engine;
use serde::Deserialize;

use greetmesh_core::PeerIdentity;

use crate::directory::{Directory, DirectoryError};

#[derive(Debug, Deserialize)]
struct KvPair {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsulDirectory {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl ConsulDirectory {
    /// `address` may be bare `host:port`; `http://` is assumed.
    pub fn new(address: &str, request_timeout: Duration) -> Result<Self, DirectoryError> {
        let address = address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(DirectoryError::InvalidAddress(address.to_string()));
        }
        let raw = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let base_url = reqwest::Url::parse(&raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| DirectoryError::InvalidAddress(address.to_string()))?;
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `key` becomes a single percent-encoded path segment, so `?`, `#` and
    /// `%` in a name stay part of the key.
    fn kv_url(&self, key: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v1", "kv", key]);
        }
        url
    }
}

impl Directory for ConsulDirectory {
    async fn register(&self, identity: &PeerIdentity) -> Result<(), DirectoryError> {
        let key = identity.name();
        let resp = self
            .client
            .put(self.kv_url(key))
            .body(identity.address().to_string())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                key: key.to_string(),
            });
        }
        if !resp.json::<bool>().await? {
            return Err(DirectoryError::Rejected(key.to_string()));
        }

        tracing::debug!(key, url = %self.base_url, "directory record written");
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<PeerIdentity>, DirectoryError> {
        let mut url = self.kv_url(namespace);
        url.query_pairs_mut().append_pair("recurse", "true");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                key: namespace.to_string(),
            });
        }

        let pairs: Vec<KvPair> = resp.json().await?;
        Ok(pairs.into_iter().filter_map(decode_pair).collect())
    }
}

/// Turn one KV pair into an identity, or skip it with a warning.
fn decode_pair(pair: KvPair) -> Option<PeerIdentity> {
    let Some(encoded) = pair.value else {
        tracing::warn!(key = %pair.key, "directory record has no value, skipping");
        return None;
    };
    let address = match base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| e.to_string())
        .and_then(|raw| String::from_utf8(raw).map_err(|e| e.to_string()))
    {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(key = %pair.key, error = %e, "undecodable directory value, skipping");
            return None;
        }
    };
    match PeerIdentity::new(pair.key.as_str(), address) {
        Ok(peer) => Some(peer),
        Err(e) => {
            tracing::warn!(key = %pair.key, error = %e, "skipping invalid directory record");
            None
        }
    }
}
