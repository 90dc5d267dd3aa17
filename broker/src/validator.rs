//! Candidate instance validation.
//!
//! A candidate string is accepted once it normalizes to a well-formed URL
//! and the host behind it answers the PeerTube config probe with the two
//! identity fields every instance exposes.

use crate::errors::BrokerError;
use crate::metrics_defs::INSTANCE_VALIDATION_FAILURE;
use md5::{Digest, Md5};
use serde::Deserialize;
use shared::counter;
use std::time::Duration;
use url::Url;

/// Path probed on every candidate instance.
const INSTANCE_CONFIG_PATH: &str = "/api/v1/config/";

/// Identity of a validated instance, derived per request and never stored.
#[derive(Debug, Clone)]
pub struct InstanceIdentity {
    /// Lowercased, trimmed candidate as supplied by the caller.
    pub host: String,
    /// `host` with a scheme; `https://` is assumed when none was given.
    pub platform_url: String,
    /// Stable 8-4-4-4-12 identifier derived from `host`.
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
struct InstanceConfig {
    instance: Option<InstanceAbout>,
}

#[derive(Deserialize)]
struct InstanceAbout {
    name: Option<String>,
    #[serde(rename = "shortDescription")]
    short_description: Option<String>,
}

pub struct InstanceValidator {
    client: reqwest::Client,
    timeout: Duration,
}

impl InstanceValidator {
    pub fn new(timeout: Duration) -> Self {
        InstanceValidator {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Checks that `candidate` names a live PeerTube instance and returns
    /// its identity. Does not touch the upstream cache.
    pub async fn validate(&self, candidate: &str) -> Result<InstanceIdentity, BrokerError> {
        let result = self.validate_inner(candidate).await;
        if let Err(err) = &result {
            counter!(INSTANCE_VALIDATION_FAILURE).increment(1);
            tracing::warn!(candidate, error = %err, "instance validation failed");
        }
        result
    }

    async fn validate_inner(&self, candidate: &str) -> Result<InstanceIdentity, BrokerError> {
        let host = candidate.trim().to_lowercase();
        if host.is_empty() {
            return Err(BrokerError::MissingInput);
        }

        let platform_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.clone()
        } else {
            format!("https://{host}")
        };

        let mut probe_url =
            Url::parse(&platform_url).map_err(|e| BrokerError::MalformedUrl(e.to_string()))?;
        probe_url.set_path(INSTANCE_CONFIG_PATH);

        let response = self
            .client
            .get(probe_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_probe_error)?;

        if !response.status().is_success() {
            return Err(BrokerError::InvalidInstanceResponse(format!(
                "unexpected status {} from {probe_url}",
                response.status()
            )));
        }

        let config = response
            .json::<InstanceConfig>()
            .await
            .map_err(|e| BrokerError::InvalidInstanceResponse(e.to_string()))?;

        let about = config
            .instance
            .ok_or_else(|| missing_field(&host, "instance"))?;
        let name = about
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| missing_field(&host, "instance.name"))?;
        let description = about
            .short_description
            .filter(|description| !description.is_empty())
            .ok_or_else(|| missing_field(&host, "instance.shortDescription"))?;

        Ok(InstanceIdentity {
            id: derive_instance_id(&host),
            platform_url,
            host,
            name,
            description,
        })
    }
}

fn missing_field(host: &str, field: &str) -> BrokerError {
    BrokerError::InvalidInstanceResponse(format!("{host} returned a config without {field}"))
}

fn classify_probe_error(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout(format!("instance config probe: {err}"))
    } else if err.is_connect() {
        BrokerError::UnreachableInstance(err.to_string())
    } else {
        BrokerError::InvalidInstanceResponse(err.to_string())
    }
}

/// Renders the MD5 digest of the normalized host in the canonical
/// 8-4-4-4-12 grouping. Same normalized host, same identifier.
pub fn derive_instance_id(host: &str) -> String {
    let digest = hex::encode(Md5::digest(host.as_bytes()));
    format!(
        "{}-{}-{}-{}-{}",
        &digest[..8],
        &digest[8..12],
        &digest[12..16],
        &digest[16..20],
        &digest[20..]
    )
}
