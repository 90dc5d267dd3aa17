use serde::Deserialize;

/// Central template document merged into every synthesized descriptor.
pub const DEFAULT_UPSTREAM_TEMPLATE_URL: &str =
    "https://plugins.grayjay.app/PeerTube/PeerTubeConfig.json";

fn default_upstream_template_url() -> String {
    DEFAULT_UPSTREAM_TEMPLATE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_ttl_secs() -> u64 {
    3600
}

/// Broker configuration.
///
/// `scheme_override` and `host_override` replace the request-derived scheme
/// and host of this service when set; precedence is override first, request
/// value second.
#[derive(Clone, Deserialize, Debug)]
pub struct BrokerConfig {
    #[serde(default = "default_upstream_template_url")]
    pub upstream_template_url: String,
    #[serde(default)]
    pub scheme_override: Option<String>,
    #[serde(default)]
    pub host_override: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Template freshness window used for descriptor synthesis.
    #[serde(default = "default_ttl_secs")]
    pub upstream_ttl_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            upstream_template_url: default_upstream_template_url(),
            scheme_override: None,
            host_override: None,
            probe_timeout_secs: default_timeout_secs(),
            upstream_timeout_secs: default_timeout_secs(),
            upstream_ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid upstream template url: {0}")]
    InvalidUpstreamUrl(#[from] url::ParseError),
}
