//! Descriptor synthesis.
//!
//! Orchestrates the full pipeline: validate the candidate instance, fetch
//! the upstream template through the shared cache, then merge the derived
//! instance fields over the template. Instance fields always win over
//! same-named template fields; template constants are preserved with only
//! `baseUrl` overwritten.

use crate::config::{BrokerConfig, ConfigError};
use crate::errors::BrokerError;
use crate::upstream::UpstreamCache;
use crate::validator::{InstanceIdentity, InstanceValidator};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Path of the descriptor endpoint this service exposes; baked into the
/// self-referential `sourceUrl` of every synthesized descriptor.
pub const PLUGIN_CONFIG_PATH: &str = "/api/v1/PluginConfig.json";

const PLATFORM_URL_PARAM: &str = "peerTubePlatformUrl";
const ICON_PATH: &str = "/peertube.png";

pub struct ConfigSynthesizer {
    validator: InstanceValidator,
    cache: Arc<UpstreamCache>,
    upstream_template_url: Url,
    scheme_override: Option<String>,
    host_override: Option<String>,
    default_ttl: Duration,
}

impl ConfigSynthesizer {
    /// Validates the configured upstream template URL up front; everything
    /// downstream can then treat it as well-formed.
    pub fn try_new(config: BrokerConfig, cache: Arc<UpstreamCache>) -> Result<Self, ConfigError> {
        let upstream_template_url = Url::parse(&config.upstream_template_url)?;
        Ok(ConfigSynthesizer {
            validator: InstanceValidator::new(Duration::from_secs(config.probe_timeout_secs)),
            cache,
            upstream_template_url,
            scheme_override: config.scheme_override,
            host_override: config.host_override,
            default_ttl: Duration::from_secs(config.upstream_ttl_secs),
        })
    }

    /// Template freshness window configured for this synthesizer.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Liveness/identity check without descriptor assembly.
    pub async fn validate(&self, candidate: &str) -> Result<InstanceIdentity, BrokerError> {
        self.validator.validate(candidate).await
    }

    /// Scheme-and-host base URL of this service (not of the target
    /// instance). Explicit overrides win over the request-derived values.
    pub fn host_url(&self, request_scheme: &str, request_host: &str) -> String {
        let scheme = self.scheme_override.as_deref().unwrap_or(request_scheme);
        let host = self.host_override.as_deref().unwrap_or(request_host);
        format!("{scheme}://{host}")
    }

    /// Produces the plugin descriptor for `candidate`. Validation failures
    /// and upstream failures abort the whole operation; no partial
    /// descriptor is ever returned.
    pub async fn synthesize(
        &self,
        candidate: &str,
        request_scheme: &str,
        request_host: &str,
        ttl: Duration,
    ) -> Result<Value, BrokerError> {
        let identity = self.validator.validate(candidate).await?;
        let template = self
            .cache
            .get(self.upstream_template_url.as_str(), ttl)
            .await?;

        let Value::Object(mut descriptor) = template else {
            return Err(BrokerError::UpstreamUnavailable(
                "upstream template is not a JSON object".into(),
            ));
        };

        let host_url = self.host_url(request_scheme, request_host);
        let source_url = build_source_url(&identity.host, &host_url)?;
        let script_url = self.resolve_script_url(&descriptor)?;
        let icon_url = resolve_against(&host_url, ICON_PATH)?;

        if let Some(Value::Object(auth)) = descriptor.get_mut("authentication") {
            rewrite_auth_urls(auth, &identity.platform_url);
        }

        match descriptor
            .entry("constants")
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(constants) => {
                constants.insert("baseUrl".into(), Value::String(identity.platform_url.clone()));
            }
            other => *other = json!({ "baseUrl": identity.platform_url }),
        }

        descriptor.insert("name".into(), Value::String(identity.name));
        descriptor.insert("description".into(), Value::String(identity.description));
        descriptor.insert("id".into(), Value::String(identity.id));
        descriptor.insert("platformUrl".into(), Value::String(identity.platform_url));
        descriptor.insert("sourceUrl".into(), Value::String(source_url));
        descriptor.insert("scriptUrl".into(), Value::String(script_url));
        descriptor.insert("iconUrl".into(), Value::String(icon_url));
        descriptor.insert("author".into(), Value::String(host_url.clone()));
        descriptor.insert("authorUrl".into(), Value::String(host_url));

        Ok(Value::Object(descriptor))
    }

    /// Resolves the template's script reference against the template's own
    /// base location, so relative references stay within the registry.
    fn resolve_script_url(&self, descriptor: &Map<String, Value>) -> Result<String, BrokerError> {
        let script_ref = descriptor
            .get("scriptUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BrokerError::UpstreamUnavailable("upstream template is missing scriptUrl".into())
            })?;

        self.upstream_template_url
            .join(script_ref)
            .map(|url| url.to_string())
            .map_err(|e| {
                BrokerError::UpstreamUnavailable(format!(
                    "invalid scriptUrl in upstream template: {e}"
                ))
            })
    }
}

/// Self-referential descriptor retrieval URL for `host`, resolved against
/// `host_url`. Also encoded into the QR image served by the gateway.
pub fn build_source_url(host: &str, host_url: &str) -> Result<String, BrokerError> {
    let base = Url::parse(host_url).map_err(|e| BrokerError::MalformedUrl(e.to_string()))?;
    let mut source = base
        .join(PLUGIN_CONFIG_PATH)
        .map_err(|e| BrokerError::MalformedUrl(e.to_string()))?;
    source
        .query_pairs_mut()
        .append_pair(PLATFORM_URL_PARAM, host);
    Ok(source.to_string())
}

fn resolve_against(host_url: &str, path: &str) -> Result<String, BrokerError> {
    Url::parse(host_url)
        .and_then(|base| base.join(path))
        .map(|url| url.to_string())
        .map_err(|e| BrokerError::MalformedUrl(e.to_string()))
}

/// Points the template's login/completion URL templates at the target
/// instance instead of the template's own origin; path and query survive.
fn rewrite_auth_urls(auth: &mut Map<String, Value>, platform_url: &str) {
    for key in ["loginUrl", "completionUrl"] {
        let Some(Value::String(raw)) = auth.get(key) else {
            continue;
        };
        let Ok(parsed) = Url::parse(raw) else {
            continue;
        };
        let mut rewritten = format!("{platform_url}{}", parsed.path());
        if let Some(query) = parsed.query() {
            rewritten.push('?');
            rewritten.push_str(query);
        }
        auth.insert(key.to_string(), Value::String(rewritten));
    }
}
