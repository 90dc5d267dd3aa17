use broker::BrokerConfig;
use gateway::GatewayConfig;
use serde::Deserialize;
use std::fs::File;

#[derive(Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
}

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            broker:
                upstream_template_url: https://registry.test/PeerTubeConfig.json
                host_override: descriptors.example.org
                scheme_override: https
                upstream_ttl_secs: 600
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 8080
                public_dir: /var/lib/peerbridge/public
                qr_enabled: false
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_host, "127.0.0.1");
        assert_eq!(metrics.statsd_port, 8125);

        assert_eq!(
            config.broker.upstream_template_url,
            "https://registry.test/PeerTubeConfig.json"
        );
        assert_eq!(
            config.broker.host_override.as_deref(),
            Some("descriptors.example.org")
        );
        assert_eq!(config.broker.upstream_ttl_secs, 600);

        assert_eq!(config.gateway.listener.host, "0.0.0.0");
        assert_eq!(config.gateway.listener.port, 8080);
        assert!(!config.gateway.qr_enabled);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let tmp = write_tmp_file("{}");
        let config = Config::from_file(tmp.path()).expect("load config");

        assert!(config.common.metrics.is_none());
        assert_eq!(
            config.broker.upstream_template_url,
            broker::config::DEFAULT_UPSTREAM_TEMPLATE_URL
        );
        assert_eq!(config.gateway.listener.port, 3000);
        assert!(config.gateway.qr_enabled);
        assert!(config.gateway.static_authorization.is_none());
    }
}
