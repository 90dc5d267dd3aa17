pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod synthesizer;
pub mod upstream;
pub mod validator;

pub use config::{BrokerConfig, ConfigError};
pub use errors::BrokerError;
pub use synthesizer::ConfigSynthesizer;
pub use upstream::UpstreamCache;
pub use validator::{InstanceIdentity, InstanceValidator};
