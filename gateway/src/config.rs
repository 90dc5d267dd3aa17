use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

const fn default_qr_enabled() -> bool {
    true
}

fn default_public_dir() -> String {
    "public".into()
}

#[derive(Deserialize, Debug)]
pub struct GatewayConfig {
    #[serde(default)]
    pub listener: Listener,
    /// Directory served for requests no API route claims.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// Registers the QR image endpoint when set.
    #[serde(default = "default_qr_enabled")]
    pub qr_enabled: bool,
    /// Static token check on every route. Inert when unset, which is the
    /// default; the service runs unauthenticated.
    #[serde(default)]
    pub static_authorization: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listener: Listener::default(),
            public_dir: default_public_dir(),
            qr_enabled: default_qr_enabled(),
            static_authorization: None,
        }
    }
}
