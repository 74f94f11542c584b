use nudge_notifications::adapters::push_service::DEFAULT_TTL_SECONDS;
use nudge_notifications::{DEFAULT_ICON, DEFAULT_PUSH_TITLE, PayloadTemplate, VapidCredentials};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Web push delivery (VAPID credentials and payload presentation)
    #[serde(default)]
    pub push: PushSettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.push.ttl_seconds == 0 {
            return Err("push.ttl_seconds must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PushSettings {
    /// Contact address for the VAPID `sub` claim
    #[serde(default)]
    pub vapid_email: Option<String>,
    #[serde(default)]
    pub vapid_public_key: Option<String>,
    /// For security, prefer the NUDGE__PUSH__VAPID_PRIVATE_KEY env var
    #[serde(default)]
    pub vapid_private_key: Option<String>,
    #[serde(default = "default_push_title")]
    pub title: String,
    #[serde(default = "default_push_icon")]
    pub icon: String,
    #[serde(default = "default_push_icon")]
    pub badge: String,
    /// Opened when a notification is clicked
    #[serde(default = "default_click_url")]
    pub click_url: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
}

fn default_push_title() -> String {
    DEFAULT_PUSH_TITLE.into()
}
fn default_push_icon() -> String {
    DEFAULT_ICON.into()
}
fn default_click_url() -> String {
    "/".into()
}
fn default_ttl_seconds() -> u32 {
    DEFAULT_TTL_SECONDS
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            vapid_email: None,
            vapid_public_key: None,
            vapid_private_key: None,
            title: default_push_title(),
            icon: default_push_icon(),
            badge: default_push_icon(),
            click_url: default_click_url(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl std::fmt::Debug for PushSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSettings")
            .field("vapid_email", &self.vapid_email)
            .field("vapid_public_key", &self.vapid_public_key)
            .field(
                "vapid_private_key",
                &self.vapid_private_key.as_ref().map(|_| "***"),
            )
            .field("title", &self.title)
            .field("icon", &self.icon)
            .field("badge", &self.badge)
            .field("click_url", &self.click_url)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl PushSettings {
    /// `None` unless all three VAPID parts are set.
    pub fn credentials(&self) -> Option<VapidCredentials> {
        VapidCredentials::from_parts(
            self.vapid_email.clone(),
            self.vapid_public_key.clone(),
            self.vapid_private_key.clone(),
        )
    }

    /// Some but not all VAPID parts are set
    pub fn is_partial(&self) -> bool {
        let set = [
            &self.vapid_email,
            &self.vapid_public_key,
            &self.vapid_private_key,
        ]
        .iter()
        .filter(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .count();
        set > 0 && set < 3
    }

    pub fn template(&self) -> PayloadTemplate {
        PayloadTemplate {
            title: self.title.clone(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            url: self.click_url.clone(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "nudge.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf).format(FileFormat::Toml));
        }
        // Environment variable overrides, e.g., NUDGE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("NUDGE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
