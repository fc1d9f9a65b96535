use serde::Deserialize;
use std::{fmt, fs, io, path::PathBuf};

const DEFAULT_CONFIG_PATH: &str = "hydro-dashboard.toml";

pub const USERNAME_VAR: &str = "TORONTOHYDRO_USERNAME";
pub const PASSWORD_VAR: &str = "TORONTOHYDRO_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub login_url: String,
    pub usage_url: String,
    pub data_url: String,
    /// Extra trust roots; the portal does not send its intermediate certificates.
    pub ca_bundle: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: "https://css.torontohydro.com/selfserve/pages/login.aspx?ReturnUrl=%2f_layouts%2fAuthenticate.aspx%3fSource%3d%252f&Source=%2f".to_string(),
            usage_url: "https://css.torontohydro.com/Pages/ICFRedirect.aspx?Controller=myenergy&Action=billhistory".to_string(),
            data_url: "https://myusage.torontohydro.com/cassandra/getfile/period/all/format/csv".to_string(),
            ca_bundle: Some(PathBuf::from("torontohydro_cert_bundle.pem")),
            user_agent: concat!("hydro-dashboard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind_addr: String,
    pub title: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8501".to_string(),
            title: "Toronto Hydro Electricity Usage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Replay an exported CSV instead of logging into the portal.
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub dashboard: DashboardConfig,
    pub source: SourceConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads `HYDRO_DASHBOARD_CONFIG`, or `hydro-dashboard.toml` if present.
    /// Only an explicitly named file is required to exist.
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;
        use std::env;

        let (path, explicit) = match env::var("HYDRO_DASHBOARD_CONFIG") {
            Ok(p) => (p, true),
            Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path, "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read config {path}")),
        };

        Self::from_toml(&contents).with_context(|| format!("invalid config {path}"))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Portal credentials from the environment. Required unless
    /// `source.csv_path` replaces the portal, where they are optional.
    pub fn credentials(&self) -> anyhow::Result<Option<Credentials>> {
        match &self.source.csv_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "replaying usage export, portal credentials not required");
                Ok(Credentials::from_env().ok())
            }
            None => Credentials::from_env().map(Some),
        }
    }
}

/// Portal login. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        use std::env;

        Self::from_vars(env::var(USERNAME_VAR).ok(), env::var(PASSWORD_VAR).ok())
    }

    fn from_vars(username: Option<String>, password: Option<String>) -> anyhow::Result<Self> {
        match (username, password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => anyhow::bail!(
                "must specify username and password using the environment variables {USERNAME_VAR} and {PASSWORD_VAR}"
            ),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.dashboard.bind_addr, "127.0.0.1:8501");
        assert!(cfg.portal.login_url.starts_with("https://css.torontohydro.com/"));
        assert!(cfg.source.csv_path.is_none());
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [dashboard]
            bind_addr = "0.0.0.0:9000"

            [source]
            csv_path = "usage.csv"

            [metrics]
            bind_addr = "127.0.0.1:9100"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dashboard.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.dashboard.title, "Toronto Hydro Electricity Usage");
        assert_eq!(cfg.source.csv_path, Some(PathBuf::from("usage.csv")));
        assert_eq!(cfg.metrics.map(|m| m.bind_addr).as_deref(), Some("127.0.0.1:9100"));
        assert_eq!(
            cfg.portal.ca_bundle,
            Some(PathBuf::from("torontohydro_cert_bundle.pem"))
        );
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn missing_credential_names_both_variables() {
        let err = Credentials::from_vars(Some("alice".to_string()), None).unwrap_err().to_string();
        assert!(err.contains(USERNAME_VAR));
        assert!(err.contains(PASSWORD_VAR));
    }

    #[test]
    fn csv_source_does_not_require_credentials() {
        let cfg = AppConfig::from_toml("[source]\ncsv_path = \"usage.csv\"\n").unwrap();
        assert!(cfg.credentials().is_ok());
    }
}
