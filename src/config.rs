use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

pub const JWT_SECRET_ENV: &str = "GAINS_JWT_SECRET";

#[derive(Parser, Debug, Default)]
#[command(name = "gains", about = "API server for the Gains fitness social network")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Serve built-in sample data and disable writes
    #[arg(long)]
    pub demo: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(skip)]
    pub force_demo: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL clients use to reach this server; upload URLs are built on it.
    pub public_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    /// Shared HS256 secret of the auth provider. Without it the server runs
    /// in demo mode.
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gains_access_token".to_string(),
            jwt_secret: None,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.trim().is_empty() {
                config.auth.jwt_secret = Some(secret);
            }
        }

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        config.force_demo = cli.demo;

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("gains.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".gains"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("gains.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }

    /// Demo mode serves fixtures and refuses everything that needs the
    /// database or an identity.
    pub fn is_demo(&self) -> bool {
        self.force_demo
            || self
                .auth
                .jwt_secret
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
    }

    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.server.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "gains_access_token");
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.database.path.is_none());
        assert!(config.storage.path.is_none());
        assert!(config.is_demo());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = Cli {
            data_dir: Some(PathBuf::from("/tmp/test-gains")),
            ..Default::default()
        };
        assert_eq!(
            Config::data_dir(&cli).unwrap(),
            PathBuf::from("/tmp/test-gains")
        );
    }

    #[test]
    fn data_dir_defaults_to_home_dot_gains() {
        let dir = Config::data_dir(&Cli::default()).unwrap();
        assert!(dir.ends_with(".gains"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            data_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("gains.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("uploads"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            data_dir: Some(tmp.path().to_path_buf()),
            demo: true,
            ..Default::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.is_demo());
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
public_url = "https://gains.example.com/"

[auth]
cookie_name = "my_cookie"
jwt_secret = "s3cret"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            data_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.public_url(), "https://gains.example.com");
        assert!(!config.is_demo());
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.public_url(), "http://localhost:4000");
    }

    #[test]
    fn blank_secret_means_demo() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("  ".into());
        assert!(config.is_demo());
        config.auth.jwt_secret = Some("real".into());
        assert!(!config.is_demo());
        config.force_demo = true;
        assert!(config.is_demo());
    }
}
