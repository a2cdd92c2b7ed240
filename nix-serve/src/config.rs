use crate::error::{CacheError, ConfigError, Result};
use nix_serve_core::{SigningKey, StoreDir};
use serde::Deserialize;
use std::fmt;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

fn default_bind() -> String {
    "[::]:5000".into()
}

fn default_workers() -> usize {
    4
}

fn default_connection_rate() -> usize {
    256
}

fn default_priority() -> usize {
    30
}

fn default_virtual_store() -> String {
    "/nix/store".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(nix_serve_db::SYSTEM_DB_PATH)
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_connection_rate")]
    pub max_connection_rate: usize,
    #[serde(default = "default_priority")]
    pub priority: usize,

    #[serde(default = "default_virtual_store")]
    pub virtual_nix_store: String,

    #[serde(default)]
    pub real_nix_store: Option<PathBuf>,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub secret_key_file: Option<PathBuf>,

    #[serde(skip)]
    pub secret_key: Option<SigningKey>,
    #[serde(skip)]
    pub store_dir: StoreDir,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            workers: default_workers(),
            max_connection_rate: default_connection_rate(),
            priority: default_priority(),
            virtual_nix_store: default_virtual_store(),
            real_nix_store: None,
            db_path: default_db_path(),
            secret_key_file: None,
            secret_key: None,
            store_dir: StoreDir::default(),
        }
    }
}

impl Config {
    pub fn load(settings_file: &Path) -> Result<Config> {
        let contents = read_to_string(settings_file).map_err(|e| ConfigError::ReadFile {
            path: settings_file.display().to_string(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Config> {
        toml::from_str(contents).map_err(|e| CacheError::from(ConfigError::from(e)))
    }
}

/// A `host:port` pair as accepted by `--listen`.
///
/// IPv6 hosts may be written in brackets, `[::1]:5000`. Port 0 asks the
/// kernel for a free port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    pub host: String,
    pub port: u16,
}

impl ListenAddr {
    pub fn parse(listen: &str) -> std::result::Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidListen {
            listen: listen.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("invalid port number"))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Overrides that come from the command line.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub listen: Option<String>,
}

/// Load the configuration: `--config`, then `CONFIG_FILE`, then
/// `./settings.toml`, then built-in defaults. Environment and command line
/// overrides are applied afterwards and the signing key is loaded.
pub fn load(cli: &CliOverrides) -> Result<Config> {
    let settings_file = cli
        .config_file
        .clone()
        .or_else(|| std::env::var_os("CONFIG_FILE").map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from("settings.toml");
            local.exists().then_some(local)
        });

    let mut settings = match settings_file {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    if let Some(store_dir) = std::env::var_os("NIX_STORE_DIR") {
        settings.virtual_nix_store = store_dir.to_string_lossy().into_owned();
    }
    if let Some(key_file) = std::env::var_os("NIX_SECRET_KEY_FILE") {
        settings.secret_key_file = Some(PathBuf::from(key_file));
    }
    if let Some(listen) = &cli.listen {
        settings.bind = ListenAddr::parse(listen)?.to_string();
    }

    settings.finalize()?;
    Ok(settings)
}

impl Config {
    /// Validate the settings and derive the values computed from them.
    pub fn finalize(&mut self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                reason: "workers must be greater than 0".to_string(),
            }
            .into());
        }

        self.store_dir =
            StoreDir::new(self.virtual_nix_store.as_str()).map_err(|e| ConfigError::Invalid {
                reason: e.to_string(),
            })?;

        if let Some(key_file) = &self.secret_key_file {
            let key = SigningKey::from_file(key_file).map_err(|e| {
                ConfigError::InvalidSigningKey {
                    reason: format!(
                        "Couldn't parse secret key from '{}': {}",
                        key_file.display(),
                        e
                    ),
                }
            })?;
            self.secret_key = Some(key);
        }
        Ok(())
    }
}
