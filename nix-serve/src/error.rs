use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cannot fingerprint {path}: NAR size unknown")]
    Fingerprint { path: String },

    #[error("Worker pool error: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid signing key: {reason}")]
    InvalidSigningKey { reason: String },

    #[error("Invalid listen address '{listen}': {reason}")]
    InvalidListen { listen: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server startup failed: {reason}")]
    Startup { reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] nix_serve_db::Error),

    #[error("Corrupt metadata for {path}: {reason}")]
    CorruptPathInfo { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Extension trait for adding context to IO errors
pub trait IoErrorContext<T> {
    fn io_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> IoErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn io_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CacheError::Io {
            context: context.into(),
            source: e,
        })
    }
}
