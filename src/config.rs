use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

/// Application-level constants
pub const APP_NAME: &str = "Pulmoscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DATABASE_FILE: &str = "pulmoscan.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
/// Request body cap for uploads. Matches the decoder's 50 MB limit.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Get the application data directory
/// ~/Pulmoscan/ on all platforms. Falls back to the working directory when
/// no home directory can be determined (service accounts).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "pulmoscan=info,pulmoscan_lib=info,tower_http=info"
}

/// Runtime settings. Every flag has an environment fallback.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Root for the database, uploads and exports (default: ~/Pulmoscan)
    #[arg(long, env = "PULMOSCAN_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding model.onnx and class_dict.csv (default: <data-dir>/model)
    #[arg(long, env = "PULMOSCAN_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Address the HTTP API listens on
    #[arg(long, env = "PULMOSCAN_BIND", default_value = DEFAULT_BIND_ADDR, global = true)]
    pub bind: SocketAddr,

    /// Comma-separated origins allowed by CORS; empty allows none
    #[arg(
        long,
        env = "PULMOSCAN_ALLOWED_ORIGINS",
        value_delimiter = ',',
        global = true
    )]
    pub allowed_origins: Vec<String>,

    /// Bearer session lifetime in hours
    #[arg(long, env = "PULMOSCAN_SESSION_TTL_HOURS", default_value_t = DEFAULT_SESSION_TTL_HOURS, global = true)]
    pub session_ttl_hours: i64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "PULMOSCAN_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES, global = true)]
    pub max_upload_bytes: usize,

    /// PBKDF2 work factor for accounts created over the API. Not a flag.
    #[arg(skip = crate::crypto::PBKDF2_ITERATIONS)]
    pub password_iterations: u32,
}

impl Settings {
    /// Defaults rooted at `data_dir`. Used by tests and embedding callers.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            model_dir: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            allowed_origins: Vec::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            password_iterations: crate::crypto::PBKDF2_ITERATIONS,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(app_data_dir)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("model"))
    }

    /// `<data-dir>/database/pulmoscan.db`
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("database").join(DATABASE_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir().join("uploads")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir().join("exports")
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }
}
