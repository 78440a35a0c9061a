//! Process-wide application state shared by the CLI and the HTTP API.
//!
//! Holds resolved settings and the test processor (which owns the loaded
//! classifier). Nothing in here is mutated after startup; every unit of
//! work opens its own database connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::Settings;
use crate::db;
use crate::pipeline::classifier::{self, Classifier, LoadError};
use crate::pipeline::image_store::ImageStore;
use crate::pipeline::processor::TestProcessor;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Classifier could not be loaded: {0}")]
    ClassifierLoad(#[from] LoadError),

    #[error("Account error: {0}")]
    Account(#[from] crate::accounts::AccountError),

    #[error("Server error: {0}")]
    Server(String),
}

pub struct CoreState {
    settings: Settings,
    database_path: PathBuf,
    exports_dir: PathBuf,
    processor: TestProcessor,
}

impl CoreState {
    /// Create the data directories, bring the schema up to date and wrap
    /// the given classifier.
    pub fn new(settings: Settings, classifier: Arc<dyn Classifier>) -> Result<Self, CoreError> {
        let database_path = settings.database_path();
        let uploads_dir = settings.uploads_dir();
        let exports_dir = settings.exports_dir();

        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&uploads_dir)?;
        std::fs::create_dir_all(&exports_dir)?;

        // Runs migrations once up front so request handlers never race on them.
        db::open_database(&database_path)?;

        tracing::info!(
            data_dir = %settings.data_dir().display(),
            classes = classifier.classes().len(),
            "Core state ready"
        );

        Ok(Self {
            settings,
            database_path,
            exports_dir,
            processor: TestProcessor::new(classifier, ImageStore::new(uploads_dir)),
        })
    }

    /// Load the classifier from the configured model directory, then build state.
    pub fn bootstrap(settings: Settings) -> Result<Self, CoreError> {
        let model_dir = settings.model_dir();
        let classifier = classifier::load_classifier(&model_dir)?;
        tracing::info!(
            model_dir = %model_dir.display(),
            classes = classifier.classes().len(),
            "Classifier loaded"
        );
        Self::new(settings, classifier)
    }

    /// Open a fresh connection. Each request or command owns its own.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.database_path).map_err(CoreError::Database)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn processor(&self) -> &TestProcessor {
        &self.processor
    }

    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        self.settings.session_ttl()
    }
}
