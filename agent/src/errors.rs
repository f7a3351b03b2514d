//! Error types for the deployment agent
//!
//! The `Display` text of every pipeline variant is the human-readable reason
//! recorded in the deployment history, so those messages are part of the
//! agent's observable behaviour.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the deployment agent
#[derive(Error, Debug)]
pub enum AgentError {
    // --------------------------- pipeline stages --------------------------- //
    #[error("setup of the plugin is not completed yet")]
    SetupIncomplete,

    /// Transport error or any non-200 response from the archive endpoint.
    #[error("unable to get repository data")]
    Fetch {
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("unable to extract repository data")]
    Extract {
        archive: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no repository data found")]
    EmptyArchive,

    #[error("expected exactly one top-level directory in repository data, found {0}")]
    AmbiguousArchive(usize),

    #[error("source directory does not exist")]
    PromoteSourceMissing(PathBuf),

    #[error("couldn't scan repo data")]
    PromoteScan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't move file: {name} to the target directory")]
    PromoteMove {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no changed files found")]
    EmptyChangeSet,

    #[error("couldn't create temporary directory for repo data")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't copy repo data from temporary folder")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't delete one of the changed files from local codebase")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ------------------------------- ambient ------------------------------- //
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl AgentError {
    /// Build a fetch error from a non-200 status
    pub fn fetch_status(status: u16) -> Self {
        AgentError::Fetch {
            status: Some(status),
            source: None,
        }
    }

    /// Build a fetch error from a transport or local write failure
    pub fn fetch_transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        AgentError::Fetch {
            status: None,
            source: Some(Box::new(err)),
        }
    }
}
