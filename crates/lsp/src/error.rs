use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error carried by host-facing failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a URI could not be mapped onto a project.
#[derive(Debug, Error)]
pub enum ResolutionFailure {
    #[error("not a valid URI: {0}")]
    InvalidUri(#[from] url::ParseError),
    #[error("URI does not name a local file")]
    NotAFilePath,
    #[error("no ancestor directory contains a *.{extension} project marker")]
    NoProjectMarker { extension: String },
}

/// Errors surfaced by the bridge to its callers.
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum Error {
    /// The URI could not be resolved to a project root.
    #[error("bridge::Resolution: uri={uri}: {reason}")]
    Resolution {
        uri: String,
        #[source]
        reason: ResolutionFailure,
    },

    /// The project root is missing or the host failed to open it.
    #[error("bridge::ProjectUnavailable: root={root:?}")]
    ProjectUnavailable {
        root: PathBuf,
        #[source]
        source: BoxError,
    },

    /// No file exists at the resolved location, or the host has no view of it.
    #[error("bridge::ResourceNotFound: path={path:?}")]
    ResourceNotFound { path: PathBuf },

    /// The host could not materialise a live buffer for the file.
    #[error("bridge::DocumentUnavailable: path={path:?}")]
    DocumentUnavailable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A host-level failure while running an ephemeral editing session.
    #[error("bridge::Sandbox: path={path:?}")]
    Sandbox {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
