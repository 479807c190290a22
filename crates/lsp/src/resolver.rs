use crate::error::{Error, ResolutionFailure, Result};
use crate::utils::uri_to_file_path;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where a resource lives relative to the project that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResource {
    /// Directory containing the project marker.
    pub project_root: PathBuf,
    /// The marker file that identified `project_root`.
    pub marker: PathBuf,
    /// Absolute path of the resource.
    pub path: PathBuf,
    /// `path` relative to `project_root`.
    pub relative_path: PathBuf,
}

/// Maps `uri` onto its owning project by walking ancestor directories for a
/// `*.{marker_extension}` file.
///
/// When a directory holds several markers the first one returned by the
/// filesystem wins; that order is not deterministic. Symlinked ancestors are
/// walked as-is.
pub fn resolve(uri: &str, marker_extension: &str) -> Result<ResolvedResource> {
    let path = uri_to_file_path(uri).map_err(|reason| Error::Resolution {
        uri: uri.to_string(),
        reason,
    })?;

    resolve_path(&path, marker_extension).ok_or_else(|| {
        warn!("Unable to resolve project from URI {}", uri);
        Error::Resolution {
            uri: uri.to_string(),
            reason: ResolutionFailure::NoProjectMarker {
                extension: marker_extension.to_string(),
            },
        }
    })
}

/// Path-level half of [`resolve`].
pub fn resolve_path(path: &Path, marker_extension: &str) -> Option<ResolvedResource> {
    let mut directory = path.parent();
    while let Some(dir) = directory {
        if let Some(marker) = find_marker(dir, marker_extension) {
            let relative_path = path.strip_prefix(dir).ok()?.to_path_buf();
            debug!(
                "resolved {} to project {} via {}",
                path.display(),
                dir.display(),
                marker.display()
            );
            return Some(ResolvedResource {
                project_root: dir.to_path_buf(),
                marker,
                path: path.to_path_buf(),
                relative_path,
            });
        }
        directory = dir.parent();
    }
    None
}

fn find_marker(dir: &Path, marker_extension: &str) -> Option<PathBuf> {
    // Unreadable directories are treated as having no marker.
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .find(|candidate| {
            candidate.is_file()
                && candidate
                    .extension()
                    .is_some_and(|ext| ext == marker_extension)
        })
}
