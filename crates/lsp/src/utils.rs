use crate::error::ResolutionFailure;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file:";

/// Rewrites a `file:` URI so that exactly three slashes follow the scheme.
///
/// Some hosts hand out `file://C:/...` or `file:/home/...`; both parse to the wrong
/// thing (or not at all) unless the authority is explicitly empty. Non-file URIs are
/// returned untouched.
pub fn normalize_file_uri(uri: &str) -> String {
    match uri.get(..FILE_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(FILE_SCHEME) => {
            let rest = uri[FILE_SCHEME.len()..].trim_start_matches('/');
            format!("file:///{rest}")
        }
        _ => uri.to_string(),
    }
}

/// Parses a (normalised) file URI into an absolute local path.
pub fn uri_to_file_path(uri: &str) -> Result<PathBuf, ResolutionFailure> {
    let url = url::Url::parse(&normalize_file_uri(uri))?;
    if url.scheme() != "file" {
        return Err(ResolutionFailure::NotAFilePath);
    }
    url.to_file_path()
        .map_err(|()| ResolutionFailure::NotAFilePath)
}

/// Builds the canonical three-slash URI for a local path.
pub fn uri_for_path(path: &Path) -> Option<String> {
    url::Url::from_file_path(path)
        .ok()
        .map(|url| normalize_file_uri(url.as_str()))
}

pub trait ToFilePath {
    fn to_file_path(&self) -> Result<PathBuf, ResolutionFailure>;
}

impl ToFilePath for lsp_types::Uri {
    fn to_file_path(&self) -> Result<PathBuf, ResolutionFailure> {
        uri_to_file_path(self.as_str())
    }
}

impl ToFilePath for str {
    fn to_file_path(&self) -> Result<PathBuf, ResolutionFailure> {
        uri_to_file_path(self)
    }
}
