pub mod config;
pub mod core;
pub mod document;
pub mod error;
pub mod host;
pub mod privileged;
pub mod project_cache;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{diff, text_edits, ComparisonPolicy, EditFragment};
pub use crate::document::TextSnapshot;
pub use crate::error::{Error, ResolutionFailure, Result};
pub use crate::host::{Host, LocalHost};
pub use crate::privileged::{DispatchError, PrivilegedContext};
pub use crate::project_cache::ProjectCache;
pub use crate::resolver::{resolve, ResolvedResource};
pub use crate::session::{SandboxOptions, SandboxOutcome, Session};
pub use crate::utils::{normalize_file_uri, uri_for_path, ToFilePath};

use serde::Serialize;

pub fn to_json<T: Serialize>(value: T) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| anyhow::anyhow!("could not serialize to json {}", e))
}
