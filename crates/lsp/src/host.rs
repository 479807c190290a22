use anyhow::Result;
use std::path::{Path, PathBuf};

pub mod local;

pub use local::LocalHost;

/// The editor platform the bridge runs against.
///
/// The host owns projects, documents and editing sessions; the bridge only holds
/// cloned handles and re-validates them before use. Mutating calls (opening a
/// project, materialising or reloading a document, creating or releasing an
/// editing session, copying a document) are always issued from the
/// [`PrivilegedContext`](crate::privileged::PrivilegedContext).
pub trait Host: Send + Sync + 'static {
    /// An opened project. Cheap to clone; disposal is reported by [`Host::is_live`].
    type Project: Clone + Send + Sync + 'static;
    /// The host's indexed view of a file on disk.
    type View: Clone + Send + Sync + 'static;
    /// A live, mutable text buffer.
    type Document: Clone + Send + Sync + 'static;
    /// An editor-like session over a document, released through [`Host::release_editing_session`].
    type Session: Send + 'static;

    fn open_project(&self, root: &Path) -> Result<Self::Project>;

    fn is_live(&self, project: &Self::Project) -> bool;

    /// Directory that relative resource paths are resolved against.
    fn base_path(&self, project: &Self::Project) -> PathBuf;

    fn find_live_view(&self, path: &Path) -> Option<Self::View>;

    /// Re-synchronise a view with the filesystem after possible external writes.
    fn refresh_view(&self, view: &Self::View);

    fn get_or_create_document(
        &self,
        project: &Self::Project,
        view: &Self::View,
    ) -> Result<Self::Document>;

    /// Reload the buffer from disk and commit the change to any dependent model.
    fn reload_from_disk(&self, project: &Self::Project, document: &Self::Document) -> Result<()>;

    fn document_text(&self, document: &Self::Document) -> String;

    fn document_path(&self, document: &Self::Document) -> PathBuf;

    /// A detached, full-fidelity copy of `document` that shares nothing with it.
    fn create_copy(&self, project: &Self::Project, document: &Self::Document) -> Result<Self::Document>;

    fn discard_copy(&self, copy: Self::Document);

    /// Opens an editor over `document` with the caret at `caret`.
    fn create_editing_session(
        &self,
        project: &Self::Project,
        document: &Self::Document,
        caret: lsp_types::Position,
    ) -> Result<Self::Session>;

    fn release_editing_session(&self, session: Self::Session);
}
