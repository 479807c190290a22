//! A host backed directly by the local filesystem.
//!
//! Projects are directories holding a marker file, documents are ropes seeded
//! from disk and shared per path, and editing sessions are lightweight editors
//! with a caret. The binary uses it, and so do the tests.

use super::Host;
use crate::config::Config;
use crate::core::rope::RopeExt;
use anyhow::{anyhow, bail, Context, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use ropey::Rope;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct LocalHost {
    marker_extension: String,
    documents: DashMap<PathBuf, LocalDocument>,
    opened: AtomicUsize,
    live_sessions: AtomicUsize,
}

#[derive(Debug)]
struct ProjectState {
    root: PathBuf,
    marker: PathBuf,
    disposed: AtomicBool,
}

#[derive(Clone, Debug)]
pub struct LocalProject(Arc<ProjectState>);

impl LocalProject {
    pub fn root(&self) -> &Path {
        &self.0.root
    }

    pub fn marker(&self) -> &Path {
        &self.0.marker
    }

    /// True when both handles refer to the same opened project.
    pub fn same_as(&self, other: &LocalProject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalView {
    path: PathBuf,
}

impl LocalView {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
struct DocumentState {
    path: PathBuf,
    content: RwLock<Rope>,
    detached: bool,
}

#[derive(Clone, Debug)]
pub struct LocalDocument(Arc<DocumentState>);

impl LocalDocument {
    fn new(path: PathBuf, text: &str, detached: bool) -> Self {
        Self(Arc::new(DocumentState {
            path,
            content: RwLock::new(Rope::from_str(text)),
            detached,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn text(&self) -> String {
        self.0.content.read().to_string()
    }

    /// Replaces the in-memory text without touching the file.
    pub fn set_text(&self, text: &str) {
        *self.0.content.write() = Rope::from_str(text);
    }

    /// True for sandbox copies, which are never registered with the host.
    pub fn is_detached(&self) -> bool {
        self.0.detached
    }

    pub fn same_as(&self, other: &LocalDocument) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An editor over a [`LocalDocument`]. The caret is a char offset.
#[derive(Debug)]
pub struct LocalEditor {
    document: LocalDocument,
    caret: usize,
}

impl LocalEditor {
    pub fn document(&self) -> &LocalDocument {
        &self.document
    }

    pub fn caret(&self) -> lsp_types::Position {
        self.document.0.content.read().char_to_lsp_position(self.caret)
    }

    pub fn move_caret(&mut self, position: lsp_types::Position) -> Result<()> {
        self.caret = self.document.0.content.read().lsp_position_to_char(position)?;
        Ok(())
    }

    /// Inserts at the caret and moves the caret past the inserted text.
    pub fn type_text(&mut self, text: &str) {
        let mut content = self.document.0.content.write();
        content.insert(self.caret, text);
        self.caret += text.chars().count();
    }

    pub fn replace(&mut self, range: lsp_types::Range, text: &str) -> Result<()> {
        let mut content = self.document.0.content.write();
        let range = content.lsp_range_to_char_range(range)?;
        let inserted = text.chars().count();
        content.remove(range.clone());
        if !text.is_empty() {
            content.insert(range.start, text);
        }
        if self.caret >= range.end {
            self.caret = self.caret - range.len() + inserted;
        } else if self.caret > range.start {
            self.caret = range.start + inserted;
        }
        Ok(())
    }

    pub fn set_text(&mut self, text: &str) {
        self.document.set_text(text);
        self.caret = self.caret.min(text.chars().count());
    }

    pub fn text(&self) -> String {
        self.document.text()
    }
}

impl LocalHost {
    pub fn new(marker_extension: &str) -> Self {
        Self {
            marker_extension: marker_extension.to_string(),
            documents: DashMap::new(),
            opened: AtomicUsize::new(0),
            live_sessions: AtomicUsize::new(0),
        }
    }

    /// A host recognising the project marker configured in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.marker_extension)
    }

    /// How many times a project has been opened.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Editing sessions created but not yet released.
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    /// Closes a project; later liveness checks report it as gone.
    pub fn dispose_project(&self, project: &LocalProject) {
        debug!("disposing project at {}", project.root().display());
        project.0.disposed.store(true, Ordering::SeqCst);
    }

    fn find_marker(&self, root: &Path) -> Result<PathBuf> {
        let entries =
            fs::read_dir(root).with_context(|| format!("reading {}", root.display()))?;
        entries
            .flatten()
            .map(|entry| entry.path())
            .find(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == self.marker_extension.as_str())
            })
            .ok_or_else(|| {
                anyhow!(
                    "no *.{} descriptor in {}",
                    self.marker_extension,
                    root.display()
                )
            })
    }
}

impl Host for LocalHost {
    type Project = LocalProject;
    type View = LocalView;
    type Document = LocalDocument;
    type Session = LocalEditor;

    fn open_project(&self, root: &Path) -> Result<LocalProject> {
        let marker = self.find_marker(root)?;
        fs::read_to_string(&marker)
            .with_context(|| format!("reading project descriptor {}", marker.display()))?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!("opened project {} ({})", root.display(), marker.display());
        Ok(LocalProject(Arc::new(ProjectState {
            root: root.to_path_buf(),
            marker,
            disposed: AtomicBool::new(false),
        })))
    }

    fn is_live(&self, project: &LocalProject) -> bool {
        !project.0.disposed.load(Ordering::SeqCst)
    }

    fn base_path(&self, project: &LocalProject) -> PathBuf {
        project.root().to_path_buf()
    }

    fn find_live_view(&self, path: &Path) -> Option<LocalView> {
        path.is_file().then(|| LocalView {
            path: path.to_path_buf(),
        })
    }

    fn refresh_view(&self, view: &LocalView) {
        // Reads always go to disk, there is no cached metadata to refresh.
        debug!("refresh {}", view.path.display());
    }

    fn get_or_create_document(
        &self,
        project: &LocalProject,
        view: &LocalView,
    ) -> Result<LocalDocument> {
        if !self.is_live(project) {
            bail!("project at {} is disposed", project.root().display());
        }
        let document = self
            .documents
            .entry(view.path.clone())
            .or_try_insert_with(|| {
                fs::read_to_string(&view.path)
                    .map(|text| LocalDocument::new(view.path.clone(), &text, false))
                    .with_context(|| format!("reading {}", view.path.display()))
            })?
            .clone();
        Ok(document)
    }

    fn reload_from_disk(&self, _project: &LocalProject, document: &LocalDocument) -> Result<()> {
        if document.is_detached() {
            bail!("{} is a detached copy", document.path().display());
        }
        let text = fs::read_to_string(document.path())
            .with_context(|| format!("reloading {}", document.path().display()))?;
        document.set_text(&text);
        Ok(())
    }

    fn document_text(&self, document: &LocalDocument) -> String {
        document.text()
    }

    fn document_path(&self, document: &LocalDocument) -> PathBuf {
        document.path().to_path_buf()
    }

    fn create_copy(&self, project: &LocalProject, document: &LocalDocument) -> Result<LocalDocument> {
        if !self.is_live(project) {
            bail!("project at {} is disposed", project.root().display());
        }
        let text = document.text();
        Ok(LocalDocument::new(document.path().to_path_buf(), &text, true))
    }

    fn discard_copy(&self, copy: LocalDocument) {
        debug!("discarding copy of {}", copy.path().display());
    }

    fn create_editing_session(
        &self,
        _project: &LocalProject,
        document: &LocalDocument,
        caret: lsp_types::Position,
    ) -> Result<LocalEditor> {
        let mut editor = LocalEditor {
            document: document.clone(),
            caret: 0,
        };
        editor.move_caret(caret)?;
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(editor)
    }

    fn release_editing_session(&self, session: LocalEditor) {
        debug!("releasing editor over {}", session.document.path().display());
        self.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
