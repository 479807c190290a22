use crate::config::Config;
use crate::error::Result;
use crate::host::{Host, LocalHost};
use crate::privileged::PrivilegedContext;
use crate::project_cache::ProjectCache;
use crate::providers::{document, sandbox};
use crate::resolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub use crate::providers::sandbox::{SandboxOptions, SandboxOutcome};

/// The caller-facing entry point: resolves URIs to projects and documents and
/// turns editor actions into LSP edits.
///
/// One `Session` is meant to live for the whole process; it owns the project
/// cache and the privileged context every host mutation is dispatched to.
pub struct Session<H: Host> {
    host: Arc<H>,
    config: Config,
    context: Arc<PrivilegedContext>,
    projects: ProjectCache<H>,
}

impl<H: Host> Session<H> {
    /// Create a new [`Session`] with its own privileged context thread.
    pub fn new(host: Arc<H>, config: Config) -> std::io::Result<Self> {
        let context = Arc::new(PrivilegedContext::spawn()?);
        Ok(Self::with_context(host, config, context))
    }

    /// Create a [`Session`] that shares an existing privileged context.
    pub fn with_context(host: Arc<H>, config: Config, context: Arc<PrivilegedContext>) -> Self {
        let projects = ProjectCache::new(host.clone(), context.clone());
        Self {
            host,
            config,
            context,
            projects,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<PrivilegedContext> {
        &self.context
    }

    pub fn projects(&self) -> &ProjectCache<H> {
        &self.projects
    }

    /// Finds the project owning `uri` and the resource's path relative to it.
    pub fn resolve(&self, uri: &str) -> Result<(H::Project, PathBuf)> {
        let resolved = resolver::resolve(uri, &self.config.marker_extension)?;
        let project = self.projects.ensure_project(&resolved.project_root)?;
        Ok((project, resolved.relative_path))
    }

    /// Resolves `uri` all the way to its live document.
    pub fn resolve_document(&self, uri: &str) -> Result<(H::Project, H::Document)> {
        let (project, relative_path) = self.resolve(uri)?;
        let document = self.get_project_document(&project, &relative_path)?;
        Ok((project, document))
    }

    pub fn get_document(&self, uri: &str) -> Result<H::Document> {
        self.resolve_document(uri).map(|(_, document)| document)
    }

    pub fn get_project_document(
        &self,
        project: &H::Project,
        relative_path: &Path,
    ) -> Result<H::Document> {
        document::get_document(&self.host, &self.context, project, relative_path)
    }

    /// Forces the document behind `uri` to pick up what is on disk now.
    pub fn reload_document_at_uri(&self, uri: &str) -> Result<()> {
        debug!("reload requested for {}", uri);
        let (project, document) = self.resolve_document(uri)?;
        document::reload_document(&self.host, &self.context, &project, &document)
    }

    /// Edits that would reproduce what `transform` does to `document`, computed
    /// on a throwaway copy with the configured comparison policy and the caret
    /// at the start of the document.
    pub fn difference_from_action<F>(
        &self,
        project: &H::Project,
        document: &H::Document,
        transform: F,
    ) -> Result<SandboxOutcome>
    where
        F: FnOnce(&mut H::Session) -> anyhow::Result<()> + Send + 'static,
    {
        let options = SandboxOptions {
            policy: self.config.comparison_policy,
            ..Default::default()
        };
        self.difference_from_action_with(project, document, options, transform)
    }

    pub fn difference_from_action_with<F>(
        &self,
        project: &H::Project,
        document: &H::Document,
        options: SandboxOptions,
        transform: F,
    ) -> Result<SandboxOutcome>
    where
        F: FnOnce(&mut H::Session) -> anyhow::Result<()> + Send + 'static,
    {
        sandbox::observe_edits(
            &self.host,
            &self.context,
            project,
            document,
            options,
            transform,
        )
    }
}

impl Session<LocalHost> {
    /// A filesystem-backed session whose host recognises the same project
    /// marker the resolver looks for.
    pub fn local(config: Config) -> std::io::Result<Self> {
        let host = Arc::new(LocalHost::from_config(&config));
        Self::new(host, config)
    }
}
