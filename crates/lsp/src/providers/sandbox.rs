use crate::core::diff::{text_edits, ComparisonPolicy};
use crate::document::TextSnapshot;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::privileged::{panic_message, PrivilegedContext};
use anyhow::Context;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxOptions {
    /// Where the editor's caret sits when the transform starts.
    pub caret: lsp_types::Position,
    pub policy: ComparisonPolicy,
}

/// What a transform did to the sandbox copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutcome {
    /// Edits against the document as it was copied that reproduce the copy's
    /// final text.
    pub edits: Vec<lsp_types::TextEdit>,
    /// Set when the transform failed or panicked. The edits then describe
    /// whatever state the copy was left in.
    pub transform_error: Option<String>,
}

impl SandboxOutcome {
    pub fn is_clean(&self) -> bool {
        self.transform_error.is_none()
    }
}

/// Releases the editing session on every exit path, unwinding included.
struct SessionGuard<'a, H: Host> {
    host: &'a H,
    session: Option<H::Session>,
}

impl<H: Host> Drop for SessionGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.host.release_editing_session(session);
        }
    }
}

/// Runs `transform` against a throwaway copy of `document` and reports the
/// resulting change as edits against the original.
///
/// The original document is never modified. Transform failures are logged and
/// reported through [`SandboxOutcome::transform_error`]; only host-level
/// failures (copying, opening or dispatching the session) are errors.
pub fn observe_edits<H, F>(
    host: &Arc<H>,
    context: &PrivilegedContext,
    project: &H::Project,
    document: &H::Document,
    options: SandboxOptions,
    transform: F,
) -> Result<SandboxOutcome>
where
    H: Host,
    F: FnOnce(&mut H::Session) -> anyhow::Result<()> + Send + 'static,
{
    let path = host.document_path(document);

    let job_host = host.clone();
    let job_project = project.clone();
    let job_document = document.clone();
    let captured = context
        .run(move || {
            edit_copy(
                job_host.as_ref(),
                &job_project,
                &job_document,
                options.caret,
                transform,
            )
        })
        .map_err(|e| Error::Sandbox {
            path: path.clone(),
            source: Box::new(e),
        })?;

    let (before, after, transform_error) = captured.map_err(|e| {
        error!("Sandbox failure for {}: {:?}", path.display(), e);
        Error::Sandbox {
            path: path.clone(),
            source: e.into(),
        }
    })?;

    let before = TextSnapshot::new(&before, path.clone());
    let after = TextSnapshot::new(&after, path);
    let edits = text_edits(&before, &after, options.policy);
    debug!("sandbox produced {} edit(s)", edits.len());

    Ok(SandboxOutcome {
        edits,
        transform_error,
    })
}

type Captured = (String, String, Option<String>);

fn edit_copy<H, F>(
    host: &H,
    project: &H::Project,
    document: &H::Document,
    caret: lsp_types::Position,
    transform: F,
) -> anyhow::Result<Captured>
where
    H: Host,
    F: FnOnce(&mut H::Session) -> anyhow::Result<()>,
{
    let copy = host
        .create_copy(project, document)
        .context("creating sandbox copy")?;
    // Taken from the copy so later writes to the original cannot leak into the diff.
    let before = host.document_text(&copy);

    let transform_error = match run_transform(host, project, &copy, caret, transform) {
        Ok(transform_error) => transform_error,
        Err(e) => {
            host.discard_copy(copy);
            return Err(e);
        }
    };

    let after = host.document_text(&copy);
    host.discard_copy(copy);
    Ok((before, after, transform_error))
}

fn run_transform<H, F>(
    host: &H,
    project: &H::Project,
    copy: &H::Document,
    caret: lsp_types::Position,
    transform: F,
) -> anyhow::Result<Option<String>>
where
    H: Host,
    F: FnOnce(&mut H::Session) -> anyhow::Result<()>,
{
    let session = host
        .create_editing_session(project, copy, caret)
        .context("creating editing session")?;
    let mut guard = SessionGuard {
        host,
        session: Some(session),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match guard.session.as_mut() {
        Some(session) => transform(session),
        None => Ok(()),
    }));
    drop(guard);

    Ok(match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!("Exception during editor callback: {:?}", e);
            Some(format!("{e:#}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Editor callback panicked: {}", message);
            Some(message)
        }
    })
}
