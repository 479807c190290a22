use crate::error::{Error, Result};
use crate::host::Host;
use crate::privileged::PrivilegedContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Returns the live document for `relative_path` inside `project`, asking the
/// host to materialise one from disk if none exists yet.
pub fn get_document<H: Host>(
    host: &Arc<H>,
    context: &PrivilegedContext,
    project: &H::Project,
    relative_path: &Path,
) -> Result<H::Document> {
    let path = host.base_path(project).join(relative_path);
    let view = find_view(host.as_ref(), &path)?;

    let job_host = host.clone();
    let job_project = project.clone();
    let created = context
        .run(move || job_host.get_or_create_document(&job_project, &view))
        .map_err(|e| Error::DocumentUnavailable {
            path: path.clone(),
            source: Box::new(e),
        })?;

    created.map_err(|e| {
        warn!("Unable to find document for {}: {:#}", path.display(), e);
        Error::DocumentUnavailable {
            path,
            source: e.into(),
        }
    })
}

/// Forces `document` to resynchronise from disk.
pub fn reload_document<H: Host>(
    host: &Arc<H>,
    context: &PrivilegedContext,
    project: &H::Project,
    document: &H::Document,
) -> Result<()> {
    let path = host.document_path(document);
    debug!("Reloading document at {}", path.display());

    let job_host = host.clone();
    let job_project = project.clone();
    let job_document = document.clone();
    context
        .run(move || job_host.reload_from_disk(&job_project, &job_document))
        .map_err(|e| Error::DocumentUnavailable {
            path: path.clone(),
            source: Box::new(e),
        })?
        .map_err(|e| Error::DocumentUnavailable {
            path,
            source: e.into(),
        })
}

/// The host's view of `path`, refreshed so external writes are visible.
fn find_view<H: Host>(host: &H, path: &Path) -> Result<H::View> {
    if !path.exists() {
        return Err(not_found(path));
    }
    let view = host.find_live_view(path).ok_or_else(|| {
        warn!("Couldn't locate a live view of {}", path.display());
        not_found(path)
    })?;
    host.refresh_view(&view);
    Ok(view)
}

fn not_found(path: &Path) -> Error {
    Error::ResourceNotFound {
        path: PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        host: Arc<LocalHost>,
        context: PrivilegedContext,
        project: <LocalHost as Host>::Project,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.iml"), "<module/>").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/Main.java"), "class Main {}\n").unwrap();
        let host = Arc::new(LocalHost::new("iml"));
        let project = host.open_project(dir.path()).unwrap();
        Fixture {
            dir,
            host,
            context: PrivilegedContext::spawn().unwrap(),
            project,
        }
    }

    #[test]
    fn materialises_document_from_disk() {
        let f = fixture();
        let document =
            get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java")).unwrap();
        assert_eq!(f.host.document_text(&document), "class Main {}\n");
        assert_eq!(
            f.host.document_path(&document),
            f.dir.path().join("src/Main.java")
        );
    }

    #[test]
    fn returns_the_same_live_buffer() {
        let f = fixture();
        let first =
            get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java")).unwrap();
        first.set_text("edited in memory");
        let second =
            get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java")).unwrap();
        assert!(first.same_as(&second));
        assert_eq!(second.text(), "edited in memory");
    }

    #[test]
    fn missing_file_is_resource_not_found() {
        let f = fixture();
        let err = get_document(&f.host, &f.context, &f.project, Path::new("src/Nope.java"))
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn directory_has_no_view() {
        let f = fixture();
        let err =
            get_document(&f.host, &f.context, &f.project, Path::new("src")).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn disposed_project_is_document_unavailable() {
        let f = fixture();
        f.host.dispose_project(&f.project);
        let err = get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java"))
            .unwrap_err();
        assert!(matches!(err, Error::DocumentUnavailable { .. }));
    }

    #[test]
    fn reload_observes_external_write() {
        let f = fixture();
        let document =
            get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java")).unwrap();
        fs::write(f.dir.path().join("src/Main.java"), "class Main { int x; }\n").unwrap();

        reload_document(&f.host, &f.context, &f.project, &document).unwrap();
        assert_eq!(document.text(), "class Main { int x; }\n");
    }

    #[test]
    fn reload_of_deleted_file_fails() {
        let f = fixture();
        let document =
            get_document(&f.host, &f.context, &f.project, Path::new("src/Main.java")).unwrap();
        fs::remove_file(f.dir.path().join("src/Main.java")).unwrap();

        let err = reload_document(&f.host, &f.context, &f.project, &document).unwrap_err();
        assert!(matches!(err, Error::DocumentUnavailable { .. }));
    }
}
