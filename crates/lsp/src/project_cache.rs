use crate::error::{Error, Result};
use crate::host::Host;
use crate::privileged::PrivilegedContext;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opened projects keyed by root directory.
///
/// A cached handle is re-validated on every lookup and replaced when the host
/// has disposed it. Concurrent misses for one root wait on a per-root lock and
/// re-check the cache, so the host sees a single open.
pub struct ProjectCache<H: Host> {
    host: Arc<H>,
    context: Arc<PrivilegedContext>,
    projects: DashMap<PathBuf, H::Project>,
    open_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl<H: Host> ProjectCache<H> {
    pub fn new(host: Arc<H>, context: Arc<PrivilegedContext>) -> Self {
        Self {
            host,
            context,
            projects: DashMap::new(),
            open_locks: DashMap::new(),
        }
    }

    /// Returns a live project for `root`, opening it if needed.
    pub fn ensure_project(&self, root: &Path) -> Result<H::Project> {
        if let Some(project) = self.get(root).filter(|p| self.host.is_live(p)) {
            return Ok(project);
        }

        let lock = self
            .open_locks
            .entry(root.to_path_buf())
            .or_default()
            .clone();
        let _guard = lock.lock();

        // Another caller may have opened it while we waited.
        match self.get(root) {
            Some(project) if self.host.is_live(&project) => {
                debug!("project at {} was opened concurrently", root.display());
                return Ok(project);
            }
            Some(_) => info!("Cached project at {} was disposed, reopening.", root.display()),
            None => {}
        }

        let project = self.open(root)?;
        info!("Caching project that was found at {}.", root.display());
        self.projects.insert(root.to_path_buf(), project.clone());
        Ok(project)
    }

    /// The cached handle for `root`, live or not.
    pub fn get(&self, root: &Path) -> Option<H::Project> {
        self.projects.get(root).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    fn open(&self, root: &Path) -> Result<H::Project> {
        if !root.exists() {
            warn!("Project at {} doesn't exist.", root.display());
            return Err(Error::ProjectUnavailable {
                root: root.to_path_buf(),
                source: Box::new(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", root.display()),
                )),
            });
        }

        let host = self.host.clone();
        let path = root.to_path_buf();
        let opened = self
            .context
            .run(move || host.open_project(&path))
            .map_err(|e| Error::ProjectUnavailable {
                root: root.to_path_buf(),
                source: Box::new(e),
            })?;

        opened.map_err(|e| {
            warn!("Failed to open project at {}: {:#}", root.display(), e);
            Error::ProjectUnavailable {
                root: root.to_path_buf(),
                source: e.into(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LocalHost;
    use std::fs;
    use std::thread;

    fn project_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.iml"), "<module/>").unwrap();
        dir
    }

    fn cache() -> (Arc<LocalHost>, ProjectCache<LocalHost>) {
        let host = Arc::new(LocalHost::new("iml"));
        let context = Arc::new(PrivilegedContext::spawn().unwrap());
        (host.clone(), ProjectCache::new(host, context))
    }

    #[test]
    fn second_lookup_returns_cached_handle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = project_dir();
        let (host, cache) = cache();

        let first = cache.ensure_project(dir.path()).unwrap();
        let second = cache.ensure_project(dir.path()).unwrap();
        assert!(first.same_as(&second));
        assert_eq!(host.open_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn disposed_handle_is_replaced() {
        let dir = project_dir();
        let (host, cache) = cache();

        let first = cache.ensure_project(dir.path()).unwrap();
        host.dispose_project(&first);
        let second = cache.ensure_project(dir.path()).unwrap();

        assert!(!first.same_as(&second));
        assert!(host.is_live(&second));
        assert!(cache.get(dir.path()).unwrap().same_as(&second));
        assert_eq!(host.open_count(), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn reopening_a_disposed_project_logs_once() {
        let dir = project_dir();
        let (host, cache) = cache();
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let first = cache.ensure_project(dir.path()).unwrap();
            host.dispose_project(&first);
            cache.ensure_project(dir.path()).unwrap();
        });

        let output = String::from_utf8(log.0.lock().clone()).unwrap();
        assert_eq!(output.matches("was disposed, reopening").count(), 1);
        assert_eq!(host.open_count(), 2);
    }

    #[test]
    fn missing_root_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (host, cache) = cache();

        let err = cache.ensure_project(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::ProjectUnavailable { .. }));
        assert_eq!(host.open_count(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_open_is_unavailable() {
        // A directory without a marker cannot be opened by the local host.
        let dir = tempfile::tempdir().unwrap();
        let (_host, cache) = cache();

        let err = cache.ensure_project(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ProjectUnavailable { .. }));
        assert!(cache.get(dir.path()).is_none());
    }

    #[test]
    fn concurrent_misses_open_once() {
        let dir = project_dir();
        let (host, cache) = cache();
        let cache = Arc::new(cache);
        let root = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let root = root.clone();
                thread::spawn(move || cache.ensure_project(&root).unwrap())
            })
            .collect();
        let projects: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(host.open_count(), 1);
        assert!(projects.windows(2).all(|p| p[0].same_as(&p[1])));
    }
}
