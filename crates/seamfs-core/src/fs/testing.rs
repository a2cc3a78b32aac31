//! Test fixtures: an instrumented backend and a fake archive opener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Access, ArchiveOpener, FileSystem, MemoryFileSystem, VfsFile, has_archive_marker};
use crate::entity::Entity;
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Delegating backend that records its disposal in a shared log.
pub(crate) struct DisposeTracking {
    inner: Arc<dyn FileSystem>,
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl DisposeTracking {
    pub(crate) fn new(inner: Arc<dyn FileSystem>, label: String, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { inner, label, log }
    }
}

impl FileSystem for DisposeTracking {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        self.inner.exists(path)
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        self.inner.entities(path)
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        self.inner.open_file(path, access)
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        self.inner.create_file(path)
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        self.inner.create_directory(path)
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        self.inner.delete(path)
    }

    fn dispose(&self) -> FsResult<()> {
        self.log
            .lock()
            .expect("dispose log lock poisoned")
            .push(self.label.clone());
        self.inner.dispose()
    }

    fn backend_kind(&self) -> &'static str {
        self.inner.backend_kind()
    }
}

/// Opener whose every archive decodes to the same in-memory template:
/// `/inner.txt` plus a nested archive file `/nested.zip`. Counts opens
/// and logs disposals in order.
pub(crate) struct FakeArchiveOpener {
    opened: AtomicUsize,
    dispose_log: Arc<Mutex<Vec<String>>>,
}

impl FakeArchiveOpener {
    pub(crate) fn new() -> Self {
        Self {
            opened: AtomicUsize::new(0),
            dispose_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of archive backends constructed so far.
    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of archive backends disposed so far.
    pub(crate) fn disposed(&self) -> usize {
        self.dispose_order().len()
    }

    /// Archive paths in the order their backends were disposed.
    pub(crate) fn dispose_order(&self) -> Vec<String> {
        self.dispose_log
            .lock()
            .expect("dispose log lock poisoned")
            .clone()
    }
}

impl ArchiveOpener for FakeArchiveOpener {
    fn is_archive_file(&self, _fs: &dyn FileSystem, path: &VirtualPath) -> bool {
        path.is_file()
            && path.extension().ok().flatten() == Some(".zip")
            && !has_archive_marker(path)
    }

    fn open_archive(&self, archive: &Entity) -> FsResult<Arc<dyn FileSystem>> {
        if !archive.filesystem().exists(archive.path())? {
            return Err(FsError::NotFound(archive.path().to_string()));
        }
        let fs = MemoryFileSystem::new();
        fs.write(&"/inner.txt".parse().expect("valid path"), b"inner contents")?;
        fs.write(
            &"/nested.zip".parse().expect("valid path"),
            b"nested archive bytes",
        )?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(DisposeTracking::new(
            Arc::new(fs),
            archive.path().to_string(),
            self.dispose_log.clone(),
        )))
    }
}
