//! Read-only guard over another filesystem.

use std::sync::Arc;

use super::{Access, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Passes reads through and rejects every mutating operation.
pub struct ReadOnlyFileSystem {
    inner: Arc<dyn FileSystem>,
}

impl ReadOnlyFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self { inner }
    }
}

impl FileSystem for ReadOnlyFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        self.inner.exists(path)
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        self.inner.entities(path)
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        if access.is_writable() {
            return Err(FsError::ReadOnly);
        }
        self.inner.open_file(path, access)
    }

    fn create_file(&self, _path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        Err(FsError::ReadOnly)
    }

    fn create_directory(&self, _path: &VirtualPath) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn delete(&self, _path: &VirtualPath) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }

    fn dispose(&self) -> FsResult<()> {
        self.inner.dispose()
    }

    fn read_only(&self) -> bool {
        true
    }

    fn backend_kind(&self) -> &'static str {
        "read-only"
    }

    fn physical_path(&self, path: &VirtualPath) -> Option<std::path::PathBuf> {
        self.inner.physical_path(path)
    }
}
