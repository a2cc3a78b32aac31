//! Sub-rooted view of another filesystem (chroot).

use std::sync::Arc;

use super::{Access, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Exposes a subdirectory of another backend as a filesystem root.
///
/// Every path is prefixed with the fixed root on the way in and stripped
/// on the way out; everything else delegates verbatim.
pub struct SubFileSystem {
    inner: Arc<dyn FileSystem>,
    root: VirtualPath,
}

impl SubFileSystem {
    /// Create a view rooted at `root` within `inner`.
    pub fn new(inner: Arc<dyn FileSystem>, root: VirtualPath) -> FsResult<Self> {
        if !root.is_directory() {
            return Err(FsError::NotDirectory(root.to_string()));
        }
        Ok(Self { inner, root })
    }

    /// The fixed root within the inner backend.
    pub fn root(&self) -> &VirtualPath {
        &self.root
    }

    fn append_root(&self, path: &VirtualPath) -> FsResult<VirtualPath> {
        self.root.append_path(path)
    }
}

impl FileSystem for SubFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        self.inner.exists(&self.append_root(path)?)
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        self.inner
            .entities(&self.append_root(path)?)?
            .iter()
            .map(|p| p.remove_parent(&self.root))
            .collect()
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        self.inner.open_file(&self.append_root(path)?, access)
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        self.inner.create_file(&self.append_root(path)?)
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        self.inner.create_directory(&self.append_root(path)?)
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        self.inner.delete(&self.append_root(path)?)
    }

    fn dispose(&self) -> FsResult<()> {
        self.inner.dispose()
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn backend_kind(&self) -> &'static str {
        "sub"
    }

    fn physical_path(&self, path: &VirtualPath) -> Option<std::path::PathBuf> {
        self.inner.physical_path(&self.append_root(path).ok()?)
    }
}
