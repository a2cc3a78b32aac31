//! Priority-ordered union of several backends.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Access, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Presents an ordered list of backends as one filesystem.
///
/// Reads resolve to the first backend reporting existence; listings are
/// the deduplicated union across all backends, in ordinal path order.
/// When two backends expose the same path, the first backend wins. A file
/// and a directory with the same name never collide: the trailing
/// separator keeps their paths distinct, so both entries are listed.
pub struct MergedFileSystem {
    backends: Vec<Arc<dyn FileSystem>>,
}

impl MergedFileSystem {
    /// Merge the given backends, highest priority first.
    pub fn new(backends: impl IntoIterator<Item = Arc<dyn FileSystem>>) -> Self {
        Self {
            backends: backends.into_iter().collect(),
        }
    }

    /// The first backend containing the given path, if any.
    fn first_containing(&self, path: &VirtualPath) -> FsResult<Option<&Arc<dyn FileSystem>>> {
        for fs in &self.backends {
            if fs.exists(path)? {
                return Ok(Some(fs));
            }
        }
        Ok(None)
    }
}

impl FileSystem for MergedFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        Ok(self.first_containing(path)?.is_some())
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let mut found = false;
        let mut union = BTreeSet::new();
        for fs in &self.backends {
            if fs.exists(path)? {
                found = true;
                union.extend(fs.entities(path)?);
            }
        }
        if !found {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(union.into_iter().collect())
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        match self.first_containing(path)? {
            Some(fs) => fs.open_file(path, access),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        if let Some(fs) = self.first_containing(path)? {
            return fs.create_file(path);
        }
        match self.backends.first() {
            Some(fs) => fs.create_file(path),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        if self.exists(path)? {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let parent = path.parent()?;
        for fs in &self.backends {
            if !fs.read_only() && fs.exists(&parent)? {
                return fs.create_directory(path);
            }
        }
        match self.backends.first() {
            Some(fs) => fs.create_directory(path),
            None => Err(FsError::NotFound(parent.to_string())),
        }
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        let mut deleted = false;
        for fs in &self.backends {
            if fs.exists(path)? {
                fs.delete(path)?;
                deleted = true;
            }
        }
        if deleted {
            Ok(())
        } else {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    fn dispose(&self) -> FsResult<()> {
        let mut first_err = None;
        for fs in &self.backends {
            if let Err(e) = fs.dispose() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read_only(&self) -> bool {
        self.backends.iter().all(|fs| fs.read_only())
    }

    fn backend_kind(&self) -> &'static str {
        "merge"
    }
}
