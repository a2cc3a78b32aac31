//! Physical-disk filesystem backend.
//!
//! Maps virtual paths onto a real directory tree rooted at a fixed
//! location. Paths cannot escape the root.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Access, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::{SEPARATOR, VirtualPath};

/// Filesystem backed by a real directory.
#[derive(Debug, Clone)]
pub struct PhysicalFileSystem {
    root: PathBuf,
}

impl PhysicalFileSystem {
    /// Create a physical filesystem rooted at the given directory.
    ///
    /// The directory must exist; the root is canonicalized so that escape
    /// checks compare resolved paths.
    pub fn new(root: impl AsRef<Path>) -> FsResult<Self> {
        let root = root.as_ref().canonicalize().map_err(FsError::from)?;
        if !root.is_dir() {
            return Err(FsError::NotDirectory(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// The physical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a virtual path to its on-disk location.
    ///
    /// Rejects `.` and `..` segments so a path can never escape the root.
    fn to_physical(&self, path: &VirtualPath) -> FsResult<PathBuf> {
        if path
            .as_str()
            .split(SEPARATOR)
            .any(|segment| segment == "." || segment == "..")
        {
            return Err(FsError::InvalidArgument(format!(
                "path escapes the physical root: {path}"
            )));
        }
        Ok(self.root.join(&path.as_str()[1..]))
    }
}

impl FileSystem for PhysicalFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        let physical = self.to_physical(path)?;
        Ok(if path.is_file() {
            physical.is_file()
        } else {
            physical.is_dir()
        })
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let physical = self.to_physical(path)?;
        let mut out = Vec::new();
        for entry in fs::read_dir(&physical).map_err(FsError::from)? {
            let entry = entry.map_err(FsError::from)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let child = if entry.file_type().map_err(FsError::from)?.is_dir() {
                path.append_directory(&name)?
            } else {
                path.append_file(&name)?
            };
            out.push(child);
        }
        out.sort();
        Ok(out)
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        if !path.is_file() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let physical = self.to_physical(path)?;
        let file = fs::OpenOptions::new()
            .read(access.is_readable())
            .write(access.is_writable())
            .open(&physical)
            .map_err(FsError::from)?;
        Ok(Box::new(file))
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        if !path.is_file() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let physical = self.to_physical(path)?;
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&physical)
            .map_err(FsError::from)?;
        Ok(Box::new(file))
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let physical = self.to_physical(path)?;
        fs::create_dir_all(&physical).map_err(FsError::from)
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        let physical = self.to_physical(path)?;
        if path.is_file() {
            fs::remove_file(&physical).map_err(FsError::from)
        } else {
            fs::remove_dir_all(&physical).map_err(FsError::from)
        }
    }

    fn backend_kind(&self) -> &'static str {
        "physical"
    }

    fn physical_path(&self, path: &VirtualPath) -> Option<PathBuf> {
        self.to_physical(path).ok()
    }
}
