//! Filesystem backends and composing layers.
//!
//! Everything speaks the same [`FileSystem`] contract, so backends compose
//! freely:
//!
//! ```text
//! SeamlessArchiveFileSystem          # archive paths resolve transparently
//! └── FileSystemMounter              # prefix routing
//!     ├── /mem/  → MemoryFileSystem
//!     ├── /disk/ → PhysicalFileSystem
//!     └── /ro/   → ReadOnlyFileSystem(MergedFileSystem(...))
//! ```
//!
//! - **Leaves**: [`MemoryFileSystem`], [`PhysicalFileSystem`] (archive
//!   decoders live in adapter crates).
//! - **Layers**: [`FileSystemMounter`], [`MergedFileSystem`],
//!   [`SubFileSystem`], [`ReadOnlyFileSystem`].
//! - **Engine**: [`SeamlessArchiveFileSystem`] rewrites marker-bearing
//!   paths into (archive backend, inner path) pairs and reference-counts
//!   the lazily opened archive backends.

mod memory;
mod merge;
mod mount;
mod physical;
mod readonly;
mod seamless;
mod stream;
mod subfs;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryFileSystem;
pub use merge::MergedFileSystem;
pub use mount::FileSystemMounter;
pub use physical::PhysicalFileSystem;
pub use readonly::ReadOnlyFileSystem;
pub use seamless::{
    ARCHIVE_MARKER, ArchiveOpener, FileSystemReference, MAX_ARCHIVE_DEPTH,
    SeamlessArchiveFileSystem, has_archive_marker,
};
pub use stream::ReferenceStream;
pub use subfs::SubFileSystem;

use std::io::{self, Read, Seek, Write};
use std::path::PathBuf;

use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Access mode for [`FileSystem::open_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    /// True if this mode permits reading.
    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    /// True if this mode permits writing.
    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// A seekable byte stream handed out by a backend.
pub trait VfsFile: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send + ?Sized> VfsFile for T {}

/// Abstract filesystem interface.
///
/// All paths are absolute [`VirtualPath`]s interpreted against the
/// backend's own root. Composing layers implement the same trait, so the
/// contract is closed under nesting.
pub trait FileSystem: Send + Sync {
    /// Check whether an entity exists.
    fn exists(&self, path: &VirtualPath) -> FsResult<bool>;

    /// List the immediate children of a directory, as full paths,
    /// in ordinal path order.
    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>>;

    /// Open an existing file.
    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>>;

    /// Create a file, truncating it if it already exists.
    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>>;

    /// Create a directory. The parent must already exist; see
    /// [`create_directory_recursive`](Self::create_directory_recursive).
    fn create_directory(&self, path: &VirtualPath) -> FsResult<()>;

    /// Delete an entity. Directories are deleted recursively.
    fn delete(&self, path: &VirtualPath) -> FsResult<()>;

    /// Release all resources held by the backend. Idempotent.
    fn dispose(&self) -> FsResult<()> {
        Ok(())
    }

    /// True if every mutating operation fails.
    fn read_only(&self) -> bool {
        false
    }

    /// Declared backend kind tag, e.g. `"physical"` or `"memory"`.
    ///
    /// Keys the transfer strategy registry; composing layers report their
    /// own kind, not their children's.
    fn backend_kind(&self) -> &'static str;

    /// The on-disk location of a path, for backends backed by a real
    /// filesystem. Virtual backends return `None`.
    fn physical_path(&self, path: &VirtualPath) -> Option<PathBuf> {
        let _ = path;
        None
    }

    /// Read the entire contents of a file.
    fn read(&self, path: &VirtualPath) -> FsResult<Vec<u8>> {
        let mut stream = self.open_file(path, Access::Read)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).map_err(FsError::from)?;
        Ok(buf)
    }

    /// Read a file as UTF-8 text.
    fn read_to_string(&self, path: &VirtualPath) -> FsResult<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|e| FsError::InvalidOperation(format!("file is not valid UTF-8: {e}")))
    }

    /// Write a file from a byte slice, creating or truncating it.
    fn write(&self, path: &VirtualPath, data: &[u8]) -> FsResult<()> {
        let mut stream = self.create_file(path)?;
        stream.write_all(data).map_err(FsError::from)?;
        stream.flush().map_err(FsError::from)?;
        Ok(())
    }

    /// Create a directory and any missing ancestors.
    fn create_directory_recursive(&self, path: &VirtualPath) -> FsResult<()> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let mut current = VirtualPath::root();
        for segment in path.directory_segments() {
            current = current.append_directory(segment)?;
            if !self.exists(&current)? {
                self.create_directory(&current)?;
            }
        }
        Ok(())
    }

    /// All entities beneath a directory, recursively.
    fn entities_recursive(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let mut out = Vec::new();
        let mut pending = std::collections::VecDeque::new();
        pending.push_back(path.clone());
        while let Some(dir) = pending.pop_front() {
            for entity in self.entities(&dir)? {
                if entity.is_directory() {
                    pending.push_back(entity.clone());
                }
                out.push(entity);
            }
        }
        Ok(out)
    }
}

/// Adapter that rejects writes on a read-only source stream.
pub struct DenyWrite<R>(pub R);

impl<R: Read> Read for DenyWrite<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R> Write for DenyWrite<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream is read-only",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Seek> Seek for DenyWrite<R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}
