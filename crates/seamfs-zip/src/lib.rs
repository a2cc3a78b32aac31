//! Zip backend for seamfs.
//!
//! [`ZipFileSystem`] is a read-only leaf adapter over the `zip` crate;
//! [`ZipArchiveOpener`] plugs it into the seamless resolution engine so
//! that `.zip` files anywhere in a filesystem become browsable:
//!
//! ```no_run
//! use std::sync::Arc;
//! use seamfs_core::{Access, FileSystem, PhysicalFileSystem};
//! use seamfs_zip::seamless_zip;
//!
//! # fn main() -> seamfs_core::FsResult<()> {
//! let disk = Arc::new(PhysicalFileSystem::new("/srv/files")?);
//! let fs = seamless_zip(disk);
//! let stream = fs.open_file(&"/bundle.zip#/readme.txt".parse()?, Access::Read)?;
//! # let _ = stream;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use seamfs_core::{
    Access, ArchiveOpener, DenyWrite, Entity, FileSystem, FsError, FsResult,
    SeamlessArchiveFileSystem, VfsFile, VirtualPath, has_archive_marker,
};

/// Byte source a zip archive can be decoded from.
trait ZipSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ZipSource for T {}

fn zip_err(err: ZipError) -> FsError {
    match err {
        ZipError::Io(e) => e.into(),
        ZipError::FileNotFound => FsError::NotFound("no such entry in archive".to_string()),
        other => FsError::InvalidArgument(format!("invalid zip archive: {other}")),
    }
}

/// Read-only filesystem over a zip archive.
///
/// The entry index is built once at open time, with intermediate
/// directories synthesized for archives that carry no explicit directory
/// entries. Opening a file inflates the entry into memory; the `zip`
/// crate's entry readers borrow the archive, so an owned stream requires
/// a copy.
pub struct ZipFileSystem {
    archive: Mutex<Option<ZipArchive<Box<dyn ZipSource>>>>,
    /// Every path in the archive. Files map to their zip entry name,
    /// directories (explicit or synthesized) to `None`.
    index: BTreeMap<VirtualPath, Option<String>>,
}

impl ZipFileSystem {
    /// Decode an archive from any seekable byte source.
    pub fn open(source: impl Read + Seek + Send + 'static) -> FsResult<Self> {
        let archive = ZipArchive::new(Box::new(source) as Box<dyn ZipSource>).map_err(zip_err)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        let mut index: BTreeMap<VirtualPath, Option<String>> = BTreeMap::new();
        index.insert(VirtualPath::root(), None);
        for name in names {
            let path = VirtualPath::parse(&format!("/{name}")).map_err(FsError::from)?;
            // synthesize missing ancestors
            let mut ancestor = path.parent()?;
            while !ancestor.is_root() && !index.contains_key(&ancestor) {
                index.insert(ancestor.clone(), None);
                ancestor = ancestor.parent()?;
            }
            let entry = if path.is_file() { Some(name) } else { None };
            index.insert(path, entry);
        }
        debug!(entries = index.len() - 1, "opened zip archive");

        Ok(Self {
            archive: Mutex::new(Some(archive)),
            index,
        })
    }

    /// Decode an archive from a file on disk.
    pub fn open_path(path: &Path) -> FsResult<Self> {
        let file = std::fs::File::open(path).map_err(FsError::from)?;
        Self::open(file)
    }

    fn entry_bytes(&self, name: &str) -> FsResult<Vec<u8>> {
        let mut guard = self
            .archive
            .lock()
            .map_err(|_| FsError::Io("lock poisoned".to_string()))?;
        let archive = guard
            .as_mut()
            .ok_or_else(|| FsError::InvalidOperation("filesystem is disposed".to_string()))?;
        let mut entry = archive.by_name(name).map_err(zip_err)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(FsError::from)?;
        Ok(bytes)
    }
}

impl FileSystem for ZipFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        Ok(self.index.contains_key(path))
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        if !self.index.contains_key(path) {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok(self
            .index
            .keys()
            .filter(|p| p.parent().map(|parent| parent == *path).unwrap_or(false))
            .cloned()
            .collect())
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        if !path.is_file() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        if access.is_writable() {
            return Err(FsError::Unsupported(
                "zip backend is read-only".to_string(),
            ));
        }
        let entry = self
            .index
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?
            .as_ref()
            .ok_or_else(|| FsError::IsDirectory(path.to_string()))?;
        let bytes = self.entry_bytes(entry)?;
        Ok(Box::new(DenyWrite(Cursor::new(bytes))))
    }

    fn create_file(&self, _path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        Err(FsError::Unsupported("zip backend is read-only".to_string()))
    }

    fn create_directory(&self, _path: &VirtualPath) -> FsResult<()> {
        Err(FsError::Unsupported("zip backend is read-only".to_string()))
    }

    fn delete(&self, _path: &VirtualPath) -> FsResult<()> {
        Err(FsError::Unsupported("zip backend is read-only".to_string()))
    }

    fn dispose(&self) -> FsResult<()> {
        *self
            .archive
            .lock()
            .map_err(|_| FsError::Io("lock poisoned".to_string()))? = None;
        Ok(())
    }

    fn read_only(&self) -> bool {
        true
    }

    fn backend_kind(&self) -> &'static str {
        "zip"
    }
}

/// Seamless-resolution hooks for zip archives.
pub struct ZipArchiveOpener {
    extensions: Vec<String>,
}

impl Default for ZipArchiveOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchiveOpener {
    /// Recognizes `.zip` files.
    pub fn new() -> Self {
        Self {
            extensions: vec![".zip".to_string()],
        }
    }

    /// Recognize a custom extension set (each including the leading dot).
    pub fn with_extensions(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions.into_iter().collect(),
        }
    }
}

impl ArchiveOpener for ZipArchiveOpener {
    fn is_archive_file(&self, _fs: &dyn FileSystem, path: &VirtualPath) -> bool {
        // Archives nested inside archives are not advertised as browsable;
        // the engine still resolves them when addressed explicitly.
        path.is_file()
            && !has_archive_marker(path)
            && path
                .extension()
                .ok()
                .flatten()
                .map(|ext| self.extensions.iter().any(|known| known == ext))
                .unwrap_or(false)
    }

    fn open_archive(&self, archive: &Entity) -> FsResult<Arc<dyn FileSystem>> {
        let fs = match archive.filesystem().physical_path(archive.path()) {
            Some(location) => ZipFileSystem::open_path(&location)?,
            None => {
                let bytes = archive.filesystem().read(archive.path())?;
                ZipFileSystem::open(Cursor::new(bytes))?
            }
        };
        Ok(Arc::new(fs))
    }
}

/// Wrap a backend so zip files anywhere inside it resolve as nested
/// filesystems.
pub fn seamless_zip(inner: Arc<dyn FileSystem>) -> SeamlessArchiveFileSystem {
    SeamlessArchiveFileSystem::new(inner, Arc::new(ZipArchiveOpener::new()))
}
