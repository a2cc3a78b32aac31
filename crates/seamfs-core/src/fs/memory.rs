//! In-memory filesystem implementation.
//!
//! Useful for tests and ephemeral scratch space. All data is lost on drop.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, RwLock};

use super::{Access, DenyWrite, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Shared file body. Streams opened on the same file observe each other's
/// writes; a re-created file gets a fresh body while old streams keep the
/// previous one.
type FileBody = Arc<RwLock<Vec<u8>>>;

#[derive(Default)]
struct State {
    /// Directory path → immediate children (files and directories).
    directories: HashMap<VirtualPath, BTreeSet<VirtualPath>>,
    /// File path → contents.
    files: HashMap<VirtualPath, FileBody>,
}

/// In-memory filesystem.
///
/// Thread-safe via an internal `RwLock`. The root directory always exists.
pub struct MemoryFileSystem {
    state: RwLock<State>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut state = State::default();
        state.directories.insert(VirtualPath::root(), BTreeSet::new());
        Self {
            state: RwLock::new(state),
        }
    }

    fn read_state(&self) -> FsResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| FsError::Io("lock poisoned".to_string()))
    }

    fn write_state(&self) -> FsResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| FsError::Io("lock poisoned".to_string()))
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        let state = self.read_state()?;
        Ok(if path.is_directory() {
            state.directories.contains_key(path)
        } else {
            state.files.contains_key(path)
        })
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let state = self.read_state()?;
        match state.directories.get(path) {
            Some(children) => Ok(children.iter().cloned().collect()),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        if !path.is_file() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let state = self.read_state()?;
        let body = state
            .files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?
            .clone();
        let stream = MemoryStream::new(body);
        if access.is_writable() {
            Ok(Box::new(stream))
        } else {
            Ok(Box::new(DenyWrite(stream)))
        }
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        if !path.is_file() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let parent = path.parent()?;
        let mut state = self.write_state()?;
        if !state.directories.contains_key(&parent) {
            return Err(FsError::NotFound(parent.to_string()));
        }
        let body: FileBody = Arc::new(RwLock::new(Vec::new()));
        state.files.insert(path.clone(), body.clone());
        state
            .directories
            .get_mut(&parent)
            .expect("parent presence checked above")
            .insert(path.clone());
        Ok(Box::new(MemoryStream::new(body)))
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let parent = path.parent()?;
        let mut state = self.write_state()?;
        if state.directories.contains_key(path) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        match state.directories.get_mut(&parent) {
            Some(children) => {
                children.insert(path.clone());
            }
            None => return Err(FsError::NotFound(parent.to_string())),
        }
        state.directories.insert(path.clone(), BTreeSet::new());
        Ok(())
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        if path.is_root() {
            return Err(FsError::InvalidOperation(
                "the root directory cannot be deleted".to_string(),
            ));
        }
        let parent = path.parent()?;
        let mut state = self.write_state()?;
        if path.is_directory() {
            if !state.directories.contains_key(path) {
                return Err(FsError::NotFound(path.to_string()));
            }
            // Remove the whole subtree.
            state.directories.retain(|p, _| p != path && !path.is_parent_of(p));
            state.files.retain(|p, _| !path.is_parent_of(p));
        } else if state.files.remove(path).is_none() {
            return Err(FsError::NotFound(path.to_string()));
        }
        if let Some(children) = state.directories.get_mut(&parent) {
            children.remove(path);
        }
        Ok(())
    }

    fn backend_kind(&self) -> &'static str {
        "memory"
    }
}

/// Stream over a shared in-memory file body.
struct MemoryStream {
    body: FileBody,
    pos: u64,
}

impl MemoryStream {
    fn new(body: FileBody) -> Self {
        Self { body, pos: 0 }
    }

    fn body_len(&self) -> io::Result<u64> {
        Ok(self
            .body
            .read()
            .map_err(|_| io::Error::other("lock poisoned"))?
            .len() as u64)
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let body = self
            .body
            .read()
            .map_err(|_| io::Error::other("lock poisoned"))?;
        let start = (self.pos as usize).min(body.len());
        let count = buf.len().min(body.len() - start);
        buf[..count].copy_from_slice(&body[start..start + count]);
        self.pos += count as u64;
        Ok(count)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut body = self
            .body
            .write()
            .map_err(|_| io::Error::other("lock poisoned"))?;
        let start = self.pos as usize;
        if body.len() < start + buf.len() {
            body.resize(start + buf.len(), 0);
        }
        body[start..start + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => self.body_len()? as i64 + delta,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
