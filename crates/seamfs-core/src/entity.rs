//! A (backend, path) pair naming one concrete entity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::FsResult;
use crate::fs::{Access, FileSystem, VfsFile};
use crate::path::VirtualPath;

/// One entity inside one concrete backend.
///
/// Equality is identity of the backend instance (`Arc` pointer) plus value
/// equality of the path. This is what keys the archive usage registry: the
/// same archive file reached through the same backend is the same archive,
/// no matter how many callers reach it.
#[derive(Clone)]
pub struct Entity {
    fs: Arc<dyn FileSystem>,
    path: VirtualPath,
}

impl Entity {
    pub fn new(fs: Arc<dyn FileSystem>, path: VirtualPath) -> Self {
        Self { fs, path }
    }

    /// The backend the entity lives in.
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// The entity's path within its backend.
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// The entity's name, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.path.entity_name()
    }

    pub fn is_file(&self) -> bool {
        self.path.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.path.is_directory()
    }

    /// Open the entity for streaming (files only).
    pub fn open(&self, access: Access) -> FsResult<Box<dyn VfsFile>> {
        self.fs.open_file(&self.path, access)
    }

    fn fs_ptr(&self) -> *const () {
        Arc::as_ptr(&self.fs) as *const ()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.fs_ptr(), other.fs_ptr()) && self.path == other.path
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fs_ptr().hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("backend", &self.fs.backend_kind())
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use std::collections::HashSet;

    fn p(s: &str) -> VirtualPath {
        s.parse().unwrap()
    }

    #[test]
    fn equality_is_backend_identity_plus_path() {
        let a: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let b: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());

        let e1 = Entity::new(a.clone(), p("/f"));
        let e2 = Entity::new(a.clone(), p("/f"));
        let e3 = Entity::new(b, p("/f"));
        let e4 = Entity::new(a, p("/g"));

        assert_eq!(e1, e2);
        assert_ne!(e1, e3);
        assert_ne!(e1, e4);

        let mut set = HashSet::new();
        set.insert(e1);
        assert!(set.contains(&e2));
        assert!(!set.contains(&e3));
    }

    #[test]
    fn open_reads_through_the_backend() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.write(&p("/f"), b"bytes").unwrap();

        let entity = Entity::new(fs, p("/f"));
        assert!(entity.is_file());
        assert_eq!(entity.name(), Some("f"));

        let mut stream = entity.open(Access::Read).unwrap();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut stream, &mut buf).unwrap();
        assert_eq!(buf, b"bytes");
    }
}
