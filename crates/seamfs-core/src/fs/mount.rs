//! Mount table for prefix routing.
//!
//! Routes every operation to the backend mounted at the longest matching
//! path prefix, rewriting the path relative to the mount point.

use std::sync::Arc;

use super::{Access, FileSystem, VfsFile};
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Routes filesystem operations to mounted backends.
///
/// Mounts are matched by longest prefix: with `/mnt/` and `/mnt/project/`
/// both mounted, `/mnt/project/src/main.rs` routes to `/mnt/project/`. A
/// mount table should include a root mount to make every lookup total;
/// paths with no matching mount fail with a not-found error.
pub struct FileSystemMounter {
    /// Mount points, sorted by descending path order so the first prefix
    /// match is the longest one.
    mounts: Vec<(VirtualPath, Arc<dyn FileSystem>)>,
}

impl Default for FileSystemMounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemMounter {
    /// Create an empty mount table.
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Mount a backend at the given directory path.
    ///
    /// An existing mount at the same path is replaced.
    pub fn mount(&mut self, path: VirtualPath, fs: Arc<dyn FileSystem>) -> FsResult<()> {
        if !path.is_directory() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        match self.mounts.binary_search_by(|(p, _)| path.cmp(p)) {
            Ok(i) => self.mounts[i] = (path, fs),
            Err(i) => self.mounts.insert(i, (path, fs)),
        }
        Ok(())
    }

    /// Unmount the backend at the given path.
    ///
    /// Returns `true` if a mount was removed.
    pub fn unmount(&mut self, path: &VirtualPath) -> bool {
        match self.mounts.binary_search_by(|(p, _)| path.cmp(p)) {
            Ok(i) => {
                self.mounts.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// The current mount points, most specific first.
    pub fn mounts(&self) -> impl Iterator<Item = &VirtualPath> {
        self.mounts.iter().map(|(p, _)| p)
    }

    /// Find the mount owning a path, and the path rewritten relative to
    /// that mount.
    fn resolve(&self, path: &VirtualPath) -> FsResult<(&Arc<dyn FileSystem>, VirtualPath)> {
        for (mount_path, fs) in &self.mounts {
            if mount_path == path || mount_path.is_parent_of(path) {
                return Ok((fs, path.remove_parent(mount_path)?));
            }
        }
        Err(FsError::NotFound(format!("no mount point for path: {path}")))
    }
}

impl FileSystem for FileSystemMounter {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        let (fs, relative) = self.resolve(path)?;
        fs.exists(&relative)
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        let (fs, relative) = self.resolve(path)?;
        let mount = path.remove_child(&relative)?;
        fs.entities(&relative)?
            .iter()
            .map(|p| mount.append_path(p))
            .collect()
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        let (fs, relative) = self.resolve(path)?;
        fs.open_file(&relative, access)
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        let (fs, relative) = self.resolve(path)?;
        fs.create_file(&relative)
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        let (fs, relative) = self.resolve(path)?;
        fs.create_directory(&relative)
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        let (fs, relative) = self.resolve(path)?;
        fs.delete(&relative)
    }

    fn dispose(&self) -> FsResult<()> {
        let mut first_err = None;
        for (_, fs) in &self.mounts {
            if let Err(e) = fs.dispose() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn backend_kind(&self) -> &'static str {
        "mount"
    }

    fn physical_path(&self, path: &VirtualPath) -> Option<std::path::PathBuf> {
        let (fs, relative) = self.resolve(path).ok()?;
        fs.physical_path(&relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn p(s: &str) -> VirtualPath {
        s.parse().unwrap()
    }

    fn mem_with(path: &str, data: &[u8]) -> Arc<dyn FileSystem> {
        let fs = MemoryFileSystem::new();
        fs.write(&p(path), data).unwrap();
        Arc::new(fs)
    }

    #[test]
    fn basic_mount() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/scratch/"), mem_with("/test.txt", b"hello")).unwrap();

        assert_eq!(mounter.read(&p("/scratch/test.txt")).unwrap(), b"hello");
    }

    #[test]
    fn multiple_mounts_route_independently() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/scratch/"), mem_with("/a.txt", b"scratch")).unwrap();
        mounter.mount(p("/data/"), mem_with("/b.txt", b"data")).unwrap();

        assert_eq!(mounter.read(&p("/scratch/a.txt")).unwrap(), b"scratch");
        assert_eq!(mounter.read(&p("/data/b.txt")).unwrap(), b"data");
    }

    #[test]
    fn longest_prefix_wins() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/mnt/"), mem_with("/outer.txt", b"outer")).unwrap();
        mounter.mount(p("/mnt/project/"), mem_with("/inner.txt", b"inner")).unwrap();

        assert_eq!(mounter.read(&p("/mnt/outer.txt")).unwrap(), b"outer");
        assert_eq!(mounter.read(&p("/mnt/project/inner.txt")).unwrap(), b"inner");
    }

    #[test]
    fn root_mount_catches_everything() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/"), mem_with("/at-root.txt", b"root file")).unwrap();
        assert_eq!(mounter.read(&p("/at-root.txt")).unwrap(), b"root file");
    }

    #[test]
    fn no_mount_is_not_found() {
        let mounter = FileSystemMounter::new();
        let err = mounter.read(&p("/nothing/here.txt")).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn entities_reprepend_the_mount_prefix() {
        let fs = MemoryFileSystem::new();
        fs.write(&p("/x.txt"), b"x").unwrap();
        fs.create_directory(&p("/sub/")).unwrap();

        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/data/"), Arc::new(fs)).unwrap();

        let entries = mounter.entities(&p("/data/")).unwrap();
        assert_eq!(entries, vec![p("/data/sub/"), p("/data/x.txt")]);
    }

    #[test]
    fn file_path_mount_rejected() {
        let mut mounter = FileSystemMounter::new();
        let err = mounter
            .mount(p("/file"), Arc::new(MemoryFileSystem::new()))
            .unwrap_err();
        assert!(matches!(err, FsError::NotDirectory(_)));
    }

    #[test]
    fn unmount_removes_routing() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/scratch/"), mem_with("/f", b"x")).unwrap();
        assert!(mounter.exists(&p("/scratch/f")).unwrap());

        assert!(mounter.unmount(&p("/scratch/")));
        assert!(!mounter.unmount(&p("/scratch/")));
        assert!(mounter.read(&p("/scratch/f")).is_err());
    }

    #[test]
    fn write_through_mounter() {
        let mut mounter = FileSystemMounter::new();
        mounter.mount(p("/scratch/"), Arc::new(MemoryFileSystem::new())).unwrap();

        mounter.write(&p("/scratch/new.txt"), b"created").unwrap();
        assert_eq!(mounter.read(&p("/scratch/new.txt")).unwrap(), b"created");
    }
}
