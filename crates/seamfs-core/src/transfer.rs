//! Copy/move strategies between backends.
//!
//! Strategies are keyed by the *declared* kind tags of the two backends
//! ([`FileSystem::backend_kind`]), with a stream-copy fallback for every
//! unregistered pair. A physical-to-physical fast path ships by default.

use std::collections::HashMap;
use std::io;

use crate::error::{FsError, FsResult};
use crate::fs::{Access, FileSystem};
use crate::path::VirtualPath;

/// A copy strategy for one (source kind, destination kind) pair.
pub trait EntityCopier: Send + Sync {
    fn copy(
        &self,
        src: &dyn FileSystem,
        src_path: &VirtualPath,
        dst: &dyn FileSystem,
        dst_path: &VirtualPath,
    ) -> FsResult<()>;
}

/// Strategy table for copying and moving entities across backends.
pub struct TransferRegistry {
    copiers: HashMap<(&'static str, &'static str), Box<dyn EntityCopier>>,
    fallback: Box<dyn EntityCopier>,
}

impl Default for TransferRegistry {
    fn default() -> Self {
        let mut registry = Self {
            copiers: HashMap::new(),
            fallback: Box::new(StreamCopier),
        };
        registry.register("physical", "physical", Box::new(PhysicalCopier));
        registry
    }
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy for a kind pair, replacing any previous one.
    pub fn register(
        &mut self,
        src_kind: &'static str,
        dst_kind: &'static str,
        copier: Box<dyn EntityCopier>,
    ) {
        self.copiers.insert((src_kind, dst_kind), copier);
    }

    /// Copy a file or (recursively) a directory.
    pub fn copy(
        &self,
        src: &dyn FileSystem,
        src_path: &VirtualPath,
        dst: &dyn FileSystem,
        dst_path: &VirtualPath,
    ) -> FsResult<()> {
        if src_path.is_directory() != dst_path.is_directory() {
            return Err(FsError::InvalidArgument(format!(
                "cannot copy {src_path} onto {dst_path}"
            )));
        }
        self.copier_for(src, dst).copy(src, src_path, dst, dst_path)
    }

    /// Move = copy with the selected strategy, then delete the source.
    pub fn move_entity(
        &self,
        src: &dyn FileSystem,
        src_path: &VirtualPath,
        dst: &dyn FileSystem,
        dst_path: &VirtualPath,
    ) -> FsResult<()> {
        self.copy(src, src_path, dst, dst_path)?;
        src.delete(src_path)
    }

    fn copier_for(&self, src: &dyn FileSystem, dst: &dyn FileSystem) -> &dyn EntityCopier {
        self.copiers
            .get(&(src.backend_kind(), dst.backend_kind()))
            .map(|c| c.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

/// Byte-stream copy through the two backends' contracts. Works for any
/// pair of backends.
pub struct StreamCopier;

impl EntityCopier for StreamCopier {
    fn copy(
        &self,
        src: &dyn FileSystem,
        src_path: &VirtualPath,
        dst: &dyn FileSystem,
        dst_path: &VirtualPath,
    ) -> FsResult<()> {
        if src_path.is_file() {
            let mut input = src.open_file(src_path, Access::Read)?;
            let mut output = dst.create_file(dst_path)?;
            io::copy(&mut input, &mut output).map_err(FsError::from)?;
            return Ok(());
        }
        if !dst.exists(dst_path)? {
            dst.create_directory_recursive(dst_path)?;
        }
        for child in src.entities(src_path)? {
            let name = child.entity_name().expect("listed entity has a name");
            let target = if child.is_directory() {
                dst_path.append_directory(name)?
            } else {
                dst_path.append_file(name)?
            };
            self.copy(src, &child, dst, &target)?;
        }
        Ok(())
    }
}

/// Disk-to-disk fast path using `std::fs::copy`. Falls back to streaming
/// when either side has no physical location or for directories.
pub struct PhysicalCopier;

impl EntityCopier for PhysicalCopier {
    fn copy(
        &self,
        src: &dyn FileSystem,
        src_path: &VirtualPath,
        dst: &dyn FileSystem,
        dst_path: &VirtualPath,
    ) -> FsResult<()> {
        if src_path.is_file() {
            if let (Some(from), Some(to)) =
                (src.physical_path(src_path), dst.physical_path(dst_path))
            {
                std::fs::copy(from, to).map_err(FsError::from)?;
                return Ok(());
            }
        }
        StreamCopier.copy(src, src_path, dst, dst_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFileSystem, PhysicalFileSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn p(s: &str) -> VirtualPath {
        s.parse().unwrap()
    }

    #[test]
    fn stream_fallback_copies_files() {
        let src = MemoryFileSystem::new();
        src.write(&p("/a.txt"), b"payload").unwrap();
        let dst = MemoryFileSystem::new();

        let registry = TransferRegistry::new();
        registry.copy(&src, &p("/a.txt"), &dst, &p("/b.txt")).unwrap();
        assert_eq!(dst.read(&p("/b.txt")).unwrap(), b"payload");
    }

    #[test]
    fn directories_copy_recursively() {
        let src = MemoryFileSystem::new();
        src.create_directory_recursive(&p("/tree/sub/")).unwrap();
        src.write(&p("/tree/a.txt"), b"a").unwrap();
        src.write(&p("/tree/sub/b.txt"), b"b").unwrap();
        let dst = MemoryFileSystem::new();

        let registry = TransferRegistry::new();
        registry
            .copy(&src, &p("/tree/"), &dst, &p("/copy/"))
            .unwrap();
        assert_eq!(dst.read(&p("/copy/a.txt")).unwrap(), b"a");
        assert_eq!(dst.read(&p("/copy/sub/b.txt")).unwrap(), b"b");
    }

    #[test]
    fn move_deletes_the_source() {
        let src = MemoryFileSystem::new();
        src.write(&p("/a.txt"), b"x").unwrap();
        let dst = MemoryFileSystem::new();

        let registry = TransferRegistry::new();
        registry
            .move_entity(&src, &p("/a.txt"), &dst, &p("/a.txt"))
            .unwrap();
        assert!(!src.exists(&p("/a.txt")).unwrap());
        assert_eq!(dst.read(&p("/a.txt")).unwrap(), b"x");
    }

    #[test]
    fn mismatched_flavors_rejected() {
        let src = MemoryFileSystem::new();
        src.write(&p("/a"), b"x").unwrap();
        let registry = TransferRegistry::new();
        let err = registry
            .copy(&src, &p("/a"), &MemoryFileSystem::new(), &p("/a/"))
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }

    #[test]
    fn physical_fast_path_copies_on_disk() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = PhysicalFileSystem::new(src_dir.path()).unwrap();
        let dst = PhysicalFileSystem::new(dst_dir.path()).unwrap();
        src.write(&p("/a.bin"), b"bytes").unwrap();

        let registry = TransferRegistry::new();
        registry.copy(&src, &p("/a.bin"), &dst, &p("/a.bin")).unwrap();
        assert_eq!(dst.read(&p("/a.bin")).unwrap(), b"bytes");
    }

    #[test]
    fn registered_strategy_wins_over_fallback() {
        struct Counting(Arc<AtomicUsize>);
        impl EntityCopier for Counting {
            fn copy(
                &self,
                src: &dyn FileSystem,
                src_path: &VirtualPath,
                dst: &dyn FileSystem,
                dst_path: &VirtualPath,
            ) -> FsResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                StreamCopier.copy(src, src_path, dst, dst_path)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = TransferRegistry::new();
        registry.register("memory", "memory", Box::new(Counting(calls.clone())));

        let src = MemoryFileSystem::new();
        src.write(&p("/a"), b"x").unwrap();
        registry
            .copy(&src, &p("/a"), &MemoryFileSystem::new(), &p("/b"))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
