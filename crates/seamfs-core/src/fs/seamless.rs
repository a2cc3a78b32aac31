//! Seamless archive resolution engine.
//!
//! A path may carry an *archive marker*: the marker character immediately
//! followed by the separator. Everything before the marker names an
//! archive file; everything after is a path inside that archive, rooted at
//! the archive's own root:
//!
//! ```text
//! /a/b.zip#/dir/file.txt      → archive /a/b.zip, inner /dir/file.txt
//! /a.zip#/b.zip#/c.txt        → archive /a.zip#/b.zip (resolved
//!                               recursively), inner /c.txt
//! ```
//!
//! The engine lazily opens an archive backend the first time a path
//! crosses into it, shares that backend between all concurrent users, and
//! tears it down the instant the last reference is released. Streaming
//! operations defer their release to stream closure via
//! [`ReferenceStream`](super::ReferenceStream); everything else releases
//! before returning.
//!
//! The usage registry is the only shared mutable state. Acquire
//! (check-then-create-or-reuse) runs under one lock; teardown effects
//! (backend dispose, cascading release of the enclosing archive) run
//! after the lock is dropped.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use super::stream::ReferenceStream;
use super::{Access, FileSystem, VfsFile};
use crate::entity::Entity;
use crate::error::{FsError, FsResult};
use crate::path::VirtualPath;

/// Marker character denoting an archive boundary inside a path.
pub const ARCHIVE_MARKER: char = '#';

/// Maximum number of archive boundaries a single path may cross.
pub const MAX_ARCHIVE_DEPTH: usize = 16;

/// The marker is only significant immediately before a separator.
const MARKER_SEQUENCE: &str = "#/";

/// True if the path crosses at least one archive boundary.
pub fn has_archive_marker(path: &VirtualPath) -> bool {
    path.as_str().contains(MARKER_SEQUENCE)
}

fn marker_depth(path: &VirtualPath) -> usize {
    path.as_str().matches(MARKER_SEQUENCE).count()
}

/// Split at the last marker: the archive's own path (which may itself
/// carry earlier markers) and the re-rooted path inside it.
fn split_archive(path: &VirtualPath) -> Option<(VirtualPath, VirtualPath)> {
    let s = path.as_str();
    let idx = s.rfind(MARKER_SEQUENCE)?;
    let archive = VirtualPath::new_unchecked(s[..idx].to_string());
    let inner = VirtualPath::new_unchecked(s[idx + 1..].to_string());
    Some((archive, inner))
}

/// Hooks a concrete seamless implementation supplies to the engine.
pub trait ArchiveOpener: Send + Sync {
    /// Decide whether a listed file should additionally be advertised as a
    /// browsable archive directory. `path` is the outer-visible path, so
    /// implementations can refuse archives already nested inside another
    /// archive.
    fn is_archive_file(&self, fs: &dyn FileSystem, path: &VirtualPath) -> bool;

    /// Build a filesystem over the archive file's bytes.
    fn open_archive(&self, archive: &Entity) -> FsResult<Arc<dyn FileSystem>>;
}

/// One lazily opened archive backend plus its active references.
struct Usage {
    fs: Arc<dyn FileSystem>,
    refs: HashSet<u64>,
    /// For archives nested inside archives: the reference that keeps the
    /// enclosing archive's usage alive until this one is torn down.
    outer: Option<FileSystemReference>,
}

struct RegistryState {
    usages: HashMap<Entity, Usage>,
    disposed: bool,
}

/// Owner of every usage; exposes only acquire/release/dispose.
struct ArchiveRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl ArchiveRegistry {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RegistryState {
                usages: HashMap::new(),
                disposed: false,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reuse or create the usage for `archive` and allocate a reference
    /// into it. `outer` is the claim held on the enclosing archive while
    /// resolving; a newly created usage takes it over, an existing usage
    /// already pins its own chain so the extra claim is released.
    fn acquire(
        self: &Arc<Self>,
        archive: Entity,
        outer: Option<FileSystemReference>,
        opener: &dyn ArchiveOpener,
    ) -> FsResult<FileSystemReference> {
        let mut state = self.lock();
        if state.disposed {
            return Err(FsError::InvalidOperation(
                "filesystem is disposed".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Some(usage) = state.usages.get_mut(&archive) {
            usage.refs.insert(id);
            let fs = usage.fs.clone();
            trace!(archive = %archive.path(), id, "reusing open archive");
            drop(state);
            drop(outer);
            return Ok(FileSystemReference {
                registry: Some(self.clone()),
                archive: Some(archive),
                id,
                fs,
            });
        }

        debug!(archive = %archive.path(), "opening archive filesystem");
        let fs = match opener.open_archive(&archive) {
            Ok(fs) => fs,
            Err(e) => {
                drop(state);
                drop(outer);
                return Err(e);
            }
        };
        state.usages.insert(
            archive.clone(),
            Usage {
                fs: fs.clone(),
                refs: HashSet::from([id]),
                outer,
            },
        );
        Ok(FileSystemReference {
            registry: Some(self.clone()),
            archive: Some(archive),
            id,
            fs,
        })
    }

    /// Remove one reference; tear the usage down when the set empties.
    ///
    /// Inconsistencies here (unknown usage, unknown id) are corrupted
    /// registry state and panic. After [`dispose`](Self::dispose) the
    /// registry no longer tracks anything and late releases are no-ops.
    fn release(&self, archive: &Entity, id: u64) {
        let torn_down = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            let usage = state
                .usages
                .get_mut(archive)
                .expect("released a reference against an unknown archive usage");
            assert!(usage.refs.remove(&id), "archive reference released twice");
            if usage.refs.is_empty() {
                state.usages.remove(archive)
            } else {
                None
            }
        };
        if let Some(usage) = torn_down {
            debug!(archive = %archive.path(), "tearing down archive filesystem");
            if let Err(e) = usage.fs.dispose() {
                warn!(archive = %archive.path(), error = %e, "archive dispose failed");
            }
            // Dropping `usage.outer` may cascade a release into the
            // registry; the lock is no longer held here.
        }
    }

    /// Force-release every outstanding reference and dispose every usage
    /// exactly once. Idempotent.
    fn dispose(&self) {
        let usages = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.usages)
        };
        for (archive, usage) in usages {
            debug!(
                archive = %archive.path(),
                outstanding = usage.refs.len(),
                "force-releasing archive filesystem"
            );
            if let Err(e) = usage.fs.dispose() {
                warn!(archive = %archive.path(), error = %e, "archive dispose failed");
            }
        }
    }

    fn open_archives(&self) -> usize {
        self.lock().usages.len()
    }
}

/// A caller's claim on an opened archive backend.
///
/// Dropping the reference releases the claim exactly once; references to
/// the engine's permanent root backend release into a no-op. The engine
/// never hands out usages directly, only references, so the count cannot
/// be bypassed.
pub struct FileSystemReference {
    registry: Option<Arc<ArchiveRegistry>>,
    archive: Option<Entity>,
    id: u64,
    fs: Arc<dyn FileSystem>,
}

impl FileSystemReference {
    fn root(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            registry: None,
            archive: None,
            id: 0,
            fs,
        }
    }

    /// The backend this reference pins open.
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }
}

impl Drop for FileSystemReference {
    fn drop(&mut self) {
        if let (Some(registry), Some(archive)) = (self.registry.take(), self.archive.take()) {
            trace!(archive = %archive.path(), id = self.id, "releasing archive reference");
            registry.release(&archive, self.id);
        }
    }
}

/// Filesystem that resolves archive-marker paths transparently.
///
/// Itself a conforming [`FileSystem`], so it nests inside mounts, merges
/// and sub-roots like any leaf.
pub struct SeamlessArchiveFileSystem {
    inner: Arc<dyn FileSystem>,
    opener: Arc<dyn ArchiveOpener>,
    registry: Arc<ArchiveRegistry>,
}

impl SeamlessArchiveFileSystem {
    pub fn new(inner: Arc<dyn FileSystem>, opener: Arc<dyn ArchiveOpener>) -> Self {
        Self {
            inner,
            opener,
            registry: ArchiveRegistry::new(),
        }
    }

    /// The outer (non-archive) backend.
    pub fn inner(&self) -> &Arc<dyn FileSystem> {
        &self.inner
    }

    /// Number of archive backends currently open.
    pub fn open_archives(&self) -> usize {
        self.registry.open_archives()
    }

    /// Resolve a path to a reference on the backend that owns it.
    pub(crate) fn refer(&self, path: &VirtualPath) -> FsResult<FileSystemReference> {
        if marker_depth(path) > MAX_ARCHIVE_DEPTH {
            return Err(FsError::InvalidArgument(format!(
                "archive nesting exceeds {MAX_ARCHIVE_DEPTH} levels: {path}"
            )));
        }
        match split_archive(path) {
            None => Ok(FileSystemReference::root(self.inner.clone())),
            Some((archive_path, _)) => self.acquire_archive(&archive_path),
        }
    }

    /// Acquire the usage for an archive path, resolving enclosing archives
    /// recursively. The returned reference transitively keeps the whole
    /// chain alive.
    fn acquire_archive(&self, archive_path: &VirtualPath) -> FsResult<FileSystemReference> {
        match split_archive(archive_path) {
            None => {
                let archive = Entity::new(self.inner.clone(), archive_path.clone());
                self.registry
                    .acquire(archive, None, self.opener.as_ref())
            }
            Some((outer_path, inner_path)) => {
                let outer = self.acquire_archive(&outer_path)?;
                let archive = Entity::new(outer.filesystem().clone(), inner_path);
                self.registry
                    .acquire(archive, Some(outer), self.opener.as_ref())
            }
        }
    }

    /// The path as seen by the backend that owns it: the part after the
    /// last marker, or the whole path when no marker is present.
    fn relative_path(path: &VirtualPath) -> VirtualPath {
        match split_archive(path) {
            Some((_, inner)) => inner,
            None => path.clone(),
        }
    }

    /// Rewrite an archive file path into its synthetic directory form:
    /// `/a/data.zip` → `/a/data.zip#/`.
    fn archive_file_to_directory(path: &VirtualPath) -> FsResult<VirtualPath> {
        if !path.is_file() {
            return Err(FsError::InvalidArgument(format!(
                "{path} is not a file path"
            )));
        }
        let name = path.entity_name().expect("non-root file path has a name");
        path.parent()?
            .append_directory(&format!("{name}{ARCHIVE_MARKER}"))
    }
}

impl FileSystem for SeamlessArchiveFileSystem {
    fn exists(&self, path: &VirtualPath) -> FsResult<bool> {
        let reference = self.refer(path)?;
        reference.filesystem().exists(&Self::relative_path(path))
    }

    fn entities(&self, path: &VirtualPath) -> FsResult<Vec<VirtualPath>> {
        let reference = self.refer(path)?;
        let fs = reference.filesystem();

        // Children come back rooted in their own backend; re-prefix them
        // with the outer-visible parent before reporting.
        let visible_parent = match split_archive(path) {
            Some((archive_path, _)) => Self::archive_file_to_directory(&archive_path)?,
            None => VirtualPath::root(),
        };

        let mut out = Vec::new();
        for child in fs.entities(&Self::relative_path(path))? {
            let visible = visible_parent.append_path(&child)?;
            let synthetic = if self.opener.is_archive_file(fs.as_ref(), &visible) {
                Some(Self::archive_file_to_directory(&visible)?)
            } else {
                None
            };
            out.push(visible);
            out.extend(synthetic);
        }
        Ok(out)
    }

    fn open_file(&self, path: &VirtualPath, access: Access) -> FsResult<Box<dyn VfsFile>> {
        let reference = self.refer(path)?;
        // On failure the reference drops here, releasing its claim.
        let stream = reference
            .filesystem()
            .open_file(&Self::relative_path(path), access)?;
        Ok(Box::new(ReferenceStream::new(stream, reference)))
    }

    fn create_file(&self, path: &VirtualPath) -> FsResult<Box<dyn VfsFile>> {
        let reference = self.refer(path)?;
        let stream = reference
            .filesystem()
            .create_file(&Self::relative_path(path))?;
        Ok(Box::new(ReferenceStream::new(stream, reference)))
    }

    fn create_directory(&self, path: &VirtualPath) -> FsResult<()> {
        let reference = self.refer(path)?;
        reference
            .filesystem()
            .create_directory(&Self::relative_path(path))
    }

    fn delete(&self, path: &VirtualPath) -> FsResult<()> {
        let reference = self.refer(path)?;
        reference.filesystem().delete(&Self::relative_path(path))
    }

    fn dispose(&self) -> FsResult<()> {
        self.registry.dispose();
        self.inner.dispose()
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn backend_kind(&self) -> &'static str {
        "seamless"
    }

    fn physical_path(&self, path: &VirtualPath) -> Option<PathBuf> {
        if has_archive_marker(path) {
            return None;
        }
        self.inner.physical_path(path)
    }
}

impl Drop for SeamlessArchiveFileSystem {
    fn drop(&mut self) {
        // Outstanding references hold the registry alive through `Arc`s;
        // clearing it here guarantees archive backends never outlive the
        // engine even without an explicit dispose call. The inner backend
        // is only disposed by an explicit `dispose`.
        self.registry.dispose();
    }
}
