//! seamfs-core: a virtual filesystem with seamless archive nesting.
//!
//! This crate provides:
//!
//! - **Path algebra**: [`VirtualPath`], an immutable absolute path value
//!   that encodes the file/directory distinction in its trailing separator
//! - **Contract**: the [`FileSystem`] trait every backend and composing
//!   layer implements
//! - **Leaf backends**: [`MemoryFileSystem`] and [`PhysicalFileSystem`]
//! - **Composing layers**: [`FileSystemMounter`], [`MergedFileSystem`],
//!   [`SubFileSystem`], [`ReadOnlyFileSystem`]
//! - **Seamless resolution**: [`SeamlessArchiveFileSystem`], which treats
//!   archive files as nested filesystems, reference-counting each opened
//!   archive and tearing it down when its last user is done
//! - **Transfer**: cross-backend copy/move strategies keyed by backend
//!   kind
//!
//! Archive decoders plug in through [`ArchiveOpener`]; see the `seamfs-zip`
//! crate for the zip implementation.

pub mod entity;
pub mod error;
pub mod fs;
pub mod path;
pub mod transfer;

pub use entity::Entity;
pub use error::{FsError, FsResult, PathParseError};
pub use fs::{
    ARCHIVE_MARKER, Access, ArchiveOpener, DenyWrite, FileSystem, FileSystemMounter,
    FileSystemReference, MAX_ARCHIVE_DEPTH, MemoryFileSystem, MergedFileSystem,
    PhysicalFileSystem, ReadOnlyFileSystem, ReferenceStream, SeamlessArchiveFileSystem,
    SubFileSystem, VfsFile, has_archive_marker,
};
pub use path::{SEPARATOR, VirtualPath};
pub use transfer::{EntityCopier, PhysicalCopier, StreamCopier, TransferRegistry};
