//! Virtual path value type.
//!
//! A [`VirtualPath`] is an immutable, absolute, `/`-delimited path. Whether
//! it names a file or a directory is encoded structurally: a trailing
//! separator means directory, its absence means file. Because the
//! distinction lives in the string itself, string equality is identity
//! equality and a file can never collide with a directory of the same name.
//!
//! Paths are constructed through [`VirtualPath::parse`] or the append/remove
//! combinators; every constructed path upholds the invariants (non-empty,
//! rooted, no doubled separators). None of the operations touch any
//! filesystem.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FsError, FsResult, PathParseError};

/// The directory separator used by all virtual paths.
pub const SEPARATOR: char = '/';

/// An immutable absolute path with the file/directory distinction encoded
/// in the trailing separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// The root path `/`.
    pub fn root() -> Self {
        VirtualPath(SEPARATOR.to_string())
    }

    /// Parse an absolute path string.
    ///
    /// Fails if the string is empty, does not start with `/`, or contains
    /// two consecutive separators.
    pub fn parse(s: &str) -> Result<Self, PathParseError> {
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        if !s.starts_with(SEPARATOR) {
            return Err(PathParseError::NotRooted(s.to_string()));
        }
        if s.contains("//") {
            return Err(PathParseError::DoubledSeparators(s.to_string()));
        }
        Ok(VirtualPath(s.to_string()))
    }

    /// Construct from a string already known to uphold the invariants.
    ///
    /// Callers must only pass substrings or concatenations of valid paths.
    pub(crate) fn new_unchecked(s: String) -> Self {
        debug_assert!(VirtualPath::parse(&s).is_ok(), "invalid raw path: {s:?}");
        VirtualPath(s)
    }

    /// The underlying string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the unique one-character path `/`.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// True if the path names a directory (trailing separator present).
    /// The root is a directory.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    /// True if the path names a file (no trailing separator).
    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    /// The last segment of the path, or `None` for the root.
    pub fn entity_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        let end = self.name_end();
        let start = self.0[..end]
            .rfind(SEPARATOR)
            .expect("rooted path always contains a separator")
            + 1;
        Some(&self.0[start..end])
    }

    /// The parent directory of this path.
    ///
    /// Fails with an invalid-operation error on the root.
    pub fn parent(&self) -> FsResult<VirtualPath> {
        if self.is_root() {
            return Err(FsError::InvalidOperation(
                "the root path has no parent".to_string(),
            ));
        }
        let end = self.name_end();
        let idx = self.0[..end]
            .rfind(SEPARATOR)
            .expect("rooted path always contains a separator");
        Ok(VirtualPath::new_unchecked(self.0[..=idx].to_string()))
    }

    /// Ordered directory segments, root to leaf. For a file path these are
    /// the segments of its parent directory.
    pub fn directory_segments(&self) -> Vec<&str> {
        let end = if self.is_file() {
            self.0
                .rfind(SEPARATOR)
                .expect("rooted path always contains a separator")
                + 1
        } else {
            self.0.len()
        };
        let dir = &self.0[1..end];
        let dir = dir.strip_suffix(SEPARATOR).unwrap_or(dir);
        if dir.is_empty() {
            Vec::new()
        } else {
            dir.split(SEPARATOR).collect()
        }
    }

    /// Append a directory segment, yielding a directory path.
    ///
    /// Fails on file paths and on names containing a separator.
    pub fn append_directory(&self, name: &str) -> FsResult<VirtualPath> {
        self.check_appendable(name)?;
        Ok(VirtualPath::new_unchecked(format!(
            "{}{}{}",
            self.0, name, SEPARATOR
        )))
    }

    /// Append a file segment, yielding a file path.
    ///
    /// Fails on file paths and on names containing a separator.
    pub fn append_file(&self, name: &str) -> FsResult<VirtualPath> {
        self.check_appendable(name)?;
        Ok(VirtualPath::new_unchecked(format!("{}{}", self.0, name)))
    }

    /// Append a relative path string.
    ///
    /// Fails on file paths and on arguments that are already absolute.
    pub fn append(&self, relative: &str) -> FsResult<VirtualPath> {
        if !self.is_directory() {
            return Err(FsError::InvalidOperation(format!(
                "cannot append to file path {self}"
            )));
        }
        if relative.starts_with(SEPARATOR) {
            return Err(FsError::InvalidArgument(format!(
                "the appended path must be relative: {relative:?}"
            )));
        }
        VirtualPath::parse(&format!("{}{}", self.0, relative)).map_err(FsError::from)
    }

    /// Append another absolute path beneath this directory.
    pub fn append_path(&self, path: &VirtualPath) -> FsResult<VirtualPath> {
        if !self.is_directory() {
            return Err(FsError::InvalidOperation(format!(
                "cannot append to file path {self}"
            )));
        }
        Ok(VirtualPath::new_unchecked(format!(
            "{}{}",
            self.0,
            &path.0[1..]
        )))
    }

    /// True iff this is a directory and a strict string prefix of `other`.
    pub fn is_parent_of(&self, other: &VirtualPath) -> bool {
        self.is_directory() && self.0.len() != other.0.len() && other.0.starts_with(&self.0)
    }

    /// Mirror of [`is_parent_of`](Self::is_parent_of).
    pub fn is_child_of(&self, other: &VirtualPath) -> bool {
        other.is_parent_of(self)
    }

    /// Strip a parent prefix, re-rooting the remainder.
    ///
    /// A path equal to the argument yields the root; a non-parent argument
    /// is an invalid-argument error.
    pub fn remove_parent(&self, parent: &VirtualPath) -> FsResult<VirtualPath> {
        if self == parent {
            return Ok(VirtualPath::root());
        }
        if !parent.is_parent_of(self) {
            return Err(FsError::InvalidArgument(format!(
                "{parent} is not a parent of {self}"
            )));
        }
        Ok(VirtualPath::new_unchecked(
            self.0[parent.0.len() - 1..].to_string(),
        ))
    }

    /// Strip a child suffix, keeping the leading directory path.
    ///
    /// A path equal to the argument yields the root; an argument that is
    /// not a strict suffix is an invalid-argument error.
    pub fn remove_child(&self, child: &VirtualPath) -> FsResult<VirtualPath> {
        if self == child {
            return Ok(VirtualPath::root());
        }
        if child.0.len() >= self.0.len() || !self.0.ends_with(&child.0) {
            return Err(FsError::InvalidArgument(format!(
                "{child} is not a child of {self}"
            )));
        }
        Ok(VirtualPath::new_unchecked(
            self.0[..self.0.len() - child.0.len() + 1].to_string(),
        ))
    }

    /// The extension of a file name, including the leading dot.
    ///
    /// `None` when the name has no dot; invalid-operation on directories.
    pub fn extension(&self) -> FsResult<Option<&str>> {
        if !self.is_file() {
            return Err(FsError::InvalidOperation(format!(
                "{self} is not a file path"
            )));
        }
        let end = self.0.len();
        let start = self
            .0
            .rfind(SEPARATOR)
            .expect("rooted path always contains a separator")
            + 1;
        let name = &self.0[start..end];
        Ok(name.rfind('.').map(|i| &name[i..]))
    }

    /// Replace (or append, when absent) the file extension.
    ///
    /// `extension` should include the leading dot.
    pub fn with_extension(&self, extension: &str) -> FsResult<VirtualPath> {
        if extension.contains(SEPARATOR) {
            return Err(FsError::InvalidArgument(format!(
                "extension contains a separator: {extension:?}"
            )));
        }
        let name = match self.extension()? {
            Some(old) => {
                let name = self.entity_name().expect("file path has a name");
                format!("{}{}", &name[..name.len() - old.len()], extension)
            }
            None => {
                let name = self.entity_name().expect("file path has a name");
                format!("{name}{extension}")
            }
        };
        self.parent()?.append_file(&name)
    }

    /// End of the entity-name portion (excludes a trailing separator).
    fn name_end(&self) -> usize {
        if self.is_directory() {
            self.0.len() - 1
        } else {
            self.0.len()
        }
    }

    fn check_appendable(&self, name: &str) -> FsResult<()> {
        if !self.is_directory() {
            return Err(FsError::InvalidOperation(format!(
                "cannot append to file path {self}"
            )));
        }
        if name.is_empty() {
            return Err(FsError::InvalidArgument("empty entity name".to_string()));
        }
        if name.contains(SEPARATOR) {
            return Err(FsError::InvalidArgument(format!(
                "entity name contains a separator: {name:?}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VirtualPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VirtualPath::parse(s)
    }
}

impl Serialize for VirtualPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VirtualPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VirtualPath::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VirtualPath {
        VirtualPath::parse(s).unwrap()
    }

    #[test]
    fn parse_validates() {
        assert!(VirtualPath::parse("/").is_ok());
        assert!(VirtualPath::parse("/a/b.txt").is_ok());
        assert!(VirtualPath::parse("/a/b/").is_ok());

        assert_eq!(VirtualPath::parse(""), Err(PathParseError::Empty));
        assert!(matches!(
            VirtualPath::parse("a/b"),
            Err(PathParseError::NotRooted(_))
        ));
        assert!(matches!(
            VirtualPath::parse("/a//b"),
            Err(PathParseError::DoubledSeparators(_))
        ));
    }

    #[test]
    fn round_trip() {
        for s in ["/", "/a", "/a/", "/a/b.txt", "/dir/sub/", "/a.zip#/b"] {
            assert_eq!(p(s).to_string(), s);
            assert_eq!(p(s), s.parse().unwrap());
        }
    }

    #[test]
    fn root_properties() {
        let root = VirtualPath::root();
        assert!(root.is_root());
        assert!(root.is_directory());
        assert!(!root.is_file());
        assert_eq!(root.entity_name(), None);
        assert_eq!(root, p("/"));
        assert!(root.directory_segments().is_empty());
    }

    #[test]
    fn file_directory_distinction() {
        assert!(p("/file").is_file());
        assert!(!p("/file").is_directory());
        assert!(p("/dir/").is_directory());
        assert!(!p("/dir/").is_file());
        assert_ne!(p("/name"), p("/name/"));
    }

    #[test]
    fn entity_name() {
        assert_eq!(p("/filea").entity_name(), Some("filea"));
        assert_eq!(p("/directorya/fileb.txt").entity_name(), Some("fileb.txt"));
        assert_eq!(p("/directorya/").entity_name(), Some("directorya"));
        assert_eq!(p("/a/b/c/").entity_name(), Some("c"));
    }

    #[test]
    fn parent() {
        assert_eq!(p("/a").parent().unwrap(), p("/"));
        assert_eq!(p("/a/").parent().unwrap(), p("/"));
        assert_eq!(p("/a/b.txt").parent().unwrap(), p("/a/"));
        assert_eq!(p("/a/b/").parent().unwrap(), p("/a/"));

        let err = VirtualPath::root().parent().unwrap_err();
        assert!(matches!(err, FsError::InvalidOperation(_)));
    }

    #[test]
    fn append_directory_and_file() {
        let d = p("/a/");
        assert_eq!(d.append_directory("b").unwrap(), p("/a/b/"));
        assert_eq!(d.append_file("b.txt").unwrap(), p("/a/b.txt"));

        // names with separators are rejected
        assert!(matches!(
            d.append_file("b/c").unwrap_err(),
            FsError::InvalidArgument(_)
        ));
        assert!(matches!(
            d.append_directory("").unwrap_err(),
            FsError::InvalidArgument(_)
        ));

        // appending to a file path is a structural error
        assert!(matches!(
            p("/a").append_file("b").unwrap_err(),
            FsError::InvalidOperation(_)
        ));
    }

    #[test]
    fn append_file_inverts_parent_and_name() {
        let d = p("/x/y/");
        let f = d.append_file("z.bin").unwrap();
        assert_eq!(f.parent().unwrap(), d);
        assert_eq!(f.entity_name(), Some("z.bin"));
    }

    #[test]
    fn append_relative() {
        assert_eq!(p("/a/").append("b/c.txt").unwrap(), p("/a/b/c.txt"));
        assert_eq!(p("/").append("x/").unwrap(), p("/x/"));

        assert!(matches!(
            p("/a/").append("/abs").unwrap_err(),
            FsError::InvalidArgument(_)
        ));
        assert!(matches!(
            p("/a").append("b").unwrap_err(),
            FsError::InvalidOperation(_)
        ));
    }

    #[test]
    fn append_path() {
        assert_eq!(p("/a/").append_path(&p("/b/c")).unwrap(), p("/a/b/c"));
        assert_eq!(p("/").append_path(&p("/b/")).unwrap(), p("/b/"));
        assert!(p("/a").append_path(&p("/b")).is_err());
    }

    #[test]
    fn parent_child_relations() {
        let parent = p("/a/");
        let child = p("/a/b/c.txt");
        assert!(parent.is_parent_of(&child));
        assert!(child.is_child_of(&parent));

        // not strict: equal paths are not parent/child
        assert!(!parent.is_parent_of(&parent));
        // files are never parents
        assert!(!p("/a").is_parent_of(&p("/a/b")));
    }

    #[test]
    fn remove_parent() {
        assert_eq!(
            p("/a/b/c.txt").remove_parent(&p("/a/")).unwrap(),
            p("/b/c.txt")
        );
        assert_eq!(p("/a/b/").remove_parent(&p("/a/b/")).unwrap(), p("/"));

        assert!(matches!(
            p("/a/b").remove_parent(&p("/x/")).unwrap_err(),
            FsError::InvalidArgument(_)
        ));
    }

    #[test]
    fn remove_parent_reconstructs() {
        let parent = p("/a/");
        let child = p("/a/b/c.txt");
        let relative = child.remove_parent(&parent).unwrap();
        assert_eq!(parent.append_path(&relative).unwrap(), child);
    }

    #[test]
    fn remove_child() {
        assert_eq!(
            p("/directorya/fileb.txt")
                .remove_child(&p("/fileb.txt"))
                .unwrap(),
            p("/directorya/")
        );
        assert_eq!(p("/a/b").remove_child(&p("/a/b")).unwrap(), p("/"));

        assert!(matches!(
            p("/a/b").remove_child(&p("/c")).unwrap_err(),
            FsError::InvalidArgument(_)
        ));
    }

    #[test]
    fn directory_segments() {
        assert_eq!(p("/a/b/c/").directory_segments(), vec!["a", "b", "c"]);
        assert_eq!(p("/a/b/c.txt").directory_segments(), vec!["a", "b"]);
        assert_eq!(p("/top").directory_segments(), Vec::<&str>::new());
    }

    #[test]
    fn extension() {
        assert_eq!(p("/a/b.txt").extension().unwrap(), Some(".txt"));
        assert_eq!(p("/a/archive.tar.gz").extension().unwrap(), Some(".gz"));
        assert_eq!(p("/a/noext").extension().unwrap(), None);
        assert!(p("/a/").extension().is_err());
    }

    #[test]
    fn with_extension() {
        assert_eq!(p("/a/b.txt").with_extension(".md").unwrap(), p("/a/b.md"));
        assert_eq!(p("/a/noext").with_extension(".md").unwrap(), p("/a/noext.md"));
        assert!(p("/a/").with_extension(".md").is_err());
    }

    #[test]
    fn ordering_is_ordinal() {
        let mut paths = vec![p("/b"), p("/a/"), p("/a/x"), p("/a")];
        paths.sort();
        assert_eq!(paths, vec![p("/a"), p("/a/"), p("/a/x"), p("/b")]);
    }

    #[test]
    fn serde_round_trip() {
        let path = p("/a/b.zip");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/a/b.zip\"");
        let back: VirtualPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);

        let err = serde_json::from_str::<VirtualPath>("\"not-rooted\"");
        assert!(err.is_err());
    }
}
