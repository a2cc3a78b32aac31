//! Reference-owning stream decorator.

use std::io::{self, Read, Seek, SeekFrom, Write};

use super::VfsFile;
use super::seamless::FileSystemReference;

/// Byte stream that owns one archive reference.
///
/// Read, write and seek delegate to the wrapped stream. Closing drops the
/// wrapped stream *first* and releases the reference *second*, so a
/// stream is always observably closed before its archive can become
/// eligible for teardown. Closing twice releases the reference exactly
/// once; dropping an unclosed stream performs the same ordered shutdown.
pub struct ReferenceStream {
    stream: Option<Box<dyn VfsFile>>,
    reference: Option<FileSystemReference>,
}

impl ReferenceStream {
    pub(crate) fn new(stream: Box<dyn VfsFile>, reference: FileSystemReference) -> Self {
        Self {
            stream: Some(stream),
            reference: Some(reference),
        }
    }

    /// Close the stream and release its reference. Idempotent.
    pub fn close(&mut self) {
        drop(self.stream.take());
        drop(self.reference.take());
    }

    fn stream_mut(&mut self) -> io::Result<&mut Box<dyn VfsFile>> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stream is closed"))
    }
}

impl Read for ReferenceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream_mut()?.read(buf)
    }
}

impl Write for ReferenceStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream_mut()?.flush()
    }
}

impl Seek for ReferenceStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream_mut()?.seek(pos)
    }
}

impl Drop for ReferenceStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::FakeArchiveOpener;
    use crate::fs::{Access, FileSystem, MemoryFileSystem, SeamlessArchiveFileSystem};
    use crate::path::VirtualPath;
    use std::sync::Arc;

    fn p(s: &str) -> VirtualPath {
        s.parse().unwrap()
    }

    fn engine() -> (SeamlessArchiveFileSystem, Arc<FakeArchiveOpener>) {
        let root = MemoryFileSystem::new();
        root.write(&p("/data.zip"), b"bytes").unwrap();
        let opener = Arc::new(FakeArchiveOpener::new());
        let engine = SeamlessArchiveFileSystem::new(Arc::new(root), opener.clone());
        (engine, opener)
    }

    #[test]
    fn closing_twice_releases_exactly_once() {
        let (engine, opener) = engine();

        let reference = engine.refer(&p("/data.zip#/inner.txt")).unwrap();
        let inner = reference
            .filesystem()
            .open_file(&p("/inner.txt"), Access::Read)
            .unwrap();
        let mut stream = ReferenceStream::new(inner, reference);
        assert_eq!(engine.open_archives(), 1);

        stream.close();
        assert_eq!(engine.open_archives(), 0);
        assert_eq!(opener.disposed(), 1);

        stream.close();
        assert_eq!(opener.disposed(), 1, "second close must not double-release");

        // drop after close is also a no-op
        drop(stream);
        assert_eq!(opener.disposed(), 1);
    }

    #[test]
    fn operations_after_close_fail() {
        let (engine, _) = engine();

        let reference = engine.refer(&p("/data.zip#/inner.txt")).unwrap();
        let inner = reference
            .filesystem()
            .open_file(&p("/inner.txt"), Access::Read)
            .unwrap();
        let mut stream = ReferenceStream::new(inner, reference);
        stream.close();

        let mut buf = [0u8; 4];
        assert_eq!(
            stream.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        assert!(stream.seek(SeekFrom::Start(0)).is_err());
    }

    #[test]
    fn delegates_while_open() {
        let (engine, _) = engine();
        let mut stream = engine
            .open_file(&p("/data.zip#/inner.txt"), Access::Read)
            .unwrap();

        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"inner");

        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        stream.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"inner contents");
    }
}
