//! Random-access byte sources

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;
use hdf4_format::{FormatError, Result};

/// Positioned reads over an HDF4 byte stream
pub trait ByteSource: Send + Sync {
    /// Total length in bytes
    fn len(&self) -> u64;

    /// Fill `buf` from `offset`; running past the end is `Truncated`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Whether the source is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset`.
    fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(Bytes::from(buf))
    }
}

fn check_bounds(total: u64, offset: u64, len: usize) -> Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= total => Ok(()),
        _ => Err(FormatError::Truncated {
            offset,
            needed: len as u64,
        }),
    }
}

/// Source backed by any `Read + Seek`, serialized through a mutex
pub struct FileSource<R = File> {
    inner: Mutex<R>,
    len: u64,
}

impl FileSource<File> {
    /// Open a file on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> FileSource<R> {
    /// Wrap a reader; its length is taken by seeking to the end
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Mutex::new(reader),
            len,
        })
    }
}

impl<R: Read + Seek + Send> ByteSource for FileSource<R> {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_bounds(self.len, offset, buf.len())?;
        let mut reader = self.inner.lock().map_err(|_| {
            FormatError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "byte source lock poisoned",
            ))
        })?;
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(buf)?;
        Ok(())
    }
}

/// Source over an in-memory buffer
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a buffer
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_bounds(self.len(), offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn read_range(&self, offset: u64, len: usize) -> Result<Bytes> {
        check_bounds(self.len(), offset, len)?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }
}
