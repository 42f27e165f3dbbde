//! Named byte streams backing segment files
//!
//! A `Directory` hands out sequential output streams for new files and
//! seekable input streams for existing ones. Two implementations exist:
//! `FsDirectory` over a filesystem directory and `RamDirectory` for tests
//! and tooling.

mod fs;
mod ram;

use std::io::{self, Read, Seek, Write};

pub use fs::FsDirectory;
pub use ram::RamDirectory;

/// Sequential byte sink for a newly created file
pub trait OutputStream: Write + Send {}

impl<T: Write + Send> OutputStream for T {}

/// Seekable byte source for an existing file
pub trait InputStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> InputStream for T {}

/// A flat namespace of files
pub trait Directory: Send + Sync {
    /// Create (or truncate) a file and return a stream positioned at its start
    fn create_file(&self, name: &str) -> io::Result<Box<dyn OutputStream>>;

    /// Open an existing file. Missing files fail with `ErrorKind::NotFound`.
    fn open_file(&self, name: &str) -> io::Result<Box<dyn InputStream>>;

    fn delete_file(&self, name: &str) -> io::Result<()>;

    fn file_exists(&self, name: &str) -> bool;

    fn file_len(&self, name: &str) -> io::Result<u64>;

    /// All file names, sorted
    fn list_files(&self) -> io::Result<Vec<String>>;
}

pub(crate) fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("file not found: {}", name))
}
