use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{not_found, Directory, InputStream, OutputStream};

type FileMap = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;

/// In-memory directory. Clones share the same files.
#[derive(Clone, Debug, Default)]
pub struct RamDirectory {
    files: FileMap,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a file's published contents
    pub fn read_file(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(name)
            .map(|data| data.as_ref().clone())
            .ok_or_else(|| not_found(name))
    }

    /// Replace a file's contents
    pub fn write_file(&self, name: &str, data: Vec<u8>) {
        self.files.write().insert(name.to_string(), Arc::new(data));
    }
}

/// Output buffer published into the directory on flush and on drop
struct RamOutput {
    name: String,
    buf: Vec<u8>,
    files: FileMap,
}

impl RamOutput {
    fn publish(&self) {
        self.files
            .write()
            .insert(self.name.clone(), Arc::new(self.buf.clone()));
    }
}

impl Write for RamOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for RamOutput {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Shared read-only view of a published file
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Directory for RamDirectory {
    fn create_file(&self, name: &str) -> io::Result<Box<dyn OutputStream>> {
        self.files
            .write()
            .insert(name.to_string(), Arc::new(Vec::new()));
        Ok(Box::new(RamOutput {
            name: name.to_string(),
            buf: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn open_file(&self, name: &str) -> io::Result<Box<dyn InputStream>> {
        let data = self.files.read().get(name).cloned().ok_or_else(|| not_found(name))?;
        Ok(Box::new(Cursor::new(SharedBytes(data))))
    }

    fn delete_file(&self, name: &str) -> io::Result<()> {
        self.files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn file_len(&self, name: &str) -> io::Result<u64> {
        self.files
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
