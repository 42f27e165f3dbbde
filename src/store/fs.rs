use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{not_found, Directory, InputStream, OutputStream};

/// Directory backed by a filesystem path
#[derive(Clone, Debug)]
pub struct FsDirectory {
    base_dir: PathBuf,
}

impl FsDirectory {
    /// Open a directory, creating it if it does not exist
    pub fn new<P: AsRef<Path>>(base_dir: P) -> io::Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

/// Buffered file output. `flush` pushes data through to stable storage.
struct FsOutput {
    inner: BufWriter<File>,
}

impl Write for FsOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()
    }
}

impl Directory for FsDirectory {
    fn create_file(&self, name: &str) -> io::Result<Box<dyn OutputStream>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.file_path(name))?;
        Ok(Box::new(FsOutput {
            inner: BufWriter::new(file),
        }))
    }

    fn open_file(&self, name: &str) -> io::Result<Box<dyn InputStream>> {
        let file = File::open(self.file_path(name)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                not_found(name)
            } else {
                e
            }
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn delete_file(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.file_path(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn file_len(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.file_path(name))?.len())
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
