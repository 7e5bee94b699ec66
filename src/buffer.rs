//! Uniform random-access byte view over the three supported storage backends.
//!
//! A `Buffer` is the only external resource a `Reader` owns. All three
//! backends answer the same `slice(offset, length)` operation; `Decoder`,
//! `Metadata`, and `TreeWalker` never know which one is backing them.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use memmap2::Mmap;

use crate::error::{Error, Result};

/// How a database source should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Prefer a native-accelerated mmap, else plain mmap, else file reads.
    Auto,
    /// Native-accelerated path. This port has no native companion module, so
    /// it is serviced identically to `Mmap` rather than rejected outright.
    MmapExt,
    /// Memory-map the file read-only.
    Mmap,
    /// Keep the file open and issue seek+read for every slice.
    File,
    /// Read the entire source into memory up front.
    Memory,
}

enum Backend {
    Mmap(Mmap),
    File { handle: Mutex<File>, len: usize },
    Memory(Vec<u8>),
}

/// The Reader's sole external resource: an immutable byte view with a
/// `close()` that every subsequent read must observe.
pub(crate) struct Buffer {
    backend: Backend,
    closed: AtomicBool,
}

impl Buffer {
    /// Open `path` under the given mode.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let backend = match mode {
            OpenMode::Auto | OpenMode::MmapExt | OpenMode::Mmap => {
                let file = open_file(path)?;
                let mmap = unsafe { Mmap::map(&file) }
                    .map_err(|e| Error::InvalidDatabase(format!("failed to mmap {:?}: {}", path, e)))?;
                Backend::Mmap(mmap)
            }
            OpenMode::File => {
                let file = open_file(path)?;
                let len = file
                    .metadata()
                    .map_err(|e| Error::InvalidDatabase(e.to_string()))?
                    .len() as usize;
                Backend::File {
                    handle: Mutex::new(file),
                    len,
                }
            }
            OpenMode::Memory => {
                let mut file = open_file(path)?;
                let mut data = Vec::new();
                file.read_to_end(&mut data)
                    .map_err(|e| Error::InvalidDatabase(e.to_string()))?;
                Backend::Memory(data)
            }
        };

        Ok(Buffer {
            backend,
            closed: AtomicBool::new(false),
        })
    }

    /// Wrap an in-memory byte source (MEMORY / FD modes).
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Buffer {
            backend: Backend::Memory(data),
            closed: AtomicBool::new(false),
        }
    }

    /// Wrap an already-open file descriptor. FD mode implies MEMORY: the
    /// whole source is read up front and the descriptor is not retained.
    pub fn from_file(mut file: File) -> Result<Self> {
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::InvalidDatabase(e.to_string()))?;
        Ok(Buffer::from_bytes(data))
    }

    /// Total buffer length in bytes.
    pub fn len(&self) -> usize {
        match &self.backend {
            Backend::Mmap(m) => m.len(),
            Backend::File { len, .. } => *len,
            Backend::Memory(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `length` bytes starting at `offset`. Borrowed for Mmap/Memory,
    /// owned for File (a fresh read every call).
    pub fn slice(&self, offset: usize, length: usize) -> Result<Cow<'_, [u8]>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedDatabase);
        }

        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::InvalidDatabase("offset overflow".to_string()))?;
        if end > self.len() {
            return Err(Error::InvalidDatabase(format!(
                "slice [{}, {}) exceeds buffer length {}",
                offset,
                end,
                self.len()
            )));
        }

        match &self.backend {
            Backend::Mmap(m) => Ok(Cow::Borrowed(&m[offset..end])),
            Backend::Memory(v) => Ok(Cow::Borrowed(&v[offset..end])),
            Backend::File { handle, .. } => {
                let mut buf = vec![0u8; length];
                let mut file = handle
                    .lock()
                    .map_err(|_| Error::InvalidDatabase("file handle mutex poisoned".to_string()))?;
                file.seek(SeekFrom::Start(offset as u64))
                    .map_err(|e| Error::InvalidDatabase(e.to_string()))?;
                file.read_exact(&mut buf)
                    .map_err(|e| Error::InvalidDatabase(e.to_string()))?;
                Ok(Cow::Owned(buf))
            }
        }
    }

    /// Release the backing resource. Idempotent; safe to call while other
    /// threads hold references to this `Buffer` (they observe `closed` on
    /// their next `slice` call rather than racing the drop of the backend).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.display().to_string()),
        _ => Error::InvalidDatabase(format!("failed to open {}: {}", path.display(), e)),
    })
}
