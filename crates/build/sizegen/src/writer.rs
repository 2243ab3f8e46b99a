//! Where generated files end up.
//!
//! The generator opens one [`FileSink`] per output file through a [`FileWriter`]. The sink
//! must be closed explicitly, and only on close does anything actually happen.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use anyhow::Context as _;
use camino::{Utf8Path, Utf8PathBuf};

/// A file being written.
pub trait FileSink: std::io::Write {
    /// Finishes the file. Must be called exactly once, on every path.
    fn close(self: Box<Self>) -> anyhow::Result<()>;
}

pub trait FileWriter {
    fn for_file(&mut self, path: &Utf8Path) -> anyhow::Result<Box<dyn FileSink>>;
}

// ---

type OnClose = Box<dyn FnOnce(&Utf8Path, String) -> anyhow::Result<()>>;

/// Buffers everything in memory and hands the whole contents over on close.
struct BufferedSink {
    path: Utf8PathBuf,
    buf: Vec<u8>,
    on_close: OnClose,
}

impl BufferedSink {
    fn new(path: &Utf8Path, on_close: OnClose) -> Box<dyn FileSink> {
        Box::new(Self {
            path: path.to_owned(),
            buf: Vec::new(),
            on_close,
        })
    }
}

impl std::io::Write for BufferedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileSink for BufferedSink {
    fn close(self: Box<Self>) -> anyhow::Result<()> {
        let Self {
            path,
            buf,
            on_close,
        } = *self;
        let contents = String::from_utf8(buf).with_context(|| format!("{path} is not UTF-8"))?;
        on_close(&path, contents)
    }
}

// ---

/// Writes to disk.
#[derive(Debug, Default)]
pub struct RealFs;

impl FileWriter for RealFs {
    fn for_file(&mut self, path: &Utf8Path) -> anyhow::Result<Box<dyn FileSink>> {
        Ok(BufferedSink::new(path, Box::new(write_file)))
    }
}

/// Write file if any changes were made and ensure folder hierarchy exists.
pub fn write_file(filepath: &Utf8Path, source: String) -> anyhow::Result<()> {
    if let Ok(existing) = std::fs::read_to_string(filepath) {
        if existing == source {
            // Don't touch the timestamp unnecessarily
            log::info!("{filepath} is up to date");
            return Ok(());
        }
    }

    if let Some(parent_dir) = filepath.parent() {
        std::fs::create_dir_all(parent_dir)
            .with_context(|| format!("Failed to create dir {parent_dir:?}"))?;
    }

    std::fs::write(filepath, source).with_context(|| format!("Failed to write file {filepath:?}"))
}

/// Doesn't write anything: records which files are missing or differ from what is on disk.
#[derive(Debug, Default, Clone)]
pub struct CheckFs {
    stale: Rc<RefCell<Vec<Utf8PathBuf>>>,
}

impl CheckFs {
    /// Files that would have been written, in the order they were closed.
    pub fn stale_files(&self) -> Vec<Utf8PathBuf> {
        self.stale.borrow().clone()
    }
}

impl FileWriter for CheckFs {
    fn for_file(&mut self, path: &Utf8Path) -> anyhow::Result<Box<dyn FileSink>> {
        let stale = Rc::clone(&self.stale);
        Ok(BufferedSink::new(
            path,
            Box::new(move |path: &Utf8Path, contents: String| {
                let up_to_date =
                    std::fs::read_to_string(path).is_ok_and(|existing| existing == contents);
                if !up_to_date {
                    stale.borrow_mut().push(path.to_owned());
                }
                Ok(())
            }),
        ))
    }
}

/// Keeps every written file in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: Rc<RefCell<BTreeMap<Utf8PathBuf, String>>>,
}

impl MemoryFs {
    pub fn files(&self) -> BTreeMap<Utf8PathBuf, String> {
        self.files.borrow().clone()
    }

    pub fn get(&self, path: impl AsRef<Utf8Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }
}

impl FileWriter for MemoryFs {
    fn for_file(&mut self, path: &Utf8Path) -> anyhow::Result<Box<dyn FileSink>> {
        let files = Rc::clone(&self.files);
        Ok(BufferedSink::new(
            path,
            Box::new(move |path: &Utf8Path, contents: String| {
                files.borrow_mut().insert(path.to_owned(), contents);
                Ok(())
            }),
        ))
    }
}
