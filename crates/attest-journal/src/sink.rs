//! Destinations for audit lines

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Append-only destination for serialized audit records
///
/// Implementations receive one complete record per call, without the
/// trailing newline, and must never reorder or rewrite earlier lines.
pub trait AuditSink: Send {
    /// Append one record
    fn append_line(&mut self, line: &str) -> io::Result<()>;

    /// Push buffered records to durable storage
    fn flush(&mut self) -> io::Result<()>;
}

/// JSON Lines file opened in append mode
///
/// Every record is flushed as soon as it is written.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open (or create) the log file for appending
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines written so far
    pub fn lines(&self) -> io::Result<Vec<String>> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .map_err(|e| io::Error::other(format!("memory sink lock poisoned: {}", e)))
    }
}

impl AuditSink for MemorySink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|e| io::Error::other(format!("memory sink lock poisoned: {}", e)))?;
        lines.push(line.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink shared by several loggers, e.g. sessions writing one audit file
///
/// Each record is appended under the lock, so lines from different
/// sessions never interleave.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn AuditSink>>>,
}

impl SharedSink {
    /// Share `sink` between loggers
    pub fn new(sink: Box<dyn AuditSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    fn with_sink<T>(&self, f: impl FnOnce(&mut dyn AuditSink) -> io::Result<T>) -> io::Result<T> {
        let mut sink = self
            .inner
            .lock()
            .map_err(|e| io::Error::other(format!("shared sink lock poisoned: {}", e)))?;
        f(sink.as_mut())
    }
}

impl AuditSink for SharedSink {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        self.with_sink(|sink| sink.append_line(line))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_sink(|sink| sink.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut sink = FileSink::open(&path).unwrap();
        sink.append_line("{\"a\":1}").unwrap();
        sink.append_line("{\"a\":2}").unwrap();
        sink.flush().unwrap();
        drop(sink);

        // Reopening appends instead of truncating
        let mut sink = FileSink::open(&path).unwrap();
        sink.append_line("{\"a\":3}").unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n");
    }

    #[test]
    fn test_shared_sink_serializes_writers() {
        let memory = MemorySink::new();
        let shared = SharedSink::new(Box::new(memory.clone()));
        let mut a = shared.clone();
        let mut b = shared.clone();
        a.append_line("a1").unwrap();
        b.append_line("b1").unwrap();
        a.append_line("a2").unwrap();
        assert_eq!(memory.lines().unwrap(), vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.append_line("one").unwrap();
        assert_eq!(sink.lines().unwrap(), vec!["one".to_string()]);
    }
}
