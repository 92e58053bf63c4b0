// ABOUTME: Line emitters for the destinations a script can write to
// ABOUTME: Provides stdout, file and in-memory sinks behind one trait

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{OutputError, Result};

/// A sink for lines produced by actions
pub trait Emitter: Send {
    /// Write one line. `channel` names the logical stream it belongs to, if any.
    fn emit(&mut self, line: &str, channel: Option<&str>) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct StdoutEmitter {
    out: io::Stdout,
}

impl Default for StdoutEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdoutEmitter {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Emitter for StdoutEmitter {
    fn emit(&mut self, line: &str, _channel: Option<&str>) -> Result<()> {
        let mut handle = self.out.lock();
        writeln!(handle, "{}", line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.lock().flush()?;
        Ok(())
    }
}

pub struct FileEmitter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl FileEmitter {
    pub fn create<P: AsRef<Path>>(path: P, append: bool, create_dirs: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| OutputError::WriteError {
                    message: format!("Failed to create directory {}: {}", parent.display(), e),
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|e| OutputError::WriteError {
                message: format!("Failed to open file {}: {}", path.display(), e),
            })?;

        debug!("Opened output file {} (append: {})", path.display(), append);
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Emitter for FileEmitter {
    fn emit(&mut self, line: &str, _channel: Option<&str>) -> Result<()> {
        writeln!(self.writer, "{}", line).map_err(|e| OutputError::WriteError {
            message: format!("Failed to write to {}: {}", self.path.display(), e),
        })?;
        self.lines += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        info!(
            "Output written to file: {} ({} lines)",
            self.path.display(),
            self.lines
        );
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullEmitter;

impl Emitter for NullEmitter {
    fn emit(&mut self, _line: &str, _channel: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Keeps every emitted line, mostly for tests and the `render` command
#[derive(Debug, Default, Clone)]
pub struct MemoryEmitter {
    entries: Vec<(Option<String>, String)>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, line)| line.as_str()).collect()
    }

    pub fn channel_lines(&self, channel: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(c, _)| c.as_deref() == Some(channel))
            .map(|(_, line)| line.as_str())
            .collect()
    }

    pub fn contents(&self) -> String {
        self.lines().join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&mut self, line: &str, channel: Option<&str>) -> Result<()> {
        self.entries
            .push((channel.map(str::to_string), line.to_string()));
        Ok(())
    }
}
