//! Output file owned by one exporter

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use bigexport_core::{ExportError, Format, Result};
use tracing::debug;

/// The file an exporter writes to.
///
/// Created at `start_exporting`; encoders take the handle at their first
/// flush. Closed once.
#[derive(Debug)]
pub struct FileSink {
    format: Format,
    path: PathBuf,
    file: Option<File>,
    opened: bool,
}

impl FileSink {
    pub fn new(format: Format, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
            file: None,
            opened: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, action: &str, err: std::io::Error) -> ExportError {
        ExportError::backend_write(
            self.format,
            format!("failed to {} {}: {}", action, self.path.display(), err),
        )
    }

    /// Create or truncate the file, creating parent directories as needed
    pub fn open(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.error("create directory for", e))?;
            }
        }
        let file = File::create(&self.path).map_err(|e| self.error("create", e))?;
        debug!(path = %self.path.display(), "Opened output file");
        self.file = Some(file);
        self.opened = true;
        Ok(())
    }

    /// Hand the open file to an encoder
    pub fn take(&mut self) -> Result<File> {
        self.file.take().ok_or_else(|| {
            ExportError::backend_write(
                self.format,
                format!("output file {} is not open", self.path.display()),
            )
        })
    }

    /// Open the already-written file again for appending
    pub fn reopen_append(&self) -> Result<File> {
        if !self.opened {
            return Err(ExportError::backend_write(
                self.format,
                format!("output file {} was never opened", self.path.display()),
            ));
        }
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error("reopen", e))
    }

    /// Sync a handle returned by an encoder
    pub fn sync(&self, file: File) -> Result<()> {
        file.sync_all().map_err(|e| self.error("sync", e))
    }

    /// Close the handle if nobody took it
    pub fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => self.sync(file),
            None => Ok(()),
        }
    }
}
