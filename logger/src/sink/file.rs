//! File sinks with size- and time-based rollover.

use super::Sink;
use jsonlog_shared::config::{canonical_interval, ConfigError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

#[derive(Debug)]
struct OpenFile {
    file: Option<File>,
    size: u64,
}

/// Appends lines to a file, rolling it over once it reaches `max_bytes`.
///
/// On rollover `app.log` becomes `app.log.1`, `app.log.1` becomes
/// `app.log.2` and so on; files beyond `backup_count` are deleted. When
/// either `max_bytes` or `backup_count` is zero the file never rolls over.
#[derive(Debug)]
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    state: Mutex<OpenFile>,
}

impl RotatingFileSink {
    /// Opens (or creates) the file in append mode, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: u32) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            backup_count,
            state: Mutex::new(OpenFile {
                file: Some(file),
                size,
            }),
        })
    }

    /// Returns the path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn should_roll_over(&self, current: u64, incoming: u64) -> bool {
        self.max_bytes > 0 && self.backup_count > 0 && current > 0 && current + incoming >= self.max_bytes
    }

    fn roll_over(&self, state: &mut OpenFile) -> io::Result<()> {
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }

        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        state.file = Some(open_append(&self.path)?);
        state.size = 0;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let incoming = line.len() as u64 + 1;

        if self.should_roll_over(state.size, incoming) {
            self.roll_over(&mut state)?;
        }

        let file = match state.file.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::new(io::ErrorKind::BrokenPipe, "log file is closed")),
        };
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        state.size += incoming;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Appends lines to a file that rolls over on a clock boundary.
///
/// Files are named `<file name>.<date>` with the date granularity of the
/// interval (`minute`, `hour`, `daily`/`midnight`); `never` writes to the
/// bare file name. At most `backup_count` previous files are kept.
pub struct TimedRotatingFileSink {
    path: PathBuf,
    appender: Mutex<Option<RollingFileAppender>>,
}

impl std::fmt::Debug for TimedRotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedRotatingFileSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TimedRotatingFileSink {
    /// Opens a time-rotated file.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown intervals or if the file cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>, when: &str, backup_count: u32) -> io::Result<Self> {
        let path = path.into();
        let rotation = rotation_for(when)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?
            .to_string_lossy()
            .into_owned();

        fs::create_dir_all(directory)?;
        let mut builder = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(prefix);
        if backup_count > 0 {
            // The active file counts towards the limit.
            builder = builder.max_log_files(backup_count as usize + 1);
        }
        let appender = builder.build(directory).map_err(io::Error::other)?;

        Ok(Self {
            path,
            appender: Mutex::new(Some(appender)),
        })
    }

    /// Returns the configured base path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for TimedRotatingFileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut appender = self.appender.lock().unwrap_or_else(PoisonError::into_inner);
        let appender = appender
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "log file is closed"))?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        appender.write_all(&buf)
    }

    fn flush(&self) -> io::Result<()> {
        let mut appender = self.appender.lock().unwrap_or_else(PoisonError::into_inner);
        match appender.as_mut() {
            Some(appender) => appender.flush(),
            None => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        let mut appender = self.appender.lock().unwrap_or_else(PoisonError::into_inner);
        match appender.take() {
            Some(mut appender) => appender.flush(),
            None => Ok(()),
        }
    }
}

fn rotation_for(when: &str) -> Result<Rotation, ConfigError> {
    match canonical_interval(when) {
        Some("minute") => Ok(Rotation::MINUTELY),
        Some("hour") => Ok(Rotation::HOURLY),
        Some("daily" | "midnight") => Ok(Rotation::DAILY),
        Some("never") => Ok(Rotation::NEVER),
        _ => Err(ConfigError::InvalidRotationInterval(when.to_string())),
    }
}
