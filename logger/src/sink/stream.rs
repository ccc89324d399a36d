use super::Sink;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Standard stream a [`StreamSink`] writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

/// Writes lines to stdout or stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamSink {
    stream: OutputStream,
}

impl StreamSink {
    /// Creates a sink for the given stream.
    #[must_use]
    pub fn new(stream: OutputStream) -> Self {
        Self { stream }
    }

    /// Returns the target stream.
    #[must_use]
    pub fn stream(&self) -> OutputStream {
        self.stream
    }
}

impl Sink for StreamSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        match self.stream {
            OutputStream::Stdout => writeln!(io::stdout().lock(), "{line}"),
            OutputStream::Stderr => writeln!(io::stderr().lock(), "{line}"),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream {
            OutputStream::Stdout => io::stdout().flush(),
            OutputStream::Stderr => io::stderr().flush(),
        }
    }
}
