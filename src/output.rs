use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only sink for discovered URLs: one URL per line, flushed per line
/// so a killed process keeps everything written so far.
pub struct OutputSink {
    writer: BufWriter<File>,
    echo: bool,
    written: usize,
}

impl OutputSink {
    pub fn append<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            echo: false,
            written: 0,
        })
    }

    /// Also print each URL to stdout as it is written.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn push(&mut self, url: &str) -> io::Result<()> {
        writeln!(self.writer, "{url}")?;
        self.writer.flush()?;
        if self.echo {
            println!("{url}");
        }
        self.written += 1;
        Ok(())
    }

    /// URLs written during this run.
    pub fn written(&self) -> usize {
        self.written
    }
}
