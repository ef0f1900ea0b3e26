use sleuth_engine::{RecordSink, YearRecord};
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordWriteError {
    #[error("failed to encode year record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write year record: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub const fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W, RecordWriteError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    type Error = RecordWriteError;

    fn accept(&mut self, record: &YearRecord) -> Result<(), Self::Error> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}
