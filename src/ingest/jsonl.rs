use std::io::{self, BufRead};

use crate::frame::FrameRecord;

/// Reads one `FrameRecord` per non-blank JSON line.
///
/// Lines are read as raw bytes, so a line that is not valid UTF-8 is skipped
/// like any other unparsable line instead of ending the stream.
pub struct FrameRecordReader<R> {
    reader: R,
    line_no: usize,
    buf: Vec<u8>,
    skipped: usize,
}

impl<R: BufRead> FrameRecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: Vec::new(),
            skipped: 0,
        }
    }

    /// Lines dropped because they were not valid frame records.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for FrameRecordReader<R> {
    type Item = io::Result<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line_no += 1;
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<FrameRecord>(&self.buf) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("skipping line {}: invalid frame record: {}", self.line_no, e);
                }
            }
        }
    }
}

pub fn read_frame_records<R: BufRead>(reader: R) -> FrameRecordReader<R> {
    FrameRecordReader::new(reader)
}
