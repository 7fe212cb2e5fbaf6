//! Frame record transport.
//!
//! Upstream producers publish one JSON object per frame. This module turns a
//! line-oriented stream of those objects into `FrameRecord`s and chops the
//! stream into fixed-size batches for the pipeline.
//!
//! The transport layer is responsible for:
//! - Skipping lines that do not parse (with a line number in the log)
//! - Surfacing read errors from the underlying stream
//!
//! It does not order, deduplicate or validate pixel payloads; that is the
//! reconciler's job.

mod jsonl;

use anyhow::{anyhow, Result};

pub use jsonl::{read_frame_records, FrameRecordReader};

/// Iterator adapter yielding `Vec`s of up to `size` items.
pub struct Batches<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Group `items` into batches of `size`; the last batch may be shorter.
pub fn batches<I: IntoIterator>(items: I, size: usize) -> Result<Batches<I::IntoIter>> {
    if size == 0 {
        return Err(anyhow!("batch size must be greater than zero"));
    }
    Ok(Batches {
        inner: items.into_iter(),
        size,
    })
}
