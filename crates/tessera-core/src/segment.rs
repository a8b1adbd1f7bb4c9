//! Cursors over logically-contiguous byte streams split into arbitrary
//! physical segments.
//!
//! The engine walks two such streams in lock-step: the data stream (read
//! only) and the protection-metadata stream (read for verify, read/write for
//! generate and remap). Segments are caller-owned spans; the cursors never
//! allocate or free them, and zero-length segments are skipped
//! transparently.
//!
//! Tuple location: when the next tuple fits entirely inside the current
//! segment, [`SegmentReader::with_tuple`] / [`SegmentWriter::with_tuple`]
//! hand the closure a direct reference into that segment. When the tuple
//! straddles a segment boundary, the bytes are staged through a stack-local
//! buffer; the closure-scoped shape guarantees the copy-back to the
//! underlying segments happens on every exit path. The fallback is taken
//! only at segment boundaries, which are rare relative to total intervals.

use tessera_types::MAX_TUPLE_SIZE;

/// A stream ran out of bytes mid-operation. Carries the sizes the engine
/// needs to build its caller-facing contract error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    /// Bytes the operation needed from the current position.
    pub needed: usize,
    /// Bytes actually available from the current position.
    pub available: usize,
}

/// Read-only cursor over a segmented byte stream.
#[derive(Debug)]
pub struct SegmentReader<'a> {
    segments: &'a [&'a [u8]],
    index: usize,
    offset: usize,
}

impl<'a> SegmentReader<'a> {
    /// Position the cursor at the start of the stream.
    #[must_use]
    pub fn new(segments: &'a [&'a [u8]]) -> Self {
        let mut reader = Self {
            segments,
            index: 0,
            offset: 0,
        };
        reader.normalize();
        reader
    }

    fn normalize(&mut self) {
        while self.index < self.segments.len() && self.offset >= self.segments[self.index].len() {
            self.index += 1;
            self.offset = 0;
        }
    }

    /// Bytes left before the end of the stream.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.index >= self.segments.len() {
            return 0;
        }
        let current = self.segments[self.index].len() - self.offset;
        let rest: usize = self.segments[self.index + 1..]
            .iter()
            .map(|seg| seg.len())
            .sum();
        current + rest
    }

    /// Bytes left in the current physical segment.
    #[must_use]
    pub fn contiguous(&self) -> usize {
        if self.index >= self.segments.len() {
            0
        } else {
            self.segments[self.index].len() - self.offset
        }
    }

    /// Consume and return the next contiguous run of up to `max` bytes.
    /// Returns an empty slice only when the stream is exhausted.
    pub fn take(&mut self, max: usize) -> &'a [u8] {
        if max == 0 || self.index >= self.segments.len() {
            return &[];
        }
        let segment = self.segments[self.index];
        let end = segment.len().min(self.offset + max);
        let run = &segment[self.offset..end];
        self.offset = end;
        self.normalize();
        run
    }

    /// Consume `len` bytes, handing each contiguous run to `visit`.
    pub fn visit<F: FnMut(&[u8])>(&mut self, len: usize, mut visit: F) -> Result<(), Exhausted> {
        let available = self.remaining();
        if available < len {
            return Err(Exhausted {
                needed: len,
                available,
            });
        }
        let mut left = len;
        while left > 0 {
            let run = self.take(left);
            visit(run);
            left -= run.len();
        }
        Ok(())
    }

    /// Consume `len` bytes without inspecting them.
    pub fn skip(&mut self, len: usize) -> Result<(), Exhausted> {
        self.visit(len, |_| {})
    }

    /// Locate the next `len`-byte tuple and hand its bytes to `read`.
    ///
    /// Contiguous case borrows directly from the segment; the straddling
    /// case stages through a stack buffer. Either way the cursor advances
    /// past the tuple.
    pub fn with_tuple<T>(
        &mut self,
        len: usize,
        read: impl FnOnce(&[u8]) -> T,
    ) -> Result<T, Exhausted> {
        debug_assert!(len <= MAX_TUPLE_SIZE);
        if self.contiguous() >= len {
            let segment = self.segments[self.index];
            let window = &segment[self.offset..self.offset + len];
            self.offset += len;
            self.normalize();
            return Ok(read(window));
        }
        let available = self.remaining();
        if available < len {
            return Err(Exhausted {
                needed: len,
                available,
            });
        }
        let mut staged = [0_u8; MAX_TUPLE_SIZE];
        let mut filled = 0;
        while filled < len {
            let run = self.take(len - filled);
            staged[filled..filled + run.len()].copy_from_slice(run);
            filled += run.len();
        }
        Ok(read(&staged[..len]))
    }
}

/// Mutable cursor over a segmented byte stream.
#[derive(Debug)]
pub struct SegmentWriter<'s, 'b> {
    segments: &'s mut [&'b mut [u8]],
    index: usize,
    offset: usize,
}

impl<'s, 'b> SegmentWriter<'s, 'b> {
    /// Position the cursor at the start of the stream.
    #[must_use]
    pub fn new(segments: &'s mut [&'b mut [u8]]) -> Self {
        let mut writer = Self {
            segments,
            index: 0,
            offset: 0,
        };
        writer.normalize();
        writer
    }

    fn normalize(&mut self) {
        while self.index < self.segments.len() && self.offset >= self.segments[self.index].len() {
            self.index += 1;
            self.offset = 0;
        }
    }

    fn advance(&mut self, len: usize) {
        self.offset += len;
        self.normalize();
    }

    /// Bytes left before the end of the stream.
    #[must_use]
    pub fn remaining(&self) -> usize {
        if self.index >= self.segments.len() {
            return 0;
        }
        let current = self.segments[self.index].len() - self.offset;
        let rest: usize = self.segments[self.index + 1..]
            .iter()
            .map(|seg| seg.len())
            .sum();
        current + rest
    }

    /// Bytes left in the current physical segment.
    #[must_use]
    pub fn contiguous(&self) -> usize {
        if self.index >= self.segments.len() {
            0
        } else {
            self.segments[self.index].len() - self.offset
        }
    }

    /// Consume `len` bytes, handing each contiguous run to `visit`
    /// read-only. Used to mix metadata padding into the guard without
    /// surrendering write access to the stream.
    pub fn visit<F: FnMut(&[u8])>(&mut self, len: usize, mut visit: F) -> Result<(), Exhausted> {
        let available = self.remaining();
        if available < len {
            return Err(Exhausted {
                needed: len,
                available,
            });
        }
        let mut left = len;
        while left > 0 {
            let run_len = self.contiguous().min(left);
            visit(&self.segments[self.index][self.offset..self.offset + run_len]);
            self.advance(run_len);
            left -= run_len;
        }
        Ok(())
    }

    /// Consume `len` bytes without inspecting them.
    pub fn skip(&mut self, len: usize) -> Result<(), Exhausted> {
        self.visit(len, |_| {})
    }

    /// Locate the next `len`-byte tuple and hand its bytes to `access` for
    /// reading and/or rewriting.
    ///
    /// Contiguous case operates directly on the segment (zero-copy). The
    /// straddling case copies the window into a stack buffer, runs the
    /// closure, and copies the (possibly modified) bytes back across the
    /// boundary before returning; the copy-back cannot be skipped by any
    /// exit path because the closure has already returned by then.
    pub fn with_tuple<T>(
        &mut self,
        len: usize,
        access: impl FnOnce(&mut [u8]) -> T,
    ) -> Result<T, Exhausted> {
        debug_assert!(len <= MAX_TUPLE_SIZE);
        if self.contiguous() >= len {
            let start = self.offset;
            let out = access(&mut self.segments[self.index][start..start + len]);
            self.advance(len);
            return Ok(out);
        }
        let available = self.remaining();
        if available < len {
            return Err(Exhausted {
                needed: len,
                available,
            });
        }

        // Stage the straddling window through a stack buffer.
        let mark = (self.index, self.offset);
        let mut staged = [0_u8; MAX_TUPLE_SIZE];
        let mut filled = 0;
        while filled < len {
            let run_len = self.contiguous().min(len - filled);
            staged[filled..filled + run_len]
                .copy_from_slice(&self.segments[self.index][self.offset..self.offset + run_len]);
            self.advance(run_len);
            filled += run_len;
        }

        let out = access(&mut staged[..len]);

        // Copy back whatever the closure left in the window.
        (self.index, self.offset) = mark;
        let mut written = 0;
        while written < len {
            let run_len = self.contiguous().min(len - written);
            self.segments[self.index][self.offset..self.offset + run_len]
                .copy_from_slice(&staged[written..written + run_len]);
            self.advance(run_len);
            written += run_len;
        }
        Ok(out)
    }
}
