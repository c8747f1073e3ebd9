//! Bounded accumulation of a streamed body into one contiguous buffer.
//!
//! Bodies arrive in any number of chunks and their total length may be
//! unknown (chunked transfer).  [`BodyAccumulator`] fixes a capacity ceiling
//! up front and refuses, chunk by chunk, anything that would cross it.

use crate::error::JwtError;

const INITIAL_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Empty,
    Accumulating,
    Complete,
    /// Terminal: a chunk would have crossed the ceiling.
    Overflow,
}

#[derive(Debug)]
pub struct BodyAccumulator {
    state: AccumulatorState,
    buf: Vec<u8>,
    capacity: usize,
    limit: usize,
    exact: bool,
}

impl Default for BodyAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyAccumulator {
    pub fn new() -> Self {
        Self {
            state: AccumulatorState::Empty,
            buf: Vec::new(),
            capacity: 0,
            limit: 0,
            exact: false,
        }
    }

    /// Fix the capacity for the body about to stream in.
    ///
    /// A declared length above `cap` fails immediately without allocating.
    /// An unknown length gets the whole `cap`.
    pub fn begin(&mut self, expected_length: Option<usize>, cap: usize) -> Result<(), JwtError> {
        if self.state != AccumulatorState::Empty {
            return Err(JwtError::NotReady);
        }
        self.limit = cap;

        match expected_length {
            Some(n) if n > cap => {
                self.state = AccumulatorState::Overflow;
                return Err(JwtError::PayloadTooLarge { limit: cap });
            }
            Some(n) => {
                self.capacity = n;
                self.exact = true;
            }
            None => {
                self.capacity = cap;
                self.exact = false;
            }
        }

        self.state = AccumulatorState::Accumulating;
        Ok(())
    }

    /// Append one chunk.  Either the whole chunk fits or nothing is written.
    pub fn push(&mut self, chunk: &[u8], is_last: bool) -> Result<(), JwtError> {
        match self.state {
            AccumulatorState::Accumulating => {}
            AccumulatorState::Overflow => {
                return Err(JwtError::PayloadTooLarge { limit: self.limit })
            }
            AccumulatorState::Empty | AccumulatorState::Complete => return Err(JwtError::NotReady),
        }

        let needed = match self.buf.len().checked_add(chunk.len()) {
            Some(n) if n <= self.capacity => n,
            _ => {
                self.state = AccumulatorState::Overflow;
                return Err(JwtError::PayloadTooLarge { limit: self.limit });
            }
        };

        if needed > self.buf.capacity() {
            self.grow(needed);
        }
        self.buf.extend_from_slice(chunk);

        if is_last {
            self.state = AccumulatorState::Complete;
        }
        Ok(())
    }

    fn grow(&mut self, needed: usize) {
        // Known length: one allocation of exactly the declared size.
        let target = if self.exact {
            self.capacity
        } else {
            needed
                .max(self.buf.capacity().saturating_mul(2))
                .max(INITIAL_CAPACITY)
                .min(self.capacity)
        };
        self.buf.reserve_exact(target - self.buf.len());
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Ceiling fixed by [`begin`](Self::begin).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated body.  Only valid once the last chunk was pushed.
    pub fn bytes(&self) -> Result<&[u8], JwtError> {
        match self.state {
            AccumulatorState::Complete => Ok(&self.buf),
            _ => Err(JwtError::NotReady),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, JwtError> {
        match self.state {
            AccumulatorState::Complete => Ok(self.buf),
            _ => Err(JwtError::NotReady),
        }
    }
}
