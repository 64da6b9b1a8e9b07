//! Growable interleaved PCM output buffer.

use std::collections::TryReserveError;

#[derive(thiserror::Error, Debug)]
pub enum PcmError {
    #[error("{requested} samples exceed the {limit}-sample limit")]
    LimitExceeded { requested: usize, limit: usize },

    #[error(transparent)]
    Alloc(#[from] TryReserveError),
}

/// Owned output buffer that decoders write into directly.
///
/// `capacity()` is the number of writable slots; `len()` is the number of
/// committed samples. The region past `len()` is exposed through [`tail_mut`]
/// so a decoder can write a frame in place before it is committed.
///
/// [`tail_mut`]: PcmBuffer::tail_mut
#[derive(Debug)]
pub struct PcmBuffer {
    data: Vec<i16>,
    used: usize,
    growths: usize,
    limit: usize,
}

impl PcmBuffer {
    /// Allocate `capacity` writable slots, reporting allocation failure instead of aborting.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, PcmError> {
        Self::try_with_limit(capacity, usize::MAX)
    }

    /// Like [`try_with_capacity`](PcmBuffer::try_with_capacity), but the buffer
    /// never holds more than `limit` slots.
    pub fn try_with_limit(capacity: usize, limit: usize) -> Result<Self, PcmError> {
        if capacity > limit {
            return Err(PcmError::LimitExceeded {
                requested: capacity,
                limit,
            });
        }
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)?;
        data.resize(capacity, 0);
        Ok(Self {
            data,
            used: 0,
            growths: 0,
            limit,
        })
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of times the capacity was doubled.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn headroom(&self) -> usize {
        self.data.len() - self.used
    }

    /// Double the capacity until at least `n` slots are free.
    ///
    /// Does nothing when the headroom already suffices. Growth stops at the
    /// buffer's limit. On failure the buffer keeps its previous allocation and
    /// contents.
    pub fn ensure_headroom(&mut self, n: usize) -> Result<(), PcmError> {
        if self.headroom() >= n {
            return Ok(());
        }
        let mut target = self.data.len().max(1);
        let mut doublings = 0;
        while target - self.used < n && target < self.limit {
            target = target.saturating_mul(2);
            doublings += 1;
        }
        target = target.min(self.limit);
        if target - self.used < n {
            return Err(PcmError::LimitExceeded {
                requested: self.used.saturating_add(n),
                limit: self.limit,
            });
        }
        self.data.try_reserve_exact(target - self.data.len())?;
        self.data.resize(target, 0);
        self.growths += doublings;
        tracing::trace!(capacity = target, used = self.used, "pcm buffer grown");
        Ok(())
    }

    /// Writable region after the committed samples.
    pub fn tail_mut(&mut self) -> &mut [i16] {
        &mut self.data[self.used..]
    }

    /// Mark `n` samples written through [`tail_mut`](PcmBuffer::tail_mut) as committed.
    pub fn commit(&mut self, n: usize) {
        self.used = (self.used + n).min(self.data.len());
    }

    /// Copy `samples` after the committed region and commit them.
    ///
    /// The caller must have ensured enough headroom.
    pub fn push_slice(&mut self, samples: &[i16]) {
        let n = samples.len().min(self.headroom());
        self.tail_mut()[..n].copy_from_slice(&samples[..n]);
        self.commit(n);
    }

    /// Committed samples.
    pub fn as_slice(&self) -> &[i16] {
        &self.data[..self.used]
    }

    /// Shrink the allocation to the committed length and return it.
    pub fn into_vec(mut self) -> Vec<i16> {
        self.data.truncate(self.used);
        self.data.shrink_to_fit();
        self.data
    }
}
