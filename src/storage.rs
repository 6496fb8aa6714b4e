// src/storage.rs
//
// Externally-owned sample storage.
//
// The host owns the buffer and may read it (for display, saving, ...)
// between audio blocks. The looper acquires it once per block with a
// non-blocking lock, so a contended buffer costs one silent block rather
// than a stalled audio thread.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{LooperError, Result};

/// A named, fixed-length mono sample buffer shared between host and looper.
///
/// Share it with `Arc<SampleBuffer>`.
#[derive(Debug)]
pub struct SampleBuffer {
    name: String,
    frames: usize,
    samples: Mutex<Vec<f32>>,
    dirty: AtomicBool,
    valid: AtomicBool,
}

impl SampleBuffer {
    /// Create a silent buffer of `frames` samples.
    pub fn new(name: impl Into<String>, frames: usize) -> Self {
        Self::from_samples(name, vec![0.0; frames])
    }

    /// Wrap existing sample data.
    pub fn from_samples(name: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            frames: samples.len(),
            samples: Mutex::new(samples),
            dirty: AtomicBool::new(false),
            valid: AtomicBool::new(true),
        }
    }

    /// Create a buffer holding `seconds` of audio at `sample_rate`.
    pub fn with_duration(name: impl Into<String>, sample_rate: f64, seconds: f64) -> Self {
        Self::new(name, (sample_rate * seconds).max(0.0) as usize)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Acquire the samples for one block without blocking.
    ///
    /// The lock is released when the returned guard drops.
    pub fn lock(&self) -> Result<SampleLock<'_>> {
        if !self.valid.load(Ordering::Acquire) {
            return Err(LooperError::StorageInvalid(self.name.clone()));
        }
        if self.frames == 0 {
            return Err(LooperError::EmptyStorage(self.name.clone()));
        }
        let guard = self
            .samples
            .try_lock()
            .ok_or_else(|| LooperError::StorageBusy(self.name.clone()))?;
        Ok(SampleLock { guard })
    }

    /// Flag the contents as modified since the host last looked.
    #[inline]
    pub fn set_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Read and clear the dirty flag.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Mark the buffer unusable (host freed or is rebuilding it).
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn restore(&self) {
        self.valid.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Copy of the current contents. Blocks; host side only.
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples.lock().clone()
    }
}

/// Scoped access to a locked `SampleBuffer`.
pub struct SampleLock<'a> {
    guard: MutexGuard<'a, Vec<f32>>,
}

impl Deref for SampleLock<'_> {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &[f32] {
        &self.guard
    }
}

impl DerefMut for SampleLock<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.guard
    }
}
