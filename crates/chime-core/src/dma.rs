//! DMA-capable buffer accounting
//!
//! Wave buffers handed to the DSP must live in the console's linear
//! heap, a fixed-size region shared with other DMA users. [`DmaHeap`]
//! models that region: allocations fail once the region is exhausted,
//! and the outstanding byte count is observable, which lets tests
//! prove that streaming sessions return their chunk buffers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{AudioError, AudioResult};

#[derive(Debug)]
struct HeapInner {
    capacity: usize,
    used: AtomicUsize,
}

/// Handle to the linear heap. Cloning shares the same accounting.
#[derive(Debug, Clone)]
pub struct DmaHeap {
    inner: Arc<HeapInner>,
}

impl DmaHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HeapInner {
                capacity,
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocate a zeroed buffer, failing when the heap has less than
    /// `len` bytes free.
    pub fn alloc(&self, len: usize) -> AudioResult<DmaBuffer> {
        let mut used = self.inner.used.load(Ordering::Relaxed);
        loop {
            if len > self.inner.capacity - used {
                return Err(AudioError::OutOfDmaMemory {
                    requested: len,
                    available: self.inner.capacity - used,
                });
            }
            match self.inner.used.compare_exchange_weak(
                used,
                used + len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => used = current,
            }
        }
        Ok(DmaBuffer {
            bytes: vec![0u8; len].into_boxed_slice(),
            heap: Arc::clone(&self.inner),
        })
    }

    /// Bytes currently allocated out of the heap
    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// Bytes still available
    pub fn available(&self) -> usize {
        self.inner.capacity - self.used()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// Owned byte buffer carved out of the DMA heap.
///
/// Returns its bytes to the heap when dropped.
#[derive(Debug)]
pub struct DmaBuffer {
    bytes: Box<[u8]>,
    heap: Arc<HeapInner>,
}

impl DmaBuffer {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        self.heap.used.fetch_sub(self.bytes.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_release_accounting() {
        let heap = DmaHeap::new(1024);
        assert_eq!(heap.used(), 0);

        let a = heap.alloc(256).unwrap();
        let b = heap.alloc(512).unwrap();
        assert_eq!(heap.used(), 768);
        assert_eq!(heap.available(), 256);
        assert_eq!(a.len(), 256);

        drop(a);
        assert_eq!(heap.used(), 512);
        drop(b);
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_exhaustion() {
        let heap = DmaHeap::new(100);
        let _a = heap.alloc(80).unwrap();
        let err = heap.alloc(40).unwrap_err();
        assert!(matches!(
            err,
            AudioError::OutOfDmaMemory {
                requested: 40,
                available: 20
            }
        ));
    }

    #[test]
    fn test_buffers_are_zeroed() {
        let heap = DmaHeap::new(64);
        let buf = heap.alloc(64).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shared_accounting_across_clones() {
        let heap = DmaHeap::new(128);
        let other = heap.clone();
        let _buf = other.alloc(100).unwrap();
        assert_eq!(heap.used(), 100);
    }
}
