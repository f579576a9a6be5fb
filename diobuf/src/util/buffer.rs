use std::{
    alloc::{self, Layout},
    ops::{Deref, DerefMut},
};

use crate::error::Error;

/// Heap region whose start address is a multiple of the requested block
/// size. The region is never reallocated, so the alignment established
/// here holds for its whole lifetime.
#[derive(Debug)]
pub struct AlignedVec {
    ptr: *mut u8,
    layout: Layout,
}

impl AlignedVec {
    pub fn new(size: usize, block_size: usize) -> Result<Self, Error> {
        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(Error::InvalidBlockSize(block_size));
        }
        if size == 0 {
            return Err(Error::InvalidCapacity(size));
        }
        let layout =
            Layout::from_size_align(size, block_size).map_err(|_| Error::InvalidCapacity(size))?;

        // SAFETY: layout has a nonzero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::AllocationFailed);
        }
        if ptr as usize % block_size != 0 {
            // The allocator broke its own contract.
            unsafe { alloc::dealloc(ptr, layout) };
            return Err(Error::AllocationFailed);
        }
        Ok(Self { ptr, layout })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Start address of the region, for alignment checks.
    pub fn addr(&self) -> usize {
        self.ptr as usize
    }
}

impl Deref for AlignedVec {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        // SAFETY: ptr is valid for layout.size() bytes for the lifetime
        // of self.
        unsafe { std::slice::from_raw_parts(self.ptr, self.layout.size()) }
    }
}

impl DerefMut for AlignedVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: same as Deref, and we hold the only reference.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.layout.size()) }
    }
}

impl Drop for AlignedVec {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with this exact layout.
        unsafe { alloc::dealloc(self.ptr, self.layout) };
    }
}

// SAFETY: AlignedVec is a uniquely owned heap region.
unsafe impl Send for AlignedVec {}

/// Fixed-capacity staging buffer over an [`AlignedVec`], tracking how
/// many valid bytes sit at offset 0.
#[derive(Debug)]
pub struct Buffer {
    vec: AlignedVec,
    cap: usize,
    size: usize,
}

impl Buffer {
    pub fn new(cap: usize, block_size: usize) -> Result<Self, Error> {
        let vec = AlignedVec::new(cap, block_size)?;
        Ok(Self { vec, cap, size: 0 })
    }

    /// Copies as much of `data` as fits, returning the number of bytes
    /// taken.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let take = data.len().min(self.cap - self.size);
        self.vec[self.size..self.size + take].copy_from_slice(&data[..take]);
        self.size += take;
        take
    }

    /// Drops the first `n` staged bytes and shifts the remainder to the
    /// front.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.size);
        if n == 0 {
            return;
        }
        self.vec.copy_within(n..self.size, 0);
        self.size -= n;
    }

    pub fn available(&self) -> usize {
        self.cap - self.size
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn filled(&self) -> &[u8] {
        &self.vec[..self.size]
    }

    pub fn clear(&mut self) {
        self.size = 0;
    }

    pub fn start_addr(&self) -> usize {
        self.vec.addr()
    }
}
