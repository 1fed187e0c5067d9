use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::*;

/// Source of the blocks handed to the release routine
///
/// # Safety
/// `allocate` must return a writable region of at least `size` bytes that stays valid until it is passed
/// to `release` on the same allocator.
pub unsafe trait Allocator {
    /// Returns `None` when the allocator is out of memory
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must have been returned by `allocate` on this allocator and must not have been released yet.
    /// It can't be used after this call.
    unsafe fn release(&self, ptr: NonNull<u8>);
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { (**self).release(ptr) }
    }
}

/// The C heap (`malloc` / `free`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CHeap;

unsafe impl Allocator for CHeap {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // malloc(0) may legally return null
        let ptr = unsafe { libc::malloc(size.max(1)) };
        NonNull::new(ptr.cast())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { libc::free(ptr.as_ptr().cast()) }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    allocations: usize,
    /// address -> size of the blocks that were handed out and not released yet
    live: HashMap<usize, usize>,
    /// every release request, in order, including the ones that were refused
    releases: Vec<usize>,
}

/// Wraps an allocator and records every allocation and release that goes through it.
///
/// Releasing a block that isn't live (a double free or a foreign pointer) is recorded, logged and not
/// forwarded to the inner allocator.
#[derive(Debug, Default)]
pub struct Tracking<A: Allocator = CHeap> {
    inner: A,
    ledger: Mutex<Ledger>,
}

impl<A: Allocator> Tracking<A> {
    pub fn new(inner: A) -> Self {
        Tracking { inner, ledger: Mutex::new(Ledger::default()) }
    }

    // The ledger stays consistent even if a panic happened while it was locked
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successful allocations
    pub fn allocations(&self) -> usize {
        self.ledger().allocations
    }

    /// Number of release requests, including refused ones
    pub fn releases(&self) -> usize {
        self.ledger().releases.len()
    }

    /// How many times a release was requested for `addr`, over the whole history of this allocator.
    ///
    /// The inner allocator may hand out a released address again, so the count includes releases of
    /// earlier blocks that lived at the same address. Compare against a count taken before the block was
    /// allocated to look at one block only.
    pub fn releases_of(&self, addr: usize) -> usize {
        self.ledger().releases.iter().filter(|released| **released == addr).count()
    }

    /// Addresses of all release requests, in call order
    pub fn release_log(&self) -> Vec<usize> {
        self.ledger().releases.clone()
    }

    pub fn is_live(&self, addr: usize) -> bool {
        self.ledger().live.contains_key(&addr)
    }

    /// Number of blocks that were allocated and not released yet
    pub fn live(&self) -> usize {
        self.ledger().live.len()
    }
}

unsafe impl<A: Allocator> Allocator for Tracking<A> {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(size)?;
        let mut ledger = self.ledger();
        ledger.allocations += 1;
        ledger.live.insert(ptr.as_ptr() as usize, size);
        trace!("Allocated {} bytes at {:p}", size, ptr);
        Some(ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        let forward = {
            let mut ledger = self.ledger();
            ledger.releases.push(addr);
            ledger.live.remove(&addr).is_some()
        };

        if forward {
            trace!("Released block at {:p}", ptr);
            unsafe { self.inner.release(ptr) }
        } else {
            warn!("Refusing to release {:p}: not a live block of this allocator", ptr);
        }
    }
}
