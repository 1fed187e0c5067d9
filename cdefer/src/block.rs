use std::ffi::{CStr, OsStr, c_char, c_void};
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

use log::*;
use utils::str::{find_nul, osstr_to_c_text};

use crate::allocator::{Allocator, CHeap};
use crate::{Error, free_memory_with, release_with};

/// Null-terminated text owned in allocator memory.
///
/// Dropping a block releases it through [`release_with`], announcing the release on standard output.
pub struct Block<A: Allocator = CHeap> {
    ptr: NonNull<c_char>,
    allocator: A,
}

impl Block<CHeap> {
    /// Copy `text` to the C heap
    pub fn new(text: impl AsRef<[u8]>) -> crate::Result<Block> {
        Self::new_in(text, CHeap)
    }

    pub fn from_os_str(osstr: &OsStr) -> crate::Result<Block> {
        Self::from_os_str_in(osstr, CHeap)
    }
}

impl<A: Allocator> Block<A> {
    pub fn new_in(text: impl AsRef<[u8]>, allocator: A) -> crate::Result<Self> {
        let text = text.as_ref();
        if let Some(pos) = find_nul(text) {
            return Err(Error::InteriorNul(pos));
        }

        let size = text.len() + 1;
        let ptr = allocator.allocate(size).ok_or(Error::AllocationFailed(size))?;
        // SAFETY: the allocator handed out `size` writable bytes
        unsafe {
            ptr::copy_nonoverlapping(text.as_ptr(), ptr.as_ptr(), text.len());
            ptr.as_ptr().add(text.len()).write(0);
        }
        debug!("Allocated block of {} bytes at {:p}", size, ptr);

        Ok(Block { ptr: ptr.cast(), allocator })
    }

    pub fn from_os_str_in(osstr: &OsStr, allocator: A) -> crate::Result<Self> {
        let text = osstr_to_c_text(osstr)?;
        Self::new_in(text, allocator)
    }

    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the block always holds the terminated text it was created with
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    /// Write the text followed by a newline, like C's `puts`
    pub fn write_line<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.as_c_str().to_bytes())?;
        out.write_all(b"\n")
    }

    /// Give up ownership of the memory. The caller becomes responsible for releasing the returned pointer
    /// with the returned allocator (e.g. with [`release_with`], or [`crate::free_memory`] for [`CHeap`]).
    pub fn into_raw(self) -> (*mut c_void, A) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the allocator is moved out exactly once
        let allocator = unsafe { ptr::read(&this.allocator) };
        (this.ptr.as_ptr().cast(), allocator)
    }

    /// Release now, announcing it on `out` instead of standard output
    pub fn release_to<W: Write + ?Sized>(self, out: &mut W) -> crate::Result<()> {
        let (ptr, allocator) = self.into_raw();
        // SAFETY: the pointer came from this allocator and ownership was just taken from the block
        unsafe { release_with(ptr, &allocator, out) }
    }
}

impl<A: Allocator> Drop for Block<A> {
    fn drop(&mut self) {
        let stdout = io::stdout();
        unsafe { free_memory_with(self.ptr.as_ptr().cast(), &self.allocator, &mut stdout.lock()) }
    }
}

impl<A: Allocator> std::fmt::Debug for Block<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Block(0x{:X}, {:?})", self.addr(), self.as_c_str()))
    }
}

#[cfg(test)]
mod tests {
    use crate::allocator::Tracking;

    use super::*;

    #[test]
    fn holds_text() {
        let tracking = Tracking::new(CHeap);
        let block = Block::new_in("hello", &tracking).unwrap();
        assert_eq!(block.as_c_str().to_bytes(), b"hello");
        assert_eq!(block.as_ptr() as usize, block.addr());
        assert!(tracking.is_live(block.addr()));

        let mut out = Vec::new();
        block.write_line(&mut out).unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn rejects_interior_nul() {
        let tracking = Tracking::new(CHeap);
        let res = Block::new_in(b"he\0llo", &tracking);
        assert!(matches!(res, Err(Error::InteriorNul(2))));
        assert_eq!(tracking.allocations(), 0);
    }

    struct Exhausted;

    unsafe impl Allocator for Exhausted {
        fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
            None
        }

        unsafe fn release(&self, _ptr: NonNull<u8>) {
            unreachable!("nothing was ever allocated")
        }
    }

    #[test]
    fn allocation_failure() {
        let res = Block::new_in("hello", Exhausted);
        assert!(matches!(res, Err(Error::AllocationFailed(6))));
        assert_eq!(res.unwrap_err().to_string(), "Couldn't allocate a block of 6 bytes");
    }

    #[test]
    fn drop_releases_once() {
        let tracking = Tracking::new(CHeap);
        let addr = {
            let block = Block::new_in("scoped", &tracking).unwrap();
            block.addr()
        };
        assert_eq!(tracking.releases_of(addr), 1);
        assert_eq!(tracking.live(), 0);
    }

    #[test]
    fn release_to_writer() {
        let tracking = Tracking::new(CHeap);
        let block = Block::new_in("", &tracking).unwrap();
        let addr = block.addr();
        let mut out = Vec::new();
        block.release_to(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), format!("Freeing memory at 0x{:X}...  Value was \"\"\n", addr));
        assert_eq!(tracking.releases(), 1);
    }

    #[test]
    fn into_raw_keeps_block_alive() {
        let tracking = Tracking::new(CHeap);
        let (ptr, allocator) = Block::new_in("raw", &tracking).unwrap().into_raw();
        assert!(tracking.is_live(ptr as usize));
        assert_eq!(tracking.releases(), 0);

        unsafe { release_with(ptr, allocator, &mut io::sink()).unwrap(); }
        assert_eq!(tracking.live(), 0);
    }
}
