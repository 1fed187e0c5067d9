use std::ffi::{CStr, c_void};
use std::io::{self, Write};
use std::ptr::NonNull;

use log::*;

use crate::allocator::{Allocator, CHeap};
use crate::Error;

/// Writes the two diagnostic lines announcing the release of the block at `ptr`:
///
/// ```text
/// Freeing memory at 0x<ADDRESS>...  Value was "<TEXT>"
/// ```
///
/// # Safety
/// `ptr` must point to null-terminated text
pub unsafe fn write_release_notice<W: Write + ?Sized>(out: &mut W, ptr: NonNull<c_void>) -> io::Result<()> {
    let text = unsafe { CStr::from_ptr(ptr.as_ptr().cast()) };
    write!(out, "Freeing memory at 0x{:X}...  ", ptr.as_ptr() as usize)?;
    out.write_all(b"Value was \"")?;
    out.write_all(text.to_bytes())?;
    out.write_all(b"\"\n")?;
    out.flush()
}

/// Announce the release of the block at `ptr` on `out`, then give it back to `allocator`.
///
/// The block is released even when writing the diagnostics fails; the write error is returned afterwards.
/// A null `ptr` is rejected with [`Error::NullBlock`] before anything is written.
///
/// # Safety
/// `ptr` must have been allocated by `allocator`, must not have been released yet and must hold
/// null-terminated text. It is invalid after this call returns, whatever the result.
pub unsafe fn release_with<A, W>(ptr: *mut c_void, allocator: &A, out: &mut W) -> crate::Result<()>
where
    A: Allocator + ?Sized,
    W: Write + ?Sized,
{
    let Some(ptr) = NonNull::new(ptr) else {
        return Err(Error::NullBlock);
    };

    let written = unsafe { write_release_notice(out, ptr) };
    trace!("Releasing block at {:p}", ptr);
    unsafe { allocator.release(ptr.cast()) };

    written.map_err(Error::DiagnosticWriteError)
}

/// [`release_with`] that reports failures as warnings instead of returning them. Null is a no-op.
///
/// # Safety
/// `ptr` must be null, or satisfy the contract of [`release_with`]
pub unsafe fn free_memory_with<A, W>(ptr: *mut c_void, allocator: &A, out: &mut W)
where
    A: Allocator + ?Sized,
    W: Write + ?Sized,
{
    match unsafe { release_with(ptr, allocator, out) } {
        Ok(()) => {},
        Err(Error::NullBlock) => warn!("Ignoring release of a null block"),
        Err(err) => warn!("{}", err),
    }
}

/// Release a block allocated on the C heap, announcing it on standard output first.
///
/// Null is a no-op (a warning is logged).
///
/// # Safety
/// `ptr` must be null, or come from `malloc`, not be released yet and hold null-terminated text.
/// Passing the same block twice is a double free.
pub unsafe fn free_memory(ptr: *mut c_void) {
    let stdout = io::stdout();
    unsafe { free_memory_with(ptr, &CHeap, &mut stdout.lock()) }
}
