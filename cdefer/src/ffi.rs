//! C entry points. See `include/cdefer.h`.

use std::ffi::c_void;

/// [`crate::free_memory`] with the C ABI
///
/// # Safety
/// Same contract as [`crate::free_memory`]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cdefer_free_memory(ptr: *mut c_void) {
    unsafe { crate::free_memory(ptr) }
}
