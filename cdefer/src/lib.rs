use utils::moduse;

pub mod allocator;
pub mod ffi;
moduse!(error);
moduse!(release);
moduse!(block);
moduse!(defer);

pub mod preface {
    pub use crate::allocator::{Allocator, CHeap, Tracking};
    pub use crate::{Block, Defer, free_memory, free_memory_with, release_with};
}
