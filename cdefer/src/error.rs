use std::io;

use utils::str::OsStrConversionError;

#[derive(thiserror::Error)]
pub enum Error {
    // Release //
    #[error("Can't release a null block reference")]
    NullBlock,
    #[error("Couldn't write release diagnostics: {0}")]
    DiagnosticWriteError(io::Error),

    // Allocation //
    #[error("Couldn't allocate a block of {0} bytes")]
    AllocationFailed(usize),
    #[error("Block text contains a nul byte at position {0}")]
    InteriorNul(usize),
    #[error(transparent)]
    OsStringConversionError(#[from] OsStrConversionError),

    // General Errors //
    #[error("IO Error: {0}")]
    IOError(#[from] io::Error),
}

pub type Result<Success> = std::result::Result<Success, Error>;

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Automatically get propper error messages from main function returning a result
        std::fmt::Display::fmt(self, f)
    }
}
