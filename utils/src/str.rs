use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq)]
pub enum OsStrConversionError {
    /// A nul byte was found at the given position. C text can't contain one.
    InteriorNul(usize),
    /// The string is not valid UTF-8.
    /// Only returned on non-unix platforms
    EncodingError
}

impl std::error::Error for OsStrConversionError {}

impl Display for OsStrConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsStrConversionError::InteriorNul(pos) => f.write_fmt(format_args!("nul byte found in provided data at position: {}", pos)),
            OsStrConversionError::EncodingError => f.write_str("OSString is not valid UTF-8"),
        }
    }
}

/// Position of the first nul byte, if any
#[inline]
pub fn find_nul(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|b| *b == 0)
}

/// The bytes of `osstr`, suitable for storing as C text (without the terminator)
pub fn osstr_to_c_text(osstr: &OsStr) -> Result<Cow<'_, [u8]>, OsStrConversionError> {
    #[cfg(unix)]
    let bytes: &[u8] = {
        use std::os::unix::ffi::OsStrExt;

        osstr.as_bytes()
    };

    #[cfg(not(unix))]
    let bytes: &[u8] = match osstr.to_str() {
        Some(str) => str.as_bytes(),
        None => return Err(OsStrConversionError::EncodingError)
    };

    match find_nul(bytes) {
        Some(pos) => Err(OsStrConversionError::InteriorNul(pos)),
        None => Ok(Cow::Borrowed(bytes))
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    #[test]
    fn plain() {
        let text = osstr_to_c_text(OsStr::new("--greeting")).unwrap();
        assert_eq!(text.as_ref(), b"--greeting");
    }

    #[test]
    fn empty() {
        assert_eq!(osstr_to_c_text(OsStr::new("")).unwrap().as_ref(), b"");
    }

    #[test]
    fn interior_nul() {
        assert_eq!(osstr_to_c_text(OsStr::new("ab\0c")), Err(OsStrConversionError::InteriorNul(2)));
        assert_eq!(
            OsStrConversionError::InteriorNul(2).to_string(),
            "nul byte found in provided data at position: 2"
        );
    }
}
