//! Structural pre-check of submitted ZPL.
//!
//! Only the presence of a complete `^XA … ^XZ` pair is checked here. Field
//! level correctness is left to the conversion engine.

use crate::error::ValidationError;

/// Default cap for uploaded payloads (1 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

const START_MARKER: &str = "^XA";
const END_MARKER: &str = "^XZ";

/// Checks that `content` holds at least one complete label block.
pub fn validate(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    let upper = content.to_ascii_uppercase();
    let start = upper
        .find(START_MARKER)
        .ok_or(ValidationError::MissingStartMarker)?;

    if !upper[start + START_MARKER.len()..].contains(END_MARKER) {
        return Err(ValidationError::MissingEndMarker);
    }

    Ok(())
}

/// Resolves an uploaded payload to text and validates it.
pub fn validate_upload(bytes: &[u8], max_bytes: usize) -> Result<&str, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let content =
        std::str::from_utf8(bytes).map_err(|e| ValidationError::NotText(e.to_string()))?;
    validate(content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_single_block() {
        assert!(validate("^XA^FO50,50^A0N,30,30^FDHello^FS^XZ").is_ok());
        assert!(validate("\n^xa\n^fdlower^fs\n^xz\n").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate(""), Err(ValidationError::Empty));
        assert_eq!(validate("  \r\n\t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_rejects_missing_markers() {
        assert_eq!(
            validate("^FO10,10^FDno block^FS"),
            Err(ValidationError::MissingStartMarker)
        );
        assert_eq!(
            validate("^XA^FDunterminated^FS"),
            Err(ValidationError::MissingEndMarker)
        );
        // end marker must follow the start marker
        assert_eq!(
            validate("^XZ^FDbackwards^FS^XA"),
            Err(ValidationError::MissingEndMarker)
        );
    }

    #[test]
    fn test_upload_limits() {
        let big = vec![b' '; 16];
        assert_eq!(
            validate_upload(&big, 8),
            Err(ValidationError::TooLarge { size: 16, limit: 8 })
        );
        assert_eq!(validate_upload(b"", 8), Err(ValidationError::Empty));
        assert!(matches!(
            validate_upload(&[0xff, 0xfe, 0x00], 8),
            Err(ValidationError::NotText(_))
        ));
        assert_eq!(
            validate_upload(b"^XA^XZ", DEFAULT_MAX_UPLOAD_BYTES),
            Ok("^XA^XZ")
        );
    }
}
