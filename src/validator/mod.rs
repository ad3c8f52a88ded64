//! Validator — extension + magic-byte checks.

use crate::error::ValidateError;
use std::path::Path;

pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Ok,
    OkWithWarning(String),
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Inspect the first 12 bytes against known container signatures.
fn matches_known_signature(head: &[u8]) -> bool {
    if head.len() < 3 {
        return false;
    }
    if &head[0..3] == b"ID3" {
        return true;
    }
    // MP3 frame sync: 0xFFFB, 0xFFF3, 0xFFF2 (first two bytes).
    if head.len() >= 2 && head[0] == 0xFF && matches!(head[1], 0xFB | 0xF3 | 0xF2) {
        return true;
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        return true;
    }
    if head.len() >= 4 && &head[0..4] == b"OggS" {
        return true;
    }
    if head.len() >= 4 && &head[0..4] == b"fLaC" {
        return true;
    }
    // "ftyp" anywhere in the first 12 bytes (M4A/MP4 box layout).
    if head.len() >= 8 && head.windows(4).any(|w| w == b"ftyp") {
        return true;
    }
    false
}

/// Validate an in-memory buffer that is destined for (or came from) `path`'s
/// extension. Splitting the signature check from disk I/O keeps this
/// testable without touching the filesystem.
pub fn validate_bytes(ext: &str, bytes: &[u8]) -> Result<ValidationOutcome, ValidateError> {
    let ext = ext.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidateError::UnacceptedExtension(ext));
    }

    if bytes.is_empty() {
        return Err(ValidateError::Empty);
    }
    if bytes.len() < 1000 {
        return Err(ValidateError::Truncated { bytes: bytes.len() });
    }

    let head = &bytes[..bytes.len().min(12)];
    if matches_known_signature(head) {
        Ok(ValidationOutcome::Ok)
    } else {
        Ok(ValidationOutcome::OkWithWarning(format!(
            "extension '{}' accepted but no recognized container signature was found",
            ext
        )))
    }
}

/// Validate a file already on disk: extension from its path, signature from
/// its first 12 bytes, size from its metadata.
pub fn validate(path: &Path) -> Result<ValidationOutcome, ValidateError> {
    let ext = extension_of(path)
        .ok_or_else(|| ValidateError::UnacceptedExtension(String::new()))?;

    let metadata = std::fs::metadata(path).map_err(|e| ValidateError::Io(e.to_string()))?;
    let size = metadata.len();
    if size == 0 {
        return Err(ValidateError::Empty);
    }
    if size < 1000 {
        return Err(ValidateError::Truncated { bytes: size as usize });
    }

    let mut file = std::fs::File::open(path).map_err(|e| ValidateError::Io(e.to_string()))?;
    let mut head = [0u8; 12];
    use std::io::Read;
    let n = file.read(&mut head).map_err(|e| ValidateError::Io(e.to_string()))?;

    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidateError::UnacceptedExtension(ext));
    }

    if matches_known_signature(&head[..n]) {
        Ok(ValidationOutcome::Ok)
    } else {
        Ok(ValidationOutcome::OkWithWarning(format!(
            "extension '{}' accepted but no recognized container signature was found",
            ext
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(mut head: Vec<u8>) -> Vec<u8> {
        head.resize(2000, 0);
        head
    }

    #[test]
    fn id3_mp3_signature_is_recognized() {
        let bytes = padded(b"ID3\x03\x00\x00\x00\x00\x00\x00".to_vec());
        assert_eq!(validate_bytes("mp3", &bytes).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn raw_mp3_frame_sync_is_recognized() {
        let bytes = padded(vec![0xFF, 0xFB, 0x90, 0x00]);
        assert_eq!(validate_bytes("mp3", &bytes).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn riff_wave_signature_is_recognized() {
        let mut head = b"RIFF".to_vec();
        head.extend_from_slice(&[0, 0, 0, 0]);
        head.extend_from_slice(b"WAVE");
        assert_eq!(validate_bytes("wav", &padded(head)).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn oggs_signature_is_recognized() {
        let bytes = padded(b"OggS\x00\x02".to_vec());
        assert_eq!(validate_bytes("ogg", &bytes).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn flac_signature_is_recognized() {
        let bytes = padded(b"fLaC\x00\x00".to_vec());
        assert_eq!(validate_bytes("flac", &bytes).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn ftyp_box_anywhere_in_head_is_recognized() {
        let mut head = vec![0, 0, 0, 0x18];
        head.extend_from_slice(b"ftyp");
        head.extend_from_slice(b"M4A ");
        assert_eq!(validate_bytes("m4a", &padded(head)).unwrap(), ValidationOutcome::Ok);
    }

    #[test]
    fn unknown_signature_with_known_extension_warns_but_accepts() {
        let bytes = padded(vec![0x01, 0x02, 0x03, 0x04]);
        match validate_bytes("mp3", &bytes).unwrap() {
            ValidationOutcome::OkWithWarning(_) => {}
            ValidationOutcome::Ok => panic!("expected a warning, got a clean Ok"),
        }
    }

    #[test]
    fn unaccepted_extension_is_rejected() {
        let bytes = padded(b"ID3\x03".to_vec());
        let err = validate_bytes("exe", &bytes).unwrap_err();
        matches!(err, ValidateError::UnacceptedExtension(_));
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = validate_bytes("mp3", &[]).unwrap_err();
        matches!(err, ValidateError::Empty);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = vec![0xFF, 0xFB, 0x90, 0x00];
        let err = validate_bytes("mp3", &bytes).unwrap_err();
        matches!(err, ValidateError::Truncated { .. });
    }
}
