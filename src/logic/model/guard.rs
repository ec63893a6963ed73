//! Model Guard - Checksum verification before load

use std::fs::File;
use std::io::Read;
use std::path::Path;
use sha2::{Digest, Sha256};

#[derive(Debug)]
pub struct GuardError(pub String);

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GuardError: {}", self.0)
    }
}

impl std::error::Error for GuardError {}

/// SHA-256 of a file, lowercase hex
pub fn file_sha256(path: &Path) -> Result<String, GuardError> {
    let mut file = File::open(path)
        .map_err(|e| GuardError(format!("Cannot open {:?}: {}", path, e)))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)
            .map_err(|e| GuardError(format!("Read error {:?}: {}", path, e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare against the expected digest (case-insensitive)
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), GuardError> {
    let actual = file_sha256(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(GuardError(format!(
            "Checksum mismatch for {:?}: expected {}, got {}",
            path, expected, actual
        )));
    }
    log::info!("Model checksum verified: {}...{}", &actual[..8], &actual[actual.len() - 8..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_known_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let digest = file_sha256(file.path()).unwrap();
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_verify_checksum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        assert!(verify_checksum(file.path(), "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD").is_ok());
        assert!(verify_checksum(file.path(), "00").is_err());
    }
}
