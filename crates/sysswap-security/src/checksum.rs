use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<bool> {
    let expected = expected_hex.trim().to_ascii_lowercase();
    if expected.len() != 64 || hex::decode(&expected).is_err() {
        return Err(anyhow!("invalid SHA-256 digest: '{expected_hex}'"));
    }
    Ok(sha256_file_hex(path)? == expected)
}

/// Compares two files by digest; returns the shared digest when they match.
pub fn files_match(left: &Path, right: &Path) -> Result<Option<String>> {
    let left_digest = sha256_file_hex(left)?;
    let right_digest = sha256_file_hex(right)?;
    if left_digest == right_digest {
        Ok(Some(left_digest))
    } else {
        Ok(None)
    }
}
