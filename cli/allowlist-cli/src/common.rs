//! Shared helpers for hex rendering and file output.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Renders bytes as 0x-prefixed lower-case hex.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a 32-byte hash from a hex string, with or without a "0x" prefix.
pub fn parse_hash(hash_str: &str) -> Result<[u8; 32]> {
    let trimmed = hash_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 64 {
        anyhow::bail!(
            "Invalid hash length: expected 64 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash).context("Invalid hash hex encoding")?;
    Ok(hash)
}

/// Writes content to a file through a temp file and rename; readers never
/// observe a partially written file at the final path.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).context("Failed to create temp file")?;
    file.write_all(content.as_bytes())
        .context("Failed to write to temp file")?;
    file.flush().context("Failed to flush temp file")?;
    std::fs::rename(&temp_path, path).context("Failed to move temp file to output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode([0xab, 0xcd]), "0xabcd");
    }

    #[test]
    fn test_parse_hash_roundtrip() {
        let hash = [0x5au8; 32];
        assert_eq!(parse_hash(&hex_encode(hash)).unwrap(), hash);
        assert_eq!(parse_hash(&hex::encode(hash)).unwrap(), hash);
    }

    #[test]
    fn test_parse_hash_invalid() {
        assert!(parse_hash("0x1234").is_err());
        assert!(parse_hash(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        write_file_atomic(&path, "first").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");

        write_file_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("tmp").exists());
    }
}
