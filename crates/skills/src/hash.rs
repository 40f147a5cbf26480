use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of generated content. Equal digests are treated as equal content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Digest of the file at `path`, `None` when it does not exist.
pub fn file_hash(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            Ok(Some(format!("{:x}", hasher.finalize())))
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_and_content_agree() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("SKILL.md");
        assert_eq!(file_hash(&path).unwrap(), None);
        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(file_hash(&path).unwrap(), Some(content_hash("hello\n")));
    }
}
