//! Content fingerprints: the `DIR` sentinel or an MD5 digest

use std::fmt;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

/// Fingerprint of a single tree entry.
///
/// Directories carry no content and share one sentinel value; files are
/// identified by the MD5 digest of their preprocessed byte stream.
/// Fingerprint equality is the sole change-detection signal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Directory sentinel, wire tag `1`
    Dir,
    /// MD5 digest of preprocessed file content
    Content([u8; 16]),
}

/// Wire tag marking a directory entry in the manifest.
pub const DIR_TAG: &str = "1";

impl Fingerprint {
    /// Fingerprint arbitrary bytes.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::Content(Md5::digest(data).into())
    }

    /// Fingerprint a file by path, reading it in chunks.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Md5::new();
        let mut buffer = [0u8; 64 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self::Content(hasher.finalize().into()))
    }

    /// Parse a manifest wire tag: `1` or 32 lowercase hex characters.
    /// Anything else is `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag == DIR_TAG {
            return Some(Self::Dir);
        }
        if tag.len() != 32 {
            return None;
        }
        let mut raw = [0u8; 16];
        hex::decode_to_slice(tag, &mut raw).ok()?;
        Some(Self::Content(raw))
    }

    /// Render the manifest wire tag.
    #[must_use]
    pub fn to_tag(&self) -> String {
        match self {
            Self::Dir => DIR_TAG.to_string(),
            Self::Content(raw) => hex::encode(raw),
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dir => write!(f, "Fingerprint(DIR)"),
            Self::Content(raw) => write!(f, "Fingerprint({})", hex::encode(raw)),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dir => write!(f, "DIR"),
            Self::Content(raw) => write!(f, "{}", hex::encode(raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_digest() {
        // MD5 of the empty byte stream
        let fp = Fingerprint::from_bytes(b"");
        assert_eq!(fp.to_tag(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_known_digest() {
        let fp = Fingerprint::from_bytes(b"hello world");
        assert_eq!(fp.to_tag(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_file_digest_matches_bytes_digest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, b"<html></html>").unwrap();

        let from_file = Fingerprint::from_file(&path).unwrap();
        assert_eq!(from_file, Fingerprint::from_bytes(b"<html></html>"));
    }

    #[test]
    fn test_tag_round_trip() {
        let fp = Fingerprint::from_bytes(b"styles");
        assert_eq!(Fingerprint::from_tag(&fp.to_tag()), Some(fp));
        assert_eq!(Fingerprint::from_tag("1"), Some(Fingerprint::Dir));
        assert_eq!(Fingerprint::Dir.to_tag(), "1");
    }

    #[test]
    fn test_invalid_tags_rejected() {
        assert_eq!(Fingerprint::from_tag(""), None);
        assert_eq!(Fingerprint::from_tag("2"), None);
        assert_eq!(Fingerprint::from_tag("abcd"), None);
        assert_eq!(
            Fingerprint::from_tag("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            None
        );
    }
}
