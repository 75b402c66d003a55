//! Manifest codec
//!
//! The manifest is the remote record of the previous deploy: LF-separated
//! `fingerprint=path` records, compressed as a raw DEFLATE stream (no zlib
//! or gzip header). An absent or malformed manifest reads as an empty map,
//! which turns the run into a first-time deploy.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::ManifestError;
use crate::filemap::FileMap;
use crate::fingerprint::Fingerprint;

/// Default manifest file name at the remote root.
pub const MANIFEST_NAME: &str = ".htdeployment";

/// Suffix of the running marker, appended to the manifest name.
pub const RUNNING_SUFFIX: &str = ".running";

/// Suffix every upload lands under until the rename phase commits it.
pub const TEMP_SUFFIX: &str = ".deploytmp";

/// Encode a file map at maximum compression. Record order follows the map's
/// path order, so equal maps encode identically.
///
/// # Errors
/// Returns an error if the encoder fails.
pub fn encode(map: &FileMap) -> std::io::Result<Vec<u8>> {
    let mut payload = String::new();
    for (path, fingerprint) in map.iter() {
        payload.push_str(&fingerprint.to_tag());
        payload.push('=');
        payload.push_str(path);
        payload.push('\n');
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(payload.as_bytes())?;
    encoder.finish()
}

/// Decode a manifest payload. Lines without `=` and lines with an
/// unparseable fingerprint tag are skipped; the affected paths simply
/// re-upload on the next deploy.
///
/// # Errors
/// Returns an error if the payload is not a valid DEFLATE stream.
pub fn decode(bytes: &[u8]) -> Result<FileMap, ManifestError> {
    let mut payload = String::new();
    DeflateDecoder::new(bytes).read_to_string(&mut payload)?;

    let mut map = FileMap::new();
    for line in payload.split('\n') {
        let Some((tag, path)) = line.split_once('=') else {
            continue;
        };
        let Some(fingerprint) = Fingerprint::from_tag(tag) else {
            continue;
        };
        map.insert(path, fingerprint);
    }
    Ok(map)
}
