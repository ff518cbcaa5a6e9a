//! Value Compression
//!
//! gzip helpers used to shrink large cached values.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

/// Compresses a UTF-8 string with gzip at the default level.
pub fn compress(text: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()
}

/// Decompresses gzip data back into a UTF-8 string.
pub fn decompress(data: &[u8]) -> std::io::Result<String> {
    let mut decoder = GzDecoder::new(data);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;
    Ok(text)
}
