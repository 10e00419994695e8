//! Deflate + base64 codec for QR payloads.
//!
//! Payload text is deflated at maximum effort and base64-encoded so the
//! result is printable ASCII, safe to embed in a QR code. If compression
//! fails the codec falls back to plain base64 of the raw bytes; on the
//! receiving side inflate is attempted first and a failed inflate falls
//! through to the plain-base64 reading, so a fallback payload still
//! round-trips and a truly corrupt one still errors.

use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use tracing::{debug, warn};

/// Compression effectiveness report, used for the QR size advisory.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionStats {
    pub original_size: usize,
    pub compressed_size: usize,
    pub ratio: f64,
    pub savings: String,
}

/// Compress UTF-8 text and encode the result as base64.
pub fn compress_text(text: &str) -> String {
    match deflate(text.as_bytes()) {
        Ok(bytes) => BASE64.encode(bytes),
        Err(e) => {
            warn!(error = %e, "Deflate failed, falling back to plain base64");
            BASE64.encode(text.as_bytes())
        }
    }
}

/// Decode a base64 payload produced by `compress_text` back into text.
///
/// Tries inflate first; when the decoded bytes are not a deflate stream the
/// plain-base64 fallback reading is used instead.
pub fn decompress_text(encoded: &str) -> Result<String, String> {
    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("base64 decode: {e}"))?;

    match inflate(&raw) {
        Ok(bytes) => {
            String::from_utf8(bytes).map_err(|e| format!("decompressed payload not UTF-8: {e}"))
        }
        Err(inflate_err) => {
            debug!(error = %inflate_err, "Inflate failed, trying plain base64 reading");
            String::from_utf8(raw).map_err(|e| format!("payload not UTF-8: {e}"))
        }
    }
}

/// Measure how much `compress_text` shrinks the given text.
pub fn compression_stats(original: &str) -> CompressionStats {
    let compressed = compress_text(original);
    let ratio = if original.is_empty() {
        1.0
    } else {
        compressed.len() as f64 / original.len() as f64
    };
    CompressionStats {
        original_size: original.len(),
        compressed_size: compressed.len(),
        ratio,
        savings: format!("{:.1}%", (1.0 - ratio) * 100.0),
    }
}

fn deflate(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(input)
        .map_err(|e| format!("deflate write: {e}"))?;
    encoder.finish().map_err(|e| format!("deflate finish: {e}"))
}

fn inflate(input: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = DeflateDecoder::new(Vec::new());
    decoder
        .write_all(input)
        .map_err(|e| format!("inflate write: {e}"))?;
    decoder.finish().map_err(|e| format!("inflate finish: {e}"))
}

// ===========================================================================
// Tests
// ===========================================================================
