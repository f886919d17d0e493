//! Byte-buffer decoding with encoding detection.
//!
//! Uploaded dataset files carry no reliable encoding declaration.
//! Detection order: BOM sniff, strict UTF-16 LE/BE (only when the
//! buffer contains zero bytes), strict UTF-8, Windows-1252. A buffer
//! that survives none of these is decoded as lossy UTF-8 so the caller
//! always gets text back.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// Decoded text plus what it took to get there.
#[derive(Debug)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static Encoding,
    /// True when replacement characters were substituted.
    pub lossy: bool,
}

/// Decode an arbitrary byte buffer into text. Never fails.
pub fn decode(bytes: &[u8]) -> Decoded {
    // A byte-order mark wins outright.
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let body = &bytes[bom_len..];
        return match encoding.decode_without_bom_handling_and_without_replacement(body) {
            Some(text) => finish(text.into_owned(), encoding, false),
            None => {
                let (text, _) = encoding.decode_without_bom_handling(body);
                finish(text.into_owned(), encoding, true)
            }
        };
    }

    // BOM-less UTF-16 is only plausible when zero bytes are present:
    // ASCII code units put a zero on the high half. The check runs
    // before the UTF-8 attempt because NUL bytes are valid UTF-8, so a
    // zero-bearing UTF-16 buffer would pass strict UTF-8 validation as
    // NUL-riddled garbage. Buffers without zeros skip straight to UTF-8.
    if bytes.contains(&0) {
        for encoding in utf16_order(bytes) {
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                return finish(text.into_owned(), encoding, false);
            }
        }
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return finish(text.into_owned(), UTF_8, false);
    }

    if let Some(text) = WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes) {
        return finish(text.into_owned(), WINDOWS_1252, false);
    }

    // Unreachable for windows-1252 input in practice; keeps the
    // contract total.
    let (text, _, _) = UTF_8.decode(bytes);
    finish(text.into_owned(), UTF_8, true)
}

/// Endianness guess for BOM-less UTF-16: ASCII high (zero) bytes sit at
/// odd offsets in LE and even offsets in BE.
fn utf16_order(bytes: &[u8]) -> [&'static Encoding; 2] {
    let mut even = 0usize;
    let mut odd = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        if *b == 0 {
            if i % 2 == 0 {
                even += 1;
            } else {
                odd += 1;
            }
        }
    }
    if even > odd {
        [UTF_16BE, UTF_16LE]
    } else {
        [UTF_16LE, UTF_16BE]
    }
}

fn finish(mut text: String, encoding: &'static Encoding, lossy: bool) -> Decoded {
    // Some decoders leave the mark in place when it doubles as content.
    if text.starts_with('\u{feff}') {
        text.remove(0);
    }
    // Exports occasionally pad cells with no-break spaces; normalize so
    // header and cell matching see plain spaces.
    if text.contains('\u{a0}') {
        text = text.replace('\u{a0}', " ");
    }
    Decoded { text, encoding, lossy }
}
