//! Transparent body decompression for the validation phase. Guardrails
//! need cleartext JSON; the client and the forwarded response are
//! returned byte-for-byte regardless of what was done here.

use std::io::Read;

/// Decode `body` per its `Content-Encoding` header value for the purpose
/// of validation. Unknown or absent encodings are returned unchanged —
/// if decoding fails, the original bytes are returned so validation can
/// at least attempt to run against whatever text survives.
pub fn decode_for_validation(body: &[u8], content_encoding: Option<&str>) -> Vec<u8> {
    match content_encoding.map(|v| v.to_ascii_lowercase()) {
        Some(enc) if enc == "gzip" || enc == "x-gzip" => gunzip(body).unwrap_or_else(|| body.to_vec()),
        Some(enc) if enc == "br" => unbrotli(body).unwrap_or_else(|| body.to_vec()),
        Some(enc) if enc == "deflate" => inflate(body).unwrap_or_else(|| body.to_vec()),
        _ => body.to_vec(),
    }
}

fn gunzip(body: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(body);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

fn inflate(body: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(body);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

fn unbrotli(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut std::io::Cursor::new(body), &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn passes_through_unencoded_body() {
        let body = b"{\"query\":\"hi\"}";
        assert_eq!(decode_for_validation(body, None), body.to_vec());
    }

    #[test]
    fn decodes_gzip_body() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello world").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decode_for_validation(&compressed, Some("gzip")), b"hello world".to_vec());
    }

    #[test]
    fn falls_back_to_raw_bytes_on_bad_gzip() {
        let body = b"not actually gzip";
        assert_eq!(decode_for_validation(body, Some("gzip")), body.to_vec());
    }
}
