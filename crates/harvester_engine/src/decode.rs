use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use engine_logging::engine_warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
}

const META_PRESCAN_BYTES: usize = 1024;

/// Decode an item page into UTF-8. Order: BOM, Content-Type charset,
/// `<meta charset>` in the first kilobyte, then chardetng.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedHtml, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    if let Some(enc) = meta_charset(bytes) {
        return decode_with(bytes, enc);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    Encoding::for_label(label.as_bytes())
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            part.strip_prefix("charset=")
                .or_else(|| part.strip_prefix("Charset="))
                .or_else(|| part.strip_prefix("CHARSET="))
                .map(|v| v.trim_matches([' ', '"', '\''].as_ref()))
        })
        .next()
        .map(|s| s.to_string())
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedHtml, DecodeError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        if !bytes.is_empty() && text.chars().all(|c| c == char::REPLACEMENT_CHARACTER) {
            return Err(DecodeError::DecodeFailure {
                encoding: enc.name().to_string(),
                message: "no decodable content".into(),
            });
        }
        engine_warn!("Malformed {} sequences replaced with U+FFFD", enc.name());
    }
    Ok(DecodedHtml {
        html: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_detection() {
        let decoded = decode_html(b"caf\xe9", Some("text/html; charset=windows-1252")).unwrap();
        assert_eq!(decoded.html, "café");
        assert_eq!(decoded.encoding_label, "windows-1252");
    }

    #[test]
    fn meta_charset_is_used_without_header() {
        let page = b"<html><head><meta charset=\"iso-8859-1\"></head><body>Hokusai \xe9</body></html>";
        let decoded = decode_html(page, Some("text/html")).unwrap();
        assert!(decoded.html.contains("Hokusai é"));
    }

    #[test]
    fn stray_bytes_are_replaced_not_fatal() {
        let page = b"<li>Creator: Hokusai</li><li>Medium: Woodblock \xff print</li>";
        let decoded = decode_html(page, Some("text/html; charset=utf-8")).unwrap();
        assert!(decoded.html.contains("Creator: Hokusai"));
        assert!(decoded.html.contains("Woodblock \u{FFFD} print"));
    }

    #[test]
    fn undecodable_bytes_are_an_error() {
        let err = decode_html(b"\xfd\xfe\xff", Some("text/html; charset=utf-8")).unwrap_err();
        assert!(matches!(err, DecodeError::DecodeFailure { .. }));
    }

    #[test]
    fn plain_utf8_passes_through() {
        let decoded = decode_html("Fuji 富士".as_bytes(), None).unwrap();
        assert_eq!(decoded.html, "Fuji 富士");
    }
}
