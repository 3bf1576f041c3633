use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use portfolio_logging::portfolio_warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub html: String,
    pub encoding_label: String,
}

/// Decode a staged export file into UTF-8.
///
/// Order: BOM, `charset=` parameter of the staged MIME type, valid UTF-8,
/// then chardetng. Malformed sequences are replaced rather than rejected so a
/// badly labelled page still reaches the converter.
pub fn decode_staged_html(bytes: &[u8], mime_type: Option<&str>) -> DecodedPage {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_lossy(bytes, encoding);
    }

    if let Some(encoding) = mime_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_lossy(bytes, encoding);
    }

    if std::str::from_utf8(bytes).is_ok() {
        return decode_lossy(bytes, UTF_8);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_lossy(bytes, detector.guess(None, true))
}

fn charset_param(mime_type: &str) -> Option<String> {
    mime_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_lossy(bytes: &[u8], encoding: &'static Encoding) -> DecodedPage {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        portfolio_warn!(
            "Staged page is not valid {}; malformed sequences were replaced",
            actual.name()
        );
    }
    DecodedPage {
        html: text.into_owned(),
        encoding_label: actual.name().to_string(),
    }
}
