//! Text decoding with an ordered encoding fallback list.

use encoding_rs::Encoding;

/// Resolves an encoding label such as `utf-8`, `latin-1` or `cp1252`.
///
/// Labels follow the WHATWG encoding standard, so `latin1` and
/// `iso-8859-1` both resolve to windows-1252. The common spellings
/// `latin-1` and `latin_1` are accepted as aliases of `latin1`.
#[must_use]
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    let label = match label.to_ascii_lowercase().as_str() {
        "latin-1" | "latin_1" => "latin1",
        _ => label,
    };
    Encoding::for_label(label.as_bytes())
}

/// Decodes `bytes` with the first encoding in `labels` that accepts them.
///
/// Returns the text and the label that succeeded, or `None` when every
/// encoding rejected the input. Unknown labels are skipped.
#[must_use]
pub fn decode_with_fallback<'a>(bytes: &[u8], labels: &'a [String]) -> Option<(String, &'a str)> {
    labels.iter().find_map(|label| {
        let encoding = resolve_encoding(label)?;
        let bytes = if encoding == encoding_rs::UTF_8 {
            bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
        } else {
            bytes
        };
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text.into_owned(), label.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_utf8_first() {
        let all = labels(&["utf-8", "latin-1"]);
        let (text, used) = decode_with_fallback("café".as_bytes(), &all).unwrap();
        assert_eq!(text, "café");
        assert_eq!(used, "utf-8");
    }

    #[test]
    fn test_latin1_fallback() {
        let all = labels(&["utf-8", "latin-1", "cp1252", "iso-8859-1"]);
        let bytes = b"Caf\xe9 cr\xe8me";
        let (text, used) = decode_with_fallback(bytes, &all).unwrap();
        assert_eq!(text, "Café crème");
        assert_eq!(used, "latin-1");
    }

    #[test]
    fn test_bom_is_stripped() {
        let all = labels(&["utf-8"]);
        let (text, _) = decode_with_fallback(b"\xEF\xBB\xBFhello", &all).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_no_encoding_succeeds() {
        let all = labels(&["utf-8"]);
        assert!(decode_with_fallback(b"\xff\xfe\xfa", &all).is_none());
    }

    #[test]
    fn test_resolve_encoding_labels() {
        assert!(resolve_encoding("cp1252").is_some());
        assert!(resolve_encoding("ISO-8859-1").is_some());
        assert!(resolve_encoding("klingon").is_none());
    }

    #[test]
    fn test_latin1_aliases_resolve() {
        for label in ["latin-1", "Latin_1", "latin1", " LATIN-1 "] {
            assert_eq!(
                resolve_encoding(label),
                Some(encoding_rs::WINDOWS_1252),
                "label {label:?}"
            );
        }
    }
}
