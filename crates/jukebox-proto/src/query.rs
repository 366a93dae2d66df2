//! Reversible transform for embedding free text (artist names, queries)
//! in identifiers: quote characters are escaped, the result is
//! percent-encoded like a URI and then base64-encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::protocol::ProtocolError;

/// Characters a URI encoder escapes (non-ASCII is always escaped).
const URI_ESCAPED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub fn encode(plain: &str) -> String {
    let escaped = escape_quotes(plain);
    let uri = utf8_percent_encode(&escaped, URI_ESCAPED).to_string();
    STANDARD.encode(uri)
}

pub fn decode(encoded: &str) -> Result<String, ProtocolError> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| ProtocolError::Query(e.to_string()))?;
    let uri = String::from_utf8(raw).map_err(|e| ProtocolError::Query(e.to_string()))?;
    let escaped = percent_decode_str(&uri)
        .decode_utf8()
        .map_err(|e| ProtocolError::Query(e.to_string()))?;
    Ok(unescape_quotes(&escaped))
}

fn escape_quotes(plain: &str) -> String {
    let mut out = String::with_capacity(plain.len());
    for c in plain.chars() {
        match c {
            '|' => out.push_str("|p|"),
            '"' => out.push_str("|d|"),
            '\'' => out.push_str("|s|"),
            '`' => out.push_str("|b|"),
            other => out.push(other),
        }
    }
    out
}

// Single left-to-right pass, so an escape produced for a literal `|` is
// never re-read as part of the following token.
fn unescape_quotes(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('|') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = match tail.get(..3) {
            Some("|p|") => Some('|'),
            Some("|d|") => Some('"'),
            Some("|s|") => Some('\''),
            Some("|b|") => Some('`'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('|');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_survive() {
        for s in [
            r#"Guns N' Roses"#,
            r#"The "Best" Of"#,
            "back`tick",
            r#"all "three" 'kinds' `here`"#,
        ] {
            assert_eq!(decode(&encode(s)).unwrap(), s);
        }
    }

    #[test]
    fn test_escape_lookalikes_survive() {
        for s in ["|d|", "a|s|b", "||", "|p|d|", "|", "pipe|\"|"] {
            assert_eq!(decode(&encode(s)).unwrap(), s, "input {s:?}");
        }
    }

    #[test]
    fn test_non_ascii_and_uri_chars() {
        let s = "Sigur Rós & Jónsi / 100% <live>";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn test_encoded_form_is_identifier_safe() {
        let encoded = encode(r#"It's "quoted""#);
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains('\''));
        assert!(!encoded.contains('`'));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode("!!not base64!!").is_err());
    }
}
