//! Parser for the field paths the API attaches to validation errors.
//!
//! A path addresses a value inside the request payload:
//! `label`, `subnets[2].ipv4`, `rules[1].service_targets[0].id`.
//! Keys are ASCII alphanumerics, `_` or `-`; indices are decimal.

use std::fmt;

use thiserror::Error;

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed, non-empty field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed field path {path:?} at byte {position}: {message}")]
pub struct FieldPathError {
    pub path: String,
    pub position: usize,
    pub message: &'static str,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, FieldPathError> {
        let bytes = path.as_bytes();
        let fail = |position: usize, message: &'static str| FieldPathError {
            path: path.to_string(),
            position,
            message,
        };

        let mut segments = Vec::new();
        let mut pos = 0;
        loop {
            let start = pos;
            while pos < bytes.len() && is_key_byte(bytes[pos]) {
                pos += 1;
            }
            if pos == start {
                return Err(fail(pos, "expected a key"));
            }
            segments.push(Segment::Key(path[start..pos].to_string()));

            while pos < bytes.len() && bytes[pos] == b'[' {
                pos += 1;
                let digits = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                if pos == digits {
                    return Err(fail(pos, "expected an index"));
                }
                let index = path[digits..pos]
                    .parse::<usize>()
                    .map_err(|_| fail(digits, "index out of range"))?;
                if pos >= bytes.len() || bytes[pos] != b']' {
                    return Err(fail(pos, "expected ']'"));
                }
                pos += 1;
                segments.push(Segment::Index(index));
            }

            match bytes.get(pos) {
                None => break,
                Some(b'.') => pos += 1,
                Some(_) => return Err(fail(pos, "unexpected character")),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Segment {
        Segment::Key(s.to_string())
    }

    #[test]
    fn parses_single_key() {
        let path = FieldPath::parse("label").unwrap();
        assert_eq!(path.segments(), &[key("label")]);
    }

    #[test]
    fn parses_nested_indexed_path() {
        let path = FieldPath::parse("rules[1].service_targets[0].id").unwrap();
        assert_eq!(
            path.segments(),
            &[
                key("rules"),
                Segment::Index(1),
                key("service_targets"),
                Segment::Index(0),
                key("id"),
            ]
        );
    }

    #[test]
    fn parses_chained_indices() {
        let path = FieldPath::parse("matrix[2][3]").unwrap();
        assert_eq!(
            path.segments(),
            &[key("matrix"), Segment::Index(2), Segment::Index(3)]
        );
    }

    #[test]
    fn display_round_trips_source_text() {
        let text = "subnets[2].ipv4";
        assert_eq!(FieldPath::parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in [
            "",
            ".label",
            "label.",
            "a..b",
            "[0]",
            "subnets[]",
            "subnets[x]",
            "subnets[1",
            "subnets[1]label",
            "a b",
            "subnets[99999999999999999999999]",
        ] {
            assert!(FieldPath::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn error_reports_position() {
        let err = FieldPath::parse("subnets[1").unwrap_err();
        assert_eq!(err.position, 9);
        assert_eq!(err.message, "expected ']'");
    }
}
