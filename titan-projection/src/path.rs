//! `idShortPath` grammar.
//!
//! `segment ('.' segment | '[' index ']')*` where `segment` is an idShort
//! and `index` is a non-negative decimal integer. `.` crosses into a
//! SubmodelElementCollection, `[i]` selects a position inside a
//! SubmodelElementList.

use crate::error::ProjectionError;

/// One step of a parsed `idShortPath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Match the child whose `idShort` equals the segment.
    Name(String),
    /// Select the zero-based position inside a list.
    Index(usize),
}

/// Parse an `idShortPath` into its alternating name and index steps.
///
/// An empty path parses to an empty step list (the document itself).
pub fn parse_id_short_path(path: &str) -> Result<Vec<PathStep>, ProjectionError> {
    let mut steps = Vec::new();
    if path.is_empty() {
        return Ok(steps);
    }

    let invalid = |reason: &str| ProjectionError::invalid_path(path, reason);
    let bytes = path.as_bytes();
    let mut current = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if current.is_empty() {
                    return Err(invalid("empty segment"));
                }
                steps.push(PathStep::Name(std::mem::take(&mut current)));
                if i + 1 == bytes.len() {
                    return Err(invalid("trailing dot"));
                }
                i += 1;
            }
            b'[' => {
                if !current.is_empty() {
                    steps.push(PathStep::Name(std::mem::take(&mut current)));
                } else if steps.is_empty() {
                    return Err(invalid("index without preceding segment"));
                }
                let close = path[i..]
                    .find(']')
                    .map(|offset| i + offset)
                    .ok_or_else(|| invalid("unterminated index"))?;
                let digits = &path[i + 1..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("index must be a non-negative decimal integer"));
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| invalid("index out of range"))?;
                steps.push(PathStep::Index(index));
                i = close + 1;
                // after `]` only `.`, another `[` or end of path may follow
                if i < bytes.len() && bytes[i] == b'.' {
                    if i + 1 == bytes.len() {
                        return Err(invalid("trailing dot"));
                    }
                    i += 1;
                } else if i < bytes.len() && bytes[i] != b'[' {
                    return Err(invalid("expected '.' or '[' after index"));
                }
            }
            _ => {
                current.push(path[i..].chars().next().unwrap());
                i += path[i..].chars().next().unwrap().len_utf8();
            }
        }
    }

    if !current.is_empty() {
        steps.push(PathStep::Name(current));
    }
    Ok(steps)
}

/// Append a name segment to a (possibly empty) base path.
pub fn append_segment(base: &str, id_short: &str) -> String {
    if base.is_empty() {
        id_short.to_string()
    } else {
        format!("{base}.{id_short}")
    }
}

/// Append an index step to a (possibly empty) base path.
pub fn append_index(base: &str, index: usize) -> String {
    format!("{base}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_nested_segments() {
        assert_eq!(
            parse_id_short_path("Temperature").unwrap(),
            vec![PathStep::Name("Temperature".into())]
        );
        assert_eq!(
            parse_id_short_path("Nameplate.SerialNumber").unwrap(),
            vec![
                PathStep::Name("Nameplate".into()),
                PathStep::Name("SerialNumber".into())
            ]
        );
    }

    #[test]
    fn parses_indices() {
        assert_eq!(
            parse_id_short_path("Measurements[0]").unwrap(),
            vec![PathStep::Name("Measurements".into()), PathStep::Index(0)]
        );
        assert_eq!(
            parse_id_short_path("a[1][2].b").unwrap(),
            vec![
                PathStep::Name("a".into()),
                PathStep::Index(1),
                PathStep::Index(2),
                PathStep::Name("b".into())
            ]
        );
    }

    #[test]
    fn empty_path_is_the_document() {
        assert!(parse_id_short_path("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["a..b", ".a", "a.", "a[", "a[]", "a[-1]", "a[x]", "[0]", "a[0]b"] {
            assert!(parse_id_short_path(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn builders_compose() {
        let path = append_index(&append_segment("", "measurements"), 0);
        assert_eq!(path, "measurements[0]");
        assert_eq!(append_segment(&path, "city"), "measurements[0].city");
    }
}
