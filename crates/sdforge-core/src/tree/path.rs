//! Rule path syntax
//!
//! A path is a dot-separated list of parts. Each part has a base name and
//! zero or more bracketed suffixes: a slice name (`component[systolic]`),
//! a numeric index (`component[0]`) or, for choice elements, the literal
//! `[x]` which stays part of the base (`value[x]`). Dots inside brackets
//! do not split parts, so url slice names survive intact.

/// One segment of a parsed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPart {
    pub base: String,
    pub brackets: Vec<String>,
}

impl PathPart {
    /// The first non-numeric bracket, which names a slice
    pub fn slice_name(&self) -> Option<&str> {
        self.brackets
            .iter()
            .find(|b| b.parse::<usize>().is_err())
            .map(String::as_str)
    }

    /// True if any bracket is a numeric index
    pub fn has_numeric_index(&self) -> bool {
        self.brackets.iter().any(|b| b.parse::<usize>().is_ok())
    }
}

impl std::fmt::Display for PathPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)?;
        for bracket in &self.brackets {
            write!(f, "[{}]", bracket)?;
        }
        Ok(())
    }
}

/// Split a path into parts
///
/// The empty path and `.` both denote the root and parse to no parts.
pub fn parse_path(path: &str) -> Vec<PathPart> {
    let mut parts = Vec::new();
    let mut base = String::new();
    let mut brackets = Vec::new();
    let mut depth = 0usize;
    let mut bracket = String::new();

    for c in path.chars() {
        match c {
            '[' => {
                if depth > 0 {
                    bracket.push(c);
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth > 0 {
                    bracket.push(c);
                } else if bracket == "x" && brackets.is_empty() {
                    base.push_str("[x]");
                    bracket.clear();
                } else {
                    brackets.push(std::mem::take(&mut bracket));
                }
            }
            '.' if depth == 0 => {
                if !base.is_empty() {
                    parts.push(PathPart {
                        base: std::mem::take(&mut base),
                        brackets: std::mem::take(&mut brackets),
                    });
                }
            }
            _ if depth > 0 => bracket.push(c),
            _ => base.push(c),
        }
    }
    if !base.is_empty() {
        parts.push(PathPart { base, brackets });
    }
    parts
}

/// Render parts back into path syntax
pub fn render_path(parts: &[PathPart]) -> String {
    parts
        .iter()
        .map(PathPart::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Join a prefix and a suffix path, treating an empty prefix as the root
pub fn join_path(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else {
        format!("{}.{}", prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let parts = parse_path("name.given");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].base, "name");
        assert!(parts[1].brackets.is_empty());
    }

    #[test]
    fn test_parse_choice_and_slice() {
        let parts = parse_path("component[systolic].value[x]");
        assert_eq!(parts[0].base, "component");
        assert_eq!(parts[0].slice_name(), Some("systolic"));
        assert_eq!(parts[1].base, "value[x]");
        assert!(parts[1].brackets.is_empty());
    }

    #[test]
    fn test_parse_url_slice_name() {
        let parts = parse_path("extension[http://acme.org/ext].value[x]");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].slice_name(), Some("http://acme.org/ext"));
    }

    #[test]
    fn test_parse_numeric_index() {
        let parts = parse_path("identifier[0].system");
        assert!(parts[0].has_numeric_index());
        assert_eq!(parts[0].slice_name(), None);
    }

    #[test]
    fn test_root_path() {
        assert!(parse_path("").is_empty());
        assert!(parse_path(".").is_empty());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "value[x]"), "value[x]");
        assert_eq!(join_path("extension[a]", "value[x]"), "extension[a].value[x]");
    }
}
