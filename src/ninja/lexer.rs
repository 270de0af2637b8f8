//! Line-level lexing of ninja files.
//!
//! Handles comments, `$`-newline continuations and splitting statements into
//! tokens on unescaped spaces. Escapes (`$$`, `$ `, `$:`) and variable
//! references are kept verbatim in the tokens; they are resolved later by
//! [`super::scope::expand`].

/// A logical line: continuations joined, comments dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based number of the first physical line.
    pub number: usize,
    /// Whether the line starts with whitespace (a binding of the enclosing block).
    pub indented: bool,
    /// The content without leading whitespace.
    pub text: String,
}

/// Whether `s` ends with a `$` that is not itself escaped.
fn ends_with_escape(s: &str) -> bool {
    let dollars = s.bytes().rev().take_while(|&b| b == b'$').count();
    dollars % 2 == 1
}

/// Split file content into logical lines.
///
/// Blank lines and comments are skipped. A physical line ending in an
/// unescaped `$` continues on the next one, whose leading whitespace is
/// dropped.
pub fn logical_lines(content: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pending: Option<Line> = None;

    for (index, raw) in content.lines().enumerate() {
        let raw = raw.trim_end_matches('\r');
        let continued = ends_with_escape(raw);
        let piece = if continued { &raw[..raw.len() - 1] } else { raw };

        let line = match pending.take() {
            Some(mut line) => {
                line.text.push_str(piece.trim_start());
                line
            }
            None => {
                let trimmed = piece.trim_start();
                if trimmed.starts_with('#') && !continued {
                    continue;
                }
                Line {
                    number: index + 1,
                    indented: trimmed.len() != piece.len(),
                    text: trimmed.to_string(),
                }
            }
        };

        if continued {
            pending = Some(line);
        } else if !line.text.trim().is_empty() {
            lines.push(line);
        }
    }

    if let Some(line) = pending {
        if !line.text.trim().is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Split a statement on unescaped spaces.
pub fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '$' => {
                current.push('$');
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ' ' | '\t' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// If `token` ends with an unescaped `:`, return it without the colon.
pub fn strip_unescaped_colon(token: &str) -> Option<&str> {
    let body = token.strip_suffix(':')?;
    if ends_with_escape(body) {
        None
    } else {
        Some(body)
    }
}

/// Split `name = value` at the first `=`, trimming both sides.
pub fn split_binding(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, value.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_lines_join_continuations() {
        let content = "# comment\nbuild out: CXX $\n    in.cc $\n    other.cc\n  FLAGS = -O2\n\n";
        let lines = logical_lines(content);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 2);
        assert_eq!(lines[0].text, "build out: CXX in.cc other.cc");
        assert!(!lines[0].indented);
        assert!(lines[1].indented);
        assert_eq!(lines[1].text, "FLAGS = -O2");
    }

    #[test]
    fn test_escaped_dollar_is_not_a_continuation() {
        let lines = logical_lines("x = cost$$\ny = 1\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "x = cost$$");
    }

    #[test]
    fn test_split_tokens_keeps_escapes() {
        let tokens = split_tokens("build a$ b.o c$:d.o: CXX  x.cc");
        assert_eq!(tokens, vec!["build", "a$ b.o", "c$:d.o:", "CXX", "x.cc"]);
    }

    #[test]
    fn test_strip_unescaped_colon() {
        assert_eq!(strip_unescaped_colon("out.o:"), Some("out.o"));
        assert_eq!(strip_unescaped_colon("c$:"), None);
        assert_eq!(strip_unescaped_colon("out.o"), None);
        assert_eq!(strip_unescaped_colon(":"), Some(""));
    }

    #[test]
    fn test_split_binding() {
        assert_eq!(split_binding("FLAGS = -O2 -g"), Some(("FLAGS", "-O2 -g")));
        assert_eq!(split_binding("empty ="), Some(("empty", "")));
        assert_eq!(split_binding("no binding here"), None);
    }
}
