//! Include directive scanning.

use serde_json::Value;

/// An `include` directive found in a markup source.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Byte offset of the directive prefix
    pub start: usize,

    /// Byte offset one past the closing parenthesis
    pub end: usize,

    /// Include path as written
    pub path: String,

    /// JSON object passed to the included file
    pub context: Option<Value>,

    /// 1-based line of the directive
    pub line: usize,
}

/// Errors that can occur when scanning directives.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Parse error at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Find every `{prefix}include(...)` directive in `source`, in order.
///
/// The argument list is a quoted path (single or double quotes) optionally
/// followed by a comma and a JSON object.
pub fn find_directives(source: &str, prefix: &str) -> Result<Vec<Directive>, ParseError> {
    let needle = format!("{}include(", prefix);
    let mut directives = Vec::new();
    let mut search_from = 0;

    while let Some(found) = source[search_from..].find(&needle) {
        let start = search_from + found;
        let line = source[..start].matches('\n').count() + 1;
        let mut cursor = Cursor {
            source,
            pos: start + needle.len(),
            line,
        };

        cursor.skip_whitespace();
        let path = cursor.quoted()?;
        cursor.skip_whitespace();

        let context = if cursor.eat(',') {
            cursor.skip_whitespace();
            let raw = cursor.json_object()?;
            let value: Value = serde_json::from_str(raw).map_err(|e| ParseError::Malformed {
                line,
                message: format!("invalid include context: {}", e),
            })?;
            cursor.skip_whitespace();
            Some(value)
        } else {
            None
        };

        if !cursor.eat(')') {
            return Err(cursor.error("expected ')' to close include"));
        }

        directives.push(Directive {
            start,
            end: cursor.pos,
            path,
            context,
            line,
        });
        search_from = cursor.pos;
    }

    Ok(directives)
}

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Malformed {
            line: self.line,
            message: message.to_string(),
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted include path")),
        };
        self.pos += 1;

        let rest = &self.source[self.pos..];
        let close = rest
            .find(quote)
            .ok_or_else(|| self.error("unterminated include path"))?;
        let path = rest[..close].to_string();
        self.pos += close + 1;

        if path.trim().is_empty() {
            return Err(self.error("empty include path"));
        }
        Ok(path)
    }

    /// Consume a balanced `{ ... }` span, honouring JSON string escapes.
    fn json_object(&mut self) -> Result<&'a str, ParseError> {
        if self.peek() != Some('{') {
            return Err(self.error("expected a JSON object after ','"));
        }

        let start = self.pos;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, c) in self.source[start..].char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        self.pos = end;
                        return Ok(&self.source[start..end]);
                    }
                }
                _ => {}
            }
        }

        Err(self.error("unterminated include context"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_plain_include() {
        let source = "<body>\n  @@include('header.html')\n</body>";

        let found = find_directives(source, "@@").unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "header.html");
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].context, None);
        assert_eq!(&source[found[0].start..found[0].end], "@@include('header.html')");
    }

    #[test]
    fn parses_json_context() {
        let source = r#"@@include("card.html", {"title": "Hi (there)", "n": 2})"#;

        let found = find_directives(source, "@@").unwrap();

        assert_eq!(found[0].path, "card.html");
        assert_eq!(found[0].context, Some(json!({"title": "Hi (there)", "n": 2})));
        assert_eq!(found[0].end, source.len());
    }

    #[test]
    fn handles_braces_inside_strings() {
        let source = r#"@@include('a.html', {"code": "fn() { \"}\" }"})"#;

        let found = find_directives(source, "@@").unwrap();

        assert_eq!(found[0].context, Some(json!({"code": "fn() { \"}\" }"})));
    }

    #[test]
    fn honours_custom_prefix() {
        let source = "@@include('a.html') ##include('b.html')";

        let found = find_directives(source, "##").unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "b.html");
    }

    #[test]
    fn finds_several_directives() {
        let source = "@@include('a.html')\n@@include('b.html')\n@@include('c.html')";

        let paths: Vec<_> = find_directives(source, "@@")
            .unwrap()
            .into_iter()
            .map(|d| d.path)
            .collect();

        assert_eq!(paths, vec!["a.html", "b.html", "c.html"]);
    }

    #[test]
    fn rejects_unclosed_directive() {
        let err = find_directives("line\n@@include('a.html'", "@@").unwrap_err();

        assert_eq!(
            err,
            ParseError::Malformed {
                line: 2,
                message: "expected ')' to close include".to_string()
            }
        );
    }

    #[test]
    fn rejects_invalid_context() {
        let err = find_directives("@@include('a.html', {title: 1})", "@@").unwrap_err();

        assert!(err.to_string().contains("invalid include context"));
    }
}
