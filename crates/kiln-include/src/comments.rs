//! HTML comment removal.
//!
//! Whitespace is preserved exactly; only comments are dropped. Conditional
//! comments (`<!--[if IE]>`, `<!--<![endif]-->`), comments starting with
//! `<!--!` and server-side include comments (`<!-- #include ... -->`) survive.
//! Raw-text elements are copied through untouched.

const RAW_TEXT_TAGS: [&str; 4] = ["script", "style", "pre", "textarea"];

/// Remove HTML comments from `html`.
pub fn strip_comments(html: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while pos < html.len() {
        let rest = &lower[pos..];
        let comment = rest.find("<!--");
        let raw = RAW_TEXT_TAGS
            .iter()
            .filter_map(|tag| find_open_tag(rest, tag).map(|at| (at, *tag)))
            .min_by_key(|(at, _)| *at);

        match (comment, raw) {
            (Some(at), raw) if raw.map_or(true, |(raw_at, _)| at < raw_at) => {
                let start = pos + at;
                out.push_str(&html[pos..start]);

                let Some(close) = lower[start + 4..].find("-->") else {
                    out.push_str(&html[start..]);
                    break;
                };
                let end = start + 4 + close + 3;
                let body = &html[start..end];
                if is_preserved(body) {
                    out.push_str(body);
                }
                pos = end;
            }
            (_, Some((at, tag))) => {
                let start = pos + at;
                let closing = format!("</{}", tag);
                let end = lower[start..]
                    .find(&closing)
                    .map(|e| start + e)
                    .unwrap_or(html.len());
                out.push_str(&html[pos..end]);
                pos = end;
            }
            _ => {
                out.push_str(&html[pos..]);
                break;
            }
        }
    }

    out
}

fn is_preserved(comment: &str) -> bool {
    comment.starts_with("<!--[if")
        || comment.starts_with("<!--<![endif]")
        || comment.starts_with("<!--!")
        || comment[4..].trim_start().starts_with('#')
}

/// Offset of the next `<tag` that is a real element opening.
fn find_open_tag(haystack: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut from = 0;

    while let Some(found) = haystack[from..].find(&needle) {
        let at = from + found;
        let next = haystack[at + needle.len()..].chars().next();
        match next {
            Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/' => return Some(at),
            None => return None,
            _ => from = at + needle.len(),
        }
    }

    None
}
