//! Frontmatter block parsing and serialization.
//!
//! Session files are UTF-8 markdown with an optional YAML-style header:
//!
//! ```text
//! ---
//! model: haiku
//! allowedTools: ["Bash(git *)", "Read"]
//! ---
//! Free-text prompt body...
//! ```
//!
//! The same block grammar (without the `---` delimiters) is used by the
//! project config file. Values are a closed union: bare/quoted scalars,
//! `true`/`false`, inline `[a, b]` lists, and block sequences:
//!
//! ```text
//! allowedTools:
//!   - Bash(git *)
//!   - Read
//! ```

use crate::flags::{FlagValue, Flags};

const DELIMITER: &str = "---";

/// Split a session document into its frontmatter map and content body.
/// A document without a leading `---` line is all content.
pub fn parse_document(raw: &str) -> Result<(Flags, String), String> {
    let Some(rest) = raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n")) else {
        return Ok((Flags::new(), raw.to_string()));
    };

    // Find the closing delimiter line.
    let mut block_end = None;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            block_end = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((block_end, content_start)) = block_end else {
        return Err("unterminated frontmatter block".to_string());
    };

    let frontmatter = parse_block(&rest[..block_end])?;
    Ok((frontmatter, rest[content_start..].to_string()))
}

/// Parse a bare frontmatter block (no delimiters) into a flag map.
pub fn parse_block(block: &str) -> Result<Flags, String> {
    let mut flags = Flags::new();
    // Key currently collecting block-sequence items, if any.
    let mut pending_list: Option<(String, Vec<String>)> = None;

    for (lineno, line) in block.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            match pending_list.as_mut() {
                Some((_, items)) => {
                    items.push(unquote(item.trim()));
                    continue;
                }
                None => return Err(format!("line {}: list item without a key", lineno + 1)),
            }
        }

        if let Some((key, items)) = pending_list.take() {
            if !items.is_empty() {
                flags.insert(key, FlagValue::List(items));
            }
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(format!("line {}: expected 'key: value'", lineno + 1));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("line {}: empty key", lineno + 1));
        }
        let value = value.trim();

        if value.is_empty() {
            // Either the start of a block sequence or a null value. Null
            // values are treated as absent, matching the flags projection.
            pending_list = Some((key.to_string(), Vec::new()));
            continue;
        }

        flags.insert(key, parse_scalar(value)?);
    }

    if let Some((key, items)) = pending_list {
        if !items.is_empty() {
            flags.insert(key, FlagValue::List(items));
        }
    }

    Ok(flags)
}

fn parse_scalar(value: &str) -> Result<FlagValue, String> {
    if value == "true" {
        return Ok(FlagValue::Bool(true));
    }
    if value == "false" {
        return Ok(FlagValue::Bool(false));
    }
    if let Some(inner) = value.strip_prefix('[') {
        let Some(inner) = inner.strip_suffix(']') else {
            return Err(format!("unterminated inline list: {value}"));
        };
        return Ok(FlagValue::List(split_inline_list(inner)));
    }
    Ok(FlagValue::Str(unquote(value)))
}

/// Split an inline list body on commas, respecting double quotes.
fn split_inline_list(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in inner.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                push_item(&mut items, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_item(&mut items, &current);
    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        items.push(unquote(trimmed));
    }
}

/// Strip surrounding quotes. Double-quoted strings additionally have their
/// backslash escapes decoded; single-quoted strings are literal.
fn unquote(s: &str) -> String {
    if s.len() >= 2 {
        if s.starts_with('"') && s.ends_with('"') {
            return unescape(&s[1..s.len() - 1]);
        }
        if s.starts_with('\'') && s.ends_with('\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            // Unknown escapes pass through untouched.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Serialize frontmatter and content into the canonical on-disk form.
/// An empty map produces a bare document with no header block. A leading
/// blank line in the content is dropped so write-then-read round-trips the
/// body byte-for-byte, modulo a single trailing newline.
pub fn serialize_document(frontmatter: &Flags, content: &str) -> String {
    let content = content.strip_prefix('\n').unwrap_or(content);

    let mut out = String::new();
    if !frontmatter.is_empty() {
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&serialize_block(frontmatter));
        out.push_str(DELIMITER);
        out.push('\n');
    }
    out.push_str(content);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Serialize a flag map as bare `key: value` lines.
pub fn serialize_block(frontmatter: &Flags) -> String {
    let mut out = String::new();
    for (key, value) in frontmatter.iter() {
        match value {
            FlagValue::Bool(b) => out.push_str(&format!("{key}: {b}\n")),
            FlagValue::Str(s) => out.push_str(&format!("{key}: {}\n", quote_scalar(s))),
            FlagValue::List(items) => {
                let quoted: Vec<String> = items.iter().map(|i| quoted(i)).collect();
                out.push_str(&format!("{key}: [{}]\n", quoted.join(", ")));
            }
        }
    }
    out
}

/// Quote a string scalar when emitting it bare would change how it parses.
fn quote_scalar(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s == "true"
        || s == "false"
        || s.starts_with('[')
        || s.starts_with('-')
        || s.starts_with('#')
        || s.starts_with('"')
        || s.starts_with('\'')
        || s.contains(':')
        || s.contains(['\n', '\r', '\t'])
        || s.trim() != s;
    if needs_quotes {
        quoted(s)
    } else {
        s.to_string()
    }
}

/// Double-quote a string, escaping backslashes, quotes, and control
/// characters so the value survives the line-oriented parser.
fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> FlagValue {
        FlagValue::Str(v.to_string())
    }

    #[test]
    fn document_without_frontmatter_is_all_content() {
        let (fm, content) = parse_document("# Just markdown\n\nbody\n").unwrap();
        assert!(fm.is_empty());
        assert_eq!(content, "# Just markdown\n\nbody\n");
    }

    #[test]
    fn document_with_frontmatter() {
        let raw = "---\nmodel: haiku\nverbose: true\n---\nprompt body\n";
        let (fm, content) = parse_document(raw).unwrap();
        assert_eq!(fm.get("model"), Some(&s("haiku")));
        assert_eq!(fm.get("verbose"), Some(&FlagValue::Bool(true)));
        assert_eq!(content, "prompt body\n");
    }

    #[test]
    fn unterminated_block_is_an_error() {
        assert!(parse_document("---\nmodel: haiku\nno closing\n").is_err());
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(parse_block("model haiku").is_err());
        assert!(parse_block(": no key").is_err());
        assert!(parse_block("- orphan item").is_err());
    }

    #[test]
    fn inline_list_respects_quotes() {
        let fm = parse_block("allowedTools: [\"Bash(git *, rm)\", Read]").unwrap();
        assert_eq!(
            fm.get("allowedTools"),
            Some(&FlagValue::List(vec![
                "Bash(git *, rm)".to_string(),
                "Read".to_string()
            ]))
        );
    }

    #[test]
    fn block_sequence() {
        let fm = parse_block("allowedTools:\n  - Bash(git *)\n  - Read\nmodel: opus\n").unwrap();
        assert_eq!(
            fm.get("allowedTools"),
            Some(&FlagValue::List(vec![
                "Bash(git *)".to_string(),
                "Read".to_string()
            ]))
        );
        assert_eq!(fm.get("model"), Some(&s("opus")));
    }

    #[test]
    fn null_value_is_treated_as_absent() {
        let fm = parse_block("empty:\nmodel: haiku\n").unwrap();
        assert!(fm.get("empty").is_none());
        assert_eq!(fm.get("model"), Some(&s("haiku")));
    }

    #[test]
    fn quoted_scalars_are_unquoted() {
        let fm = parse_block("a: \"true\"\nb: 'hello world'\n").unwrap();
        assert_eq!(fm.get("a"), Some(&s("true")));
        assert_eq!(fm.get("b"), Some(&s("hello world")));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let fm = parse_block("# comment\n\nmodel: haiku\n").unwrap();
        assert_eq!(fm.len(), 1);
    }

    #[test]
    fn serialize_empty_frontmatter_omits_block() {
        assert_eq!(serialize_document(&Flags::new(), "hello"), "hello\n");
    }

    #[test]
    fn serialize_strips_one_leading_blank_line() {
        let mut fm = Flags::new();
        fm.insert("model", s("haiku"));
        let out = serialize_document(&fm, "\nbody");
        assert_eq!(out, "---\nmodel: haiku\n---\nbody\n");
    }

    #[test]
    fn round_trip_preserves_frontmatter_and_content() {
        let mut fm = Flags::new();
        fm.insert("model", s("haiku"));
        fm.insert("verbose", FlagValue::Bool(false));
        fm.insert(
            "allowedTools",
            FlagValue::List(vec!["Bash(git *)".to_string(), "Read".to_string()]),
        );
        fm.insert("note", s("true"));
        let content = "# Prompt\n\nRead the docs.\n";

        let raw = serialize_document(&fm, content);
        let (parsed_fm, parsed_content) = parse_document(&raw).unwrap();
        assert_eq!(parsed_fm, fm);
        assert_eq!(parsed_content, content);
    }

    #[test]
    fn newline_in_scalar_round_trips() {
        let mut fm = Flags::new();
        fm.insert("append-system-prompt", s("be terse\nalways"));

        let raw = serialize_document(&fm, "body\n");
        let (parsed_fm, _) = parse_document(&raw).unwrap();
        assert_eq!(
            parsed_fm.get("append-system-prompt"),
            Some(&s("be terse\nalways"))
        );
    }

    #[test]
    fn control_characters_and_quotes_round_trip_everywhere() {
        let mut fm = Flags::new();
        fm.insert("a", s("tab\there\r\nthere"));
        fm.insert("b", s("say \"hi\": now"));
        fm.insert(
            "allowedTools",
            FlagValue::List(vec!["multi\nline".to_string(), "qu\"ote, comma".to_string()]),
        );

        let raw = serialize_document(&fm, "body\n");
        // The block stays line-oriented: one line per key.
        assert_eq!(raw.matches('\n').count(), 6);
        let (parsed_fm, _) = parse_document(&raw).unwrap();
        assert_eq!(parsed_fm, fm);
    }

    #[test]
    fn literal_backslashes_in_bare_scalars_are_untouched() {
        let fm = parse_block("path: a\\nb\n").unwrap();
        assert_eq!(fm.get("path"), Some(&s("a\\nb")));

        let mut out = Flags::new();
        out.insert("path", s("a\\nb"));
        assert_eq!(serialize_block(&out), "path: a\\nb\n");
    }

    #[test]
    fn round_trip_adds_at_most_one_trailing_newline() {
        let raw = serialize_document(&Flags::new(), "no newline");
        let (_, content) = parse_document(&raw).unwrap();
        assert_eq!(content, "no newline\n");

        let again = serialize_document(&Flags::new(), &content);
        assert_eq!(again, "no newline\n");
    }
}
