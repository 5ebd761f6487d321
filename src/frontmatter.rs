//! Article front matter: rendering and tolerant field extraction.
//!
//! Articles start with a `---` delimited block of `key: "value"` lines. The
//! writer always double-quotes scalars; readers accept bare, single- or
//! double-quoted values so hand-edited files keep working.

use std::sync::OnceLock;

use regex::Regex;

/// Front-matter field holding the source document's modification instant.
pub const SOURCE_MODIFIED_FIELD: &str = "source_document_modified";

/// Ordered front-matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    fields: Vec<(String, FieldValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar field; replaces an existing field of the same name.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.put(key, FieldValue::Scalar(value.into()));
        self
    }

    /// Append a scalar field only when `value` is present.
    pub fn set_opt(&mut self, key: &str, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    pub fn set_list(&mut self, key: &str, items: Vec<String>) -> &mut Self {
        self.put(key, FieldValue::List(items));
        self
    }

    fn put(&mut self, key: &str, value: FieldValue) {
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
    }

    /// Render as a `---` delimited YAML-style block followed by a blank line.
    pub fn render(&self) -> String {
        let mut out = String::from("---\n");
        for (key, value) in &self.fields {
            match value {
                FieldValue::Scalar(s) => out.push_str(&format!("{}: {}\n", key, quote(s))),
                FieldValue::List(items) if items.is_empty() => {
                    out.push_str(&format!("{}: []\n", key))
                }
                FieldValue::List(items) => {
                    out.push_str(&format!("{}:\n", key));
                    for item in items {
                        out.push_str(&format!("  - {}\n", quote(item)));
                    }
                }
            }
        }
        out.push_str("---\n\n");
        out
    }
}

fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ");
    format!("\"{}\"", escaped)
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split an article into its front-matter block (without delimiters) and body.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;
    let end = rest.find("\n---")?;
    let block = &rest[..end];
    let after = &rest[end + 4..];
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);
    Some((block, body.trim_start_matches(['\r', '\n'])))
}

fn field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*([A-Za-z_][A-Za-z0-9_]*)[ \t]*:[ \t]*(?:"((?:[^"\\]|\\.)*)"|'([^']*)'|([^\r\n]*?))[ \t]*\r?$"#)
            .expect("static front-matter regex")
    })
}

/// Read one scalar field from an article's front matter.
///
/// Tolerates optional single or double quotes and surrounding whitespace.
/// Only the leading `---` block is searched; if the file has no such block,
/// the whole text is searched so older hand-written files still resolve.
pub fn read_field(content: &str, key: &str) -> Option<String> {
    let block = split(content).map(|(block, _)| block).unwrap_or(content);
    for caps in field_regex().captures_iter(block) {
        if &caps[1] != key {
            continue;
        }
        let value = if let Some(dq) = caps.get(2) {
            unescape(dq.as_str())
        } else if let Some(sq) = caps.get(3) {
            sq.as_str().to_string()
        } else {
            caps.get(4).map(|m| m.as_str().trim().to_string())?
        };
        if value.is_empty() {
            return None;
        }
        return Some(value);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scalars_and_lists() {
        let mut fm = FrontMatter::new();
        fm.set("title", "BULKmetrix")
            .set("type", "Product Overview")
            .set_opt("source_document_author", None::<String>)
            .set_list("tags", vec!["plc".into(), "scada".into()])
            .set_list("empty", vec![]);
        let text = fm.render();
        assert_eq!(
            text,
            "---\ntitle: \"BULKmetrix\"\ntype: \"Product Overview\"\ntags:\n  - \"plc\"\n  - \"scada\"\nempty: []\n---\n\n"
        );
    }

    #[test]
    fn set_replaces_existing() {
        let mut fm = FrontMatter::new();
        fm.set("a", "1").set("b", "2").set("a", "3");
        assert!(fm.render().starts_with("---\na: \"3\"\nb: \"2\"\n"));
    }

    #[test]
    fn reads_quoted_and_bare_values() {
        let doc = "---\ntitle: \"Say \\\"hi\\\"\"\nsource_document_modified: 2020-07-15T14:30:00\nauthor: 'J. Smith'\n  date_updated  :   \"2024-01-01\"  \n---\n\nbody";
        assert_eq!(read_field(doc, "title").as_deref(), Some("Say \"hi\""));
        assert_eq!(
            read_field(doc, SOURCE_MODIFIED_FIELD).as_deref(),
            Some("2020-07-15T14:30:00")
        );
        assert_eq!(read_field(doc, "author").as_deref(), Some("J. Smith"));
        assert_eq!(read_field(doc, "date_updated").as_deref(), Some("2024-01-01"));
        assert_eq!(read_field(doc, "missing"), None);
    }

    #[test]
    fn crlf_files_are_tolerated() {
        let doc = "---\r\nsource_document_modified: \"2024-03-20T14:45:00\"\r\n---\r\n\r\nbody";
        assert_eq!(
            read_field(doc, SOURCE_MODIFIED_FIELD).as_deref(),
            Some("2024-03-20T14:45:00")
        );
        let (_, body) = split(doc).unwrap();
        assert_eq!(body, "body");
    }

    #[test]
    fn round_trip_through_render() {
        let mut fm = FrontMatter::new();
        fm.set(SOURCE_MODIFIED_FIELD, "2020-07-15T14:30:00")
            .set("title", "C:\\path \"x\"");
        let doc = format!("{}# Body\n", fm.render());
        assert_eq!(
            read_field(&doc, SOURCE_MODIFIED_FIELD).as_deref(),
            Some("2020-07-15T14:30:00")
        );
        assert_eq!(read_field(&doc, "title").as_deref(), Some("C:\\path \"x\""));
        assert_eq!(split(&doc).unwrap().1, "# Body\n");
    }

    #[test]
    fn body_fields_are_ignored_when_block_present() {
        let doc = "---\ntitle: \"x\"\n---\n\nsource_document_modified: 2099-01-01\n";
        assert_eq!(read_field(doc, SOURCE_MODIFIED_FIELD), None);
    }
}
