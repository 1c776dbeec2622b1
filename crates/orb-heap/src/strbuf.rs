use serde_json::{json, Value as Json};

use crate::gc::Marker;
use crate::payload::{DumpScan, JsonMap, PayloadDecodeError, PayloadKind, PayloadOps};

/// Spaces emitted per indentation level by [`StrBuf::newline`].
const INDENT_WIDTH: usize = 2;

/// Text-accumulating string buffer payload.
///
/// Holds a growing text with an indentation depth applied at line
/// breaks. Persists under the `strbuf` discriminator as
/// `{"strbuf_indent": <int>}` plus either `{"strbuf_lines": [...]}` for
/// multi-line text or `{"strbuf_string": "..."}` for single-line text.
///
/// References nothing, so its GC mark is empty. A buffer created with
/// [`StrBuf::transient`] never persists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrBuf {
    text: String,
    indent: i64,
    transient: bool,
}

impl StrBuf {
    /// Create an empty, persistent buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that is never persisted.
    pub fn transient() -> Self {
        Self {
            text: String::new(),
            indent: 0,
            transient: true,
        }
    }

    /// Append raw text.
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Break the line and indent the next one.
    pub fn newline(&mut self) {
        self.text.push('\n');
        for _ in 0..(self.indent.max(0) as usize * INDENT_WIDTH) {
            self.text.push(' ');
        }
    }

    /// Current indentation depth.
    pub fn indent(&self) -> i64 {
        self.indent
    }

    /// Set the indentation depth. Clamped at zero.
    pub fn set_indent(&mut self, indent: i64) {
        self.indent = indent.max(0);
    }

    /// Adjust the indentation depth by `delta`, clamping at zero.
    pub fn bump_indent(&mut self, delta: i64) {
        self.indent = (self.indent + delta).max(0);
    }

    /// The accumulated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the accumulated text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns `true` if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Discard the accumulated text, keeping the indentation depth.
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Whether this buffer is excluded from persistence.
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Rebuild a persistent buffer from its snapshot JSON.
    pub fn from_json(content: &JsonMap) -> Result<Self, PayloadDecodeError> {
        let indent = content
            .get("strbuf_indent")
            .ok_or(PayloadDecodeError::MissingField {
                field: "strbuf_indent",
            })?
            .as_i64()
            .ok_or_else(|| PayloadDecodeError::BadShape {
                field: "strbuf_indent",
                reason: "expected an integer".into(),
            })?;

        let text = if let Some(lines) = content.get("strbuf_lines") {
            let lines = lines.as_array().ok_or_else(|| PayloadDecodeError::BadShape {
                field: "strbuf_lines",
                reason: "expected an array".into(),
            })?;
            let mut parts = Vec::with_capacity(lines.len());
            for line in lines {
                parts.push(
                    line.as_str()
                        .ok_or_else(|| PayloadDecodeError::BadShape {
                            field: "strbuf_lines",
                            reason: "line is not a string".into(),
                        })?
                        .to_owned(),
                );
            }
            parts.join("\n")
        } else if let Some(text) = content.get("strbuf_string") {
            text.as_str()
                .ok_or_else(|| PayloadDecodeError::BadShape {
                    field: "strbuf_string",
                    reason: "expected a string".into(),
                })?
                .to_owned()
        } else {
            return Err(PayloadDecodeError::MissingField {
                field: "strbuf_lines|strbuf_string",
            });
        };

        let mut buf = Self::new();
        buf.text = text;
        buf.indent = indent.max(0);
        Ok(buf)
    }
}

impl PayloadOps for StrBuf {
    fn kind(&self) -> PayloadKind {
        PayloadKind::StrBuf
    }

    fn mark(&self, _marker: &mut Marker) {}

    fn dump_scan(&self, _scan: &mut DumpScan) {
        // Nothing to register either way; transient buffers simply never
        // reach emission.
    }

    fn dump_json_content(&self, _scan: &DumpScan, out: &mut JsonMap) {
        if self.transient {
            return;
        }
        out.insert("strbuf_indent".into(), json!(self.indent));
        if self.text.contains('\n') {
            let lines: Vec<Json> = self.text.split('\n').map(|line| json!(line)).collect();
            out.insert("strbuf_lines".into(), Json::Array(lines));
        } else {
            out.insert("strbuf_string".into(), json!(self.text));
        }
    }

    fn is_erasable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_newline_respect_indent() {
        let mut buf = StrBuf::new();
        buf.append("top");
        buf.bump_indent(1);
        buf.newline();
        buf.append("nested");
        assert_eq!(buf.text(), "top\n  nested");
        buf.bump_indent(-5);
        assert_eq!(buf.indent(), 0);
    }

    #[test]
    fn clear_keeps_indent() {
        let mut buf = StrBuf::new();
        buf.set_indent(3);
        buf.append("text");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.indent(), 3);
    }

    #[test]
    fn single_line_dumps_as_string() {
        let mut buf = StrBuf::new();
        buf.append("one line only");
        let mut out = JsonMap::new();
        buf.dump_json_content(&DumpScan::new(), &mut out);
        assert_eq!(out["strbuf_string"], json!("one line only"));
        assert_eq!(out["strbuf_indent"], json!(0));
        assert!(!out.contains_key("strbuf_lines"));
    }

    #[test]
    fn multi_line_dumps_as_lines() {
        let mut buf = StrBuf::new();
        buf.append("first\nsecond\n");
        let mut out = JsonMap::new();
        buf.dump_json_content(&DumpScan::new(), &mut out);
        assert_eq!(out["strbuf_lines"], json!(["first", "second", ""]));
        assert!(!out.contains_key("strbuf_string"));
    }

    #[test]
    fn json_roundtrip_preserves_text_exactly() {
        for text in ["", "plain", "a\nb", "trailing\n", "\nleading"] {
            let mut buf = StrBuf::new();
            buf.append(text);
            buf.set_indent(2);
            let mut out = JsonMap::new();
            buf.dump_json_content(&DumpScan::new(), &mut out);
            let back = StrBuf::from_json(&out).unwrap();
            assert_eq!(back.text(), text);
            assert_eq!(back.indent(), 2);
        }
    }

    #[test]
    fn transient_buffer_emits_nothing() {
        let mut buf = StrBuf::transient();
        buf.append("scratch");
        let mut out = JsonMap::new();
        buf.dump_json_content(&DumpScan::new(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn from_json_reports_malformed_shapes() {
        let empty = JsonMap::new();
        assert!(matches!(
            StrBuf::from_json(&empty),
            Err(PayloadDecodeError::MissingField {
                field: "strbuf_indent"
            })
        ));

        let mut no_text = JsonMap::new();
        no_text.insert("strbuf_indent".into(), json!(0));
        assert!(matches!(
            StrBuf::from_json(&no_text),
            Err(PayloadDecodeError::MissingField { .. })
        ));

        let mut bad_lines = JsonMap::new();
        bad_lines.insert("strbuf_indent".into(), json!(0));
        bad_lines.insert("strbuf_lines".into(), json!([1, 2]));
        assert!(matches!(
            StrBuf::from_json(&bad_lines),
            Err(PayloadDecodeError::BadShape { .. })
        ));
    }
}
