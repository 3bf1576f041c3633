use crate::sanitize::{sanitize_fragment, serialize_nodes};

pub const ENML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
pub const ENML_DOCTYPE: &str =
    r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#;

const NOTE_OPEN: &str = "<en-note>";
const NOTE_CLOSE: &str = "</en-note>";

pub trait Converter: Send + Sync {
    fn to_enml(&self, html: &str) -> String;
}

/// HTML to ENML: allow-listed tags, stripped attributes, wrapped in `<en-note>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnmlConverter;

impl EnmlConverter {
    /// The sanitized markup that goes inside `<en-note>`.
    pub fn body(&self, html: &str) -> String {
        serialize_nodes(&sanitize_fragment(html))
    }
}

impl Converter for EnmlConverter {
    fn to_enml(&self, html: &str) -> String {
        wrap_note(&self.body(html))
    }
}

pub fn wrap_note(body: &str) -> String {
    format!("{ENML_PROLOG}{ENML_DOCTYPE}{NOTE_OPEN}{body}{NOTE_CLOSE}")
}

/// Inverse of [`wrap_note`]; `None` if `document` is not a wrapped note.
pub fn note_body(document: &str) -> Option<&str> {
    document
        .strip_prefix(ENML_PROLOG)?
        .strip_prefix(ENML_DOCTYPE)?
        .strip_prefix(NOTE_OPEN)?
        .strip_suffix(NOTE_CLOSE)
}
