use ego_tree::NodeRef;
use portfolio_logging::portfolio_debug;
use scraper::node::Node;
use scraper::Html;

/// Tags that survive into the note body. Anything else is unwrapped to its text.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "b", "bdo", "big", "blockquote", "br", "caption",
    "center", "cite", "code", "col", "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em",
    "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "map", "ol",
    "p", "pre", "q", "s", "samp", "small", "span", "strike", "strong", "sub", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "title", "tr", "tt", "u", "ul", "var", "xmp",
];

/// Attributes stripped from every element, at any depth.
pub const DISALLOWED_ATTRIBUTES: &[&str] = &[
    "class",
    "id",
    "onclick",
    "ondblclick",
    "accesskey",
    "data",
    "dynsrc",
    "tabindex",
];

/// Containers whose body is code or embedded media rather than page text.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed",
];

/// Allow-listed tags written as `<tag/>`.
const VOID_TAGS: &[&str] = &["area", "br", "col", "hr", "img"];

/// Elements whose first newline the HTML parser swallows.
const LEADING_NEWLINE_TAGS: &[&str] = &["pre"];

/// Table parts the body-context parser drops unless a `<table>` encloses them.
const TABLE_PARTS: &[&str] = &[
    "caption", "col", "colgroup", "tbody", "td", "tfoot", "th", "thead", "tr",
];

/// Malformed line break produced by some editors; removed before parsing.
const MALFORMED_BREAK: &str = "<br/ >";

/// Sanitized markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnmlNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<EnmlNode>,
    },
    Text(String),
}

pub fn is_allowed_tag(tag: &str) -> bool {
    ALLOWED_TAGS.contains(&tag)
}

pub fn is_disallowed_attribute(name: &str) -> bool {
    DISALLOWED_ATTRIBUTES
        .iter()
        .any(|disallowed| disallowed.eq_ignore_ascii_case(name))
}

/// Parse `html` as a fragment and rewrite it into allow-listed nodes.
///
/// The parser recovers from malformed input on its own; its error list is
/// only logged.
pub fn sanitize_fragment(html: &str) -> Vec<EnmlNode> {
    let mut cleaned = html.replace(MALFORMED_BREAK, "");
    if starts_with_table_part(&cleaned) {
        cleaned = format!("<table>{cleaned}</table>");
    }
    let fragment = Html::parse_fragment(&cleaned);
    if !fragment.errors.is_empty() {
        portfolio_debug!(
            "Recovered from {} HTML parse errors while sanitizing",
            fragment.errors.len()
        );
    }

    let mut nodes = Vec::new();
    for child in fragment.root_element().children() {
        rewrite_node(child, &mut nodes);
    }
    nodes
}

/// True when the first tag is a row, cell or other piece of a table, as in
/// a selection copied out of a larger table.
fn starts_with_table_part(html: &str) -> bool {
    let Some(rest) = html.trim_start().strip_prefix('<') else {
        return false;
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    TABLE_PARTS.contains(&name.to_ascii_lowercase().as_str())
}

/// Post-order rewrite: children are sanitized before the element itself is
/// inspected, so an unwrapped element hands its already-clean children up.
fn rewrite_node(node: NodeRef<'_, Node>, out: &mut Vec<EnmlNode>) {
    match node.value() {
        Node::Text(text) => {
            let text: &str = text;
            if !text.is_empty() {
                out.push(EnmlNode::Text(text.to_string()));
            }
        }
        Node::Element(element) => {
            let tag = element.name().to_ascii_lowercase();
            if DROPPED_WITH_CONTENT.contains(&tag.as_str()) {
                return;
            }

            let mut children = Vec::new();
            for child in node.children() {
                rewrite_node(child, &mut children);
            }

            if !is_allowed_tag(&tag) {
                out.extend(children);
                return;
            }

            let mut attrs: Vec<(String, String)> = element
                .attrs()
                .filter(|(name, _)| !is_disallowed_attribute(name) && is_xml_name(name))
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            attrs.sort();
            attrs.dedup_by(|a, b| a.0 == b.0);

            // `xmp` content is raw text when parsed, so it cannot carry escapes.
            let tag = if tag == "xmp" { "pre".to_string() } else { tag };

            out.push(EnmlNode::Element {
                tag,
                attrs,
                children,
            });
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
        _ => {
            for child in node.children() {
                rewrite_node(child, out);
            }
        }
    }
}

/// Serialize sanitized nodes as XML, in document order.
pub fn serialize_nodes(nodes: &[EnmlNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &EnmlNode, out: &mut String) {
    match node {
        EnmlNode::Text(text) => escape_into(text, false, out),
        EnmlNode::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            if children.is_empty() && VOID_TAGS.contains(&tag.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            if LEADING_NEWLINE_TAGS.contains(&tag.as_str()) {
                if let Some(EnmlNode::Text(text)) = children.first() {
                    if text.starts_with('\n') {
                        out.push('\n');
                    }
                }
            }
            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(ch),
            // Not representable in XML 1.0.
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrapped_elements_keep_their_sanitized_children() {
        let nodes = sanitize_fragment(r#"<section><b id="x">bold</b></section>"#);
        assert_eq!(
            nodes,
            vec![EnmlNode::Element {
                tag: "b".to_string(),
                attrs: Vec::new(),
                children: vec![EnmlNode::Text("bold".to_string())],
            }]
        );
    }

    #[test]
    fn xmp_is_written_as_pre() {
        let nodes = sanitize_fragment("<xmp>a<b & c</xmp>");
        assert_eq!(serialize_nodes(&nodes), "<pre>a&lt;b &amp; c</pre>");
    }

    #[test]
    fn leading_newline_in_pre_is_doubled() {
        let nodes = vec![EnmlNode::Element {
            tag: "pre".to_string(),
            attrs: Vec::new(),
            children: vec![EnmlNode::Text("\nx".to_string())],
        }];
        assert_eq!(serialize_nodes(&nodes), "<pre>\n\nx</pre>");
    }

    #[test]
    fn table_parts_are_recognised_by_their_first_tag() {
        assert!(starts_with_table_part("  <TR><td>x</td></TR>"));
        assert!(starts_with_table_part("<td>x"));
        assert!(!starts_with_table_part("<table><tr><td>x</td></tr></table>"));
        assert!(!starts_with_table_part("<p>x</p><tr>"));
        assert!(!starts_with_table_part("text <td>"));
    }

    #[test]
    fn comments_are_dropped() {
        let nodes = sanitize_fragment("a<!-- hidden -->b");
        assert_eq!(serialize_nodes(&nodes), "ab");
    }

    #[test]
    fn attribute_names_must_be_xml_names() {
        assert!(is_xml_name("href"));
        assert!(is_xml_name("xml:lang"));
        assert!(!is_xml_name("1st"));
        assert!(!is_xml_name("a\"b"));
        assert!(!is_xml_name(""));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let nodes = vec![EnmlNode::Element {
            tag: "a".to_string(),
            attrs: vec![("title".to_string(), r#"5 > 3 & "q""#.to_string())],
            children: Vec::new(),
        }];
        assert_eq!(
            serialize_nodes(&nodes),
            r#"<a title="5 &gt; 3 &amp; &quot;q&quot;"></a>"#
        );
    }

    #[test]
    fn control_characters_are_removed_from_text() {
        let nodes = vec![EnmlNode::Text("a\u{0008}b\tc".to_string())];
        assert_eq!(serialize_nodes(&nodes), "ab\tc");
    }
}
