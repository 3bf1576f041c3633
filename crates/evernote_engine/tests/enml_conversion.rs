use evernote_engine::{
    decode_staged_html, note_body, Converter, EnmlConverter, ALLOWED_TAGS, DISALLOWED_ATTRIBUTES,
    ENML_DOCTYPE, ENML_PROLOG,
};
use pretty_assertions::assert_eq;
use scraper::{Html, Selector};

const CAPTURED_PAGE: &str = r#"
<html><head><title>Forum post</title><style>p { color: red }</style></head>
<body class="path-mod-forum" onload="init()">
  <nav id="nav"><a href="/course/view.php?id=3" tabindex="1">Course</a></nav>
  <article data-region="post">
    <h2 id="heading" accesskey="h">Week 1 &amp; 2</h2>
    <p class="lead" onclick="track()" ondblclick="x()">First <em>post</em><br/ >line</p>
    <img src="https://moodle.example/pix/i.png" dynsrc="clip.avi" alt="icon">
    <object data="movie.swf"><param name="m" value="1">fallback</object>
    <table><tr><td data="cell">1</td><td>2</td></tr></table>
    <script>alert("x")</script>
    <form><input type="text" value="ignored"><button>Send</button></form>
  </article>
</body></html>
"#;

fn convert(html: &str) -> String {
    EnmlConverter.to_enml(html)
}

fn body(html: &str) -> String {
    let document = convert(html);
    note_body(&document)
        .expect("converted output is a wrapped note")
        .to_string()
}

#[test]
fn empty_input_is_an_empty_note() {
    assert_eq!(
        convert(""),
        format!("{ENML_PROLOG}{ENML_DOCTYPE}<en-note></en-note>")
    );
}

#[test]
fn classes_and_scripts_are_removed() {
    assert_eq!(
        body(r#"<div class="x"><b>Hi</b><script>evil()</script></div>"#),
        "<div><b>Hi</b></div>"
    );
}

#[test]
fn output_has_one_note_root_after_the_prolog() {
    let document = convert(CAPTURED_PAGE);
    assert!(document.starts_with(&format!("{ENML_PROLOG}{ENML_DOCTYPE}<en-note>")));
    assert!(document.ends_with("</en-note>"));
    assert_eq!(document.matches("<en-note>").count(), 1);
    assert_eq!(document.matches("</en-note>").count(), 1);
}

#[test]
fn no_disallowed_attribute_survives_at_any_depth() {
    let markup = body(CAPTURED_PAGE);
    let parsed = Html::parse_fragment(&markup);
    let every = Selector::parse("*").unwrap();
    for element in parsed.select(&every) {
        for (name, _) in element.value().attrs() {
            assert!(
                !DISALLOWED_ATTRIBUTES.contains(&name),
                "{name} kept on <{}>",
                element.value().name()
            );
        }
    }
    assert!(markup.contains(r#"<a href="/course/view.php?id=3">Course</a>"#));
    assert!(markup.contains(r#"<img alt="icon" src="https://moodle.example/pix/i.png"/>"#));
}

#[test]
fn stripped_tags_keep_their_text() {
    let markup = body(CAPTURED_PAGE);
    for tag in ["nav", "article", "form", "button", "input", "object", "param", "body"] {
        assert!(!markup.contains(&format!("<{tag}")), "<{tag}> survived");
        assert!(!markup.contains(&format!("</{tag}>")), "</{tag}> survived");
    }
    assert!(markup.contains("Course"));
    assert!(markup.contains("Send"));
    assert!(!markup.contains("alert"));
    assert!(!markup.contains("color: red"));
    assert!(!markup.contains("fallback"));
}

#[test]
fn allowed_structure_is_preserved() {
    let markup = body(CAPTURED_PAGE);
    assert!(markup.contains("<h2>Week 1 &amp; 2</h2>"));
    assert!(markup.contains("<p>First <em>post</em>line</p>"));
    assert!(markup.contains("<td>1</td><td>2</td>"));
}

#[test]
fn only_allow_listed_tags_are_emitted() {
    let markup = body(CAPTURED_PAGE);
    let parsed = Html::parse_fragment(&markup);
    let every = Selector::parse("*").unwrap();
    for element in parsed.select(&every) {
        let name = element.value().name();
        if name == "html" {
            continue;
        }
        assert!(ALLOWED_TAGS.contains(&name), "<{name}> is not allow-listed");
    }
}

#[test]
fn converting_twice_is_stable() {
    for html in [
        CAPTURED_PAGE,
        r#"<div class="x"><b>Hi</b><script>evil()</script></div>"#,
        "<p>a<br>b<hr>c</p><ul><li>one<li>two</ul>",
        "plain text with < and & and \"quotes\"",
        "<span></span><p title='a \"q\"'>x</p>",
        "<xmp>a<b</xmp>",
        "<p>a &amp; b</p><xmp>1 & 2</xmp>",
        "<pre>\n\nx</pre>",
        "<pre>\nline one\nline two</pre>",
        "<tr><td>x</td></tr>",
    ] {
        let once = body(html);
        assert_eq!(body(&once), once, "not idempotent for {html:?}");
    }
}

#[test]
fn preformatted_text_keeps_its_content() {
    assert_eq!(body("<pre>\n\nx</pre>"), "<pre>\n\nx</pre>");
    assert_eq!(body("<xmp>1 & 2</xmp>"), "<pre>1 &amp; 2</pre>");
}

#[test]
fn copied_table_rows_keep_their_cells() {
    assert_eq!(
        body("<tr><td>x</td><td>y</td></tr>"),
        "<table><tbody><tr><td>x</td><td>y</td></tr></tbody></table>"
    );
    assert_eq!(
        body("<td>only</td>"),
        "<table><tbody><tr><td>only</td></tr></tbody></table>"
    );
}

#[test]
fn void_tags_self_close_and_others_do_not() {
    assert_eq!(
        body("<p>a<br>b</p><hr><span></span>"),
        "<p>a<br/>b</p><hr/><span></span>"
    );
}

#[test]
fn malformed_markup_never_fails() {
    let markup = body("<div><p>unclosed <b>bold<i>both</div></p>trailing</b>");
    assert!(markup.contains("unclosed"));
    assert!(markup.contains("trailing"));
    assert!(!markup.contains("<html"));
}

#[test]
fn legacy_encoded_pages_are_decoded_before_conversion() {
    let latin1 = b"<p>Caf\xe9</p>";
    let decoded = decode_staged_html(latin1, Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded.encoding_label, "windows-1252");
    assert_eq!(body(&decoded.html), "<p>Café</p>");
}
