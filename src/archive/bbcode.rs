//! BBCode to HTML conversion for archived post bodies.

use std::collections::HashMap;

use html_escape::{encode_double_quoted_attribute, encode_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::Attachment;

fn rule(pattern: &str, replacement: &'static str) -> (Regex, &'static str) {
    let re = Regex::new(&format!("(?is){pattern}"))
        .unwrap_or_else(|e| panic!("invalid bbcode pattern {pattern}: {e}"));
    (re, replacement)
}

/// Applied in order to already-escaped text.
static RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        rule(r"\[b\](.*?)\[/b\]", "<strong>${1}</strong>"),
        rule(r"\[i\](.*?)\[/i\]", "<em>${1}</em>"),
        rule(r"\[u\](.*?)\[/u\]", "<u>${1}</u>"),
        rule(
            r"\[color=(.*?)\](.*?)\[/color\]",
            r#"<span style="color: ${1}">${2}</span>"#,
        ),
        rule(
            r"\[size=(.*?)\](.*?)\[/size\]",
            r#"<span style="font-size: ${1}px">${2}</span>"#,
        ),
        rule(
            r"\[url=(.*?)\](.*?)\[/url\]",
            r#"<a href="${1}" target="_blank">${2}</a>"#,
        ),
        rule(
            r"\[url\](.*?)\[/url\]",
            r#"<a href="${1}" target="_blank">${1}</a>"#,
        ),
        rule(
            r"\[img\](.*?)\[/img\]",
            r#"<img src="${1}" alt="Image" style="max-width: 100%;">"#,
        ),
        rule(
            r"\[youtube\](.*?)\[/youtube\]",
            r#"<div class="youtube-container"><iframe width="560" height="315" src="https://www.youtube.com/embed/${1}" frameborder="0" allowfullscreen></iframe></div>"#,
        ),
        rule(r"\[quote\](.*?)\[/quote\]", "<blockquote>${1}</blockquote>"),
        rule(r"\[code\](.*?)\[/code\]", "<pre><code>${1}</code></pre>"),
    ]
});

static ATTACH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[attach\](\d+)\[/attach\]").expect("attach regex"));

/// Render a post body. Markup in the source is escaped before any BBCode
/// is expanded, so only the tags listed above can produce HTML.
pub fn to_html(text: &str, attachments: &HashMap<i64, Attachment>) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut html = encode_quoted_attribute(text).into_owned();
    for (re, replacement) in RULES.iter() {
        html = re.replace_all(&html, *replacement).into_owned();
    }

    let html = ATTACH.replace_all(&html, |caps: &Captures<'_>| {
        let aid = caps[1].parse::<i64>().unwrap_or_default();
        attachment_html(aid, attachments.get(&aid))
    });

    html.replace("\r\n", "<br>").replace('\n', "<br>")
}

fn attachment_html(aid: i64, attachment: Option<&Attachment>) -> String {
    let Some(att) = attachment else {
        return format!("[附件 {aid} 未找到]");
    };
    let src = format!("attachments/{}", att.path);
    let src = encode_double_quoted_attribute(&src);
    let name_attr = encode_double_quoted_attribute(&att.filename);
    let name_text = encode_text(&att.filename);
    if att.is_image {
        format!(
            r#"<div class="attachment image"><img src="{src}" alt="{name_attr}" style="max-width: 100%;"><br><small>附件: {name_text}</small></div>"#
        )
    } else {
        format!(
            r#"<div class="attachment file"><a href="{src}" download="{name_attr}">{name_text}</a></div>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_attachments() -> HashMap<i64, Attachment> {
        HashMap::new()
    }

    #[test]
    fn converts_basic_formatting() {
        let html = to_html("[b]bold[/b] [I]it[/i] [u]under[/u]", &no_attachments());
        assert_eq!(html, "<strong>bold</strong> <em>it</em> <u>under</u>");
    }

    #[test]
    fn escapes_raw_markup_first() {
        let html = to_html("<script>alert('x')</script> & [b]ok[/b]", &no_attachments());
        assert!(html.starts_with("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("<strong>ok</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn converts_links_images_and_video() {
        let html = to_html(
            "[url=http://sega.com]Sega[/url] [url]http://a.b[/url] [img]http://x/y.png[/img] [youtube]abc123[/youtube]",
            &no_attachments(),
        );
        assert!(html.contains(r#"<a href="http://sega.com" target="_blank">Sega</a>"#));
        assert!(html.contains(r#"<a href="http://a.b" target="_blank">http://a.b</a>"#));
        assert!(html.contains(r#"<img src="http://x/y.png""#));
        assert!(html.contains("https://www.youtube.com/embed/abc123"));
    }

    #[test]
    fn spans_newlines_and_converts_breaks() {
        let html = to_html("[quote]line one\nline two[/quote]\r\nafter", &no_attachments());
        assert_eq!(html, "<blockquote>line one<br>line two</blockquote><br>after");
    }

    #[test]
    fn color_and_size() {
        let html = to_html("[color=red]hot[/color][size=4]big[/size]", &no_attachments());
        assert_eq!(
            html,
            r#"<span style="color: red">hot</span><span style="font-size: 4px">big</span>"#
        );
    }

    #[test]
    fn renders_attachments() {
        let mut attachments = HashMap::new();
        attachments.insert(
            3,
            Attachment {
                aid: 3,
                tid: 1,
                pid: 1,
                filename: "sonic.png".into(),
                path: "month_0801/sonic.png".into(),
                is_image: true,
            },
        );
        attachments.insert(
            4,
            Attachment {
                aid: 4,
                tid: 1,
                pid: 1,
                filename: "save.zip".into(),
                path: "month_0801/save.zip".into(),
                is_image: false,
            },
        );

        let html = to_html("[attach]3[/attach][attach]4[/attach][attach]99[/attach]", &attachments);
        assert!(html.contains(r#"<img src="attachments/month_0801/sonic.png" alt="sonic.png""#));
        assert!(html.contains("附件: sonic.png"));
        assert!(html.contains(r#"<a href="attachments/month_0801/save.zip" download="save.zip">save.zip</a>"#));
        assert!(html.contains("[附件 99 未找到]"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(to_html("", &no_attachments()), "");
    }
}
