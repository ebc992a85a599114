//! The HTML document shell around page markup.

use serde_json::json;

use crate::config::DocumentConfig;
use crate::core::Slug;
use crate::embed::document::{DOCUMENT_HTML, DocumentVars, ROOT_MARKER};

/// Document split around the `#__pleb` root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentShell {
    /// Everything up to and including the root element's open tag.
    pub head: String,
    /// The root's close tag and everything after it.
    pub tail: String,
}

impl DocumentShell {
    pub fn new(config: &DocumentConfig, slug: &Slug, script_url: &str) -> Self {
        let lang = escape_html(&config.lang);
        let title = escape_html(&config.title);
        let description = escape_html(&config.description);
        let theme_color = escape_html(&config.theme_color);
        let favicon = escape_html(&config.favicon);
        let script_url = escape_html(script_url);
        let pleb_data = pleb_data(slug);

        let html = DOCUMENT_HTML.render(&DocumentVars {
            lang: &lang,
            title: &title,
            description: &description,
            theme_color: &theme_color,
            favicon: &favicon,
            pleb_data: &pleb_data,
            script_url: &script_url,
        });

        match html.split_once(ROOT_MARKER) {
            Some((head, tail)) => Self {
                head: head.to_string(),
                tail: tail.to_string(),
            },
            None => Self {
                head: html,
                tail: String::new(),
            },
        }
    }

    /// Whole document with `markup` inside the root.
    pub fn wrap(&self, markup: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + markup.len() + self.tail.len());
        out.push_str(&self.head);
        out.push_str(markup);
        out.push_str(&self.tail);
        out
    }
}

/// Escape text for HTML content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `PLEB_DATA` payload, safe to embed in a `<script>` element.
fn pleb_data(slug: &Slug) -> String {
    json!({ "slug": slug })
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_splits_around_root() {
        let shell = DocumentShell::new(
            &DocumentConfig::default(),
            &Slug::from_request("/about").unwrap(),
            "/__pleb/static/chunks/about.js",
        );
        assert!(shell.head.ends_with("<div id=\"__pleb\">"));
        assert!(shell.tail.starts_with("</div>"));
        assert!(shell.head.contains("<title>Pleb App</title>"));
        assert!(shell.head.contains("content=\"Web site created using pleb\""));
        assert!(shell.head.contains("<meta name=\"theme-color\" content=\"#000000\" />"));
        assert!(shell.tail.contains(r#"<script id="PLEB_DATA" type="application/json">{"slug":"/about"}</script>"#));
        assert!(shell.tail.contains(r#"src="/__pleb/static/chunks/about.js""#));

        let html = shell.wrap("<h1>About</h1>");
        assert!(html.contains("<div id=\"__pleb\"><h1>About</h1></div>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_shell_escapes_config_values() {
        let config = DocumentConfig {
            title: "Tom & \"Jerry\" <3".into(),
            ..Default::default()
        };
        let shell = DocumentShell::new(&config, &Slug::root(), "/x.js");
        assert!(shell.head.contains("<title>Tom &amp; &quot;Jerry&quot; &lt;3</title>"));
    }

    #[test]
    fn test_pleb_data_cannot_close_script() {
        let slug = Slug::from_request("/%3C%2Fscript%3E").unwrap();
        let data = pleb_data(&slug);
        assert!(!data.contains("</script>"));
        assert!(data.contains("\\u003c/script\\u003e"));
    }
}
