//! Embedded static resources.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `document` - HTML document shell wrapped around every page
//! - `compiler` - JavaScript entry wrappers and the render shim
//!
//! # Usage
//!
//! ```ignore
//! use embed::compiler::{EntryVars, HYDRATE_ENTRY};
//!
//! let entry = HYDRATE_ENTRY.render(&EntryVars { source: &page_path });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod document {
    use super::{Template, TemplateVars};

    /// Marker replaced by the page markup.
    pub const ROOT_MARKER: &str = "<!--pleb-root-->";

    /// Variables for document.html. Values must already be escaped.
    pub struct DocumentVars<'a> {
        pub lang: &'a str,
        pub title: &'a str,
        pub description: &'a str,
        pub theme_color: &'a str,
        pub favicon: &'a str,
        pub pleb_data: &'a str,
        pub script_url: &'a str,
    }

    impl TemplateVars for DocumentVars<'_> {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__LANG__", self.lang)
                .replace("__TITLE__", self.title)
                .replace("__DESCRIPTION__", self.description)
                .replace("__THEME_COLOR__", self.theme_color)
                .replace("__FAVICON__", self.favicon)
                .replace("__PLEB_DATA__", self.pleb_data)
                .replace("__SCRIPT_URL__", self.script_url)
        }
    }

    /// Document shell around the `#__pleb` root.
    pub const DOCUMENT_HTML: Template<DocumentVars<'static>> =
        Template::new(include_str!("document/document.html"));
}

pub mod compiler {
    use super::{Template, TemplateVars};

    /// File name of the render shim inside `<build>/server/`.
    pub const RENDER_SHIM_NAME: &str = "render.mjs";

    /// Runtime script that imports a server module and streams its markup.
    pub const RENDER_SHIM: &str = include_str!("compiler/render.mjs");

    /// Variables for the entry wrappers.
    pub struct EntryVars<'a> {
        /// Absolute path of the page source.
        pub source: &'a str,
    }

    impl TemplateVars for EntryVars<'_> {
        fn apply(&self, content: &str) -> String {
            // A JSON string is a valid JavaScript string literal
            let literal = serde_json::to_string(self.source).unwrap_or_else(|_| "\"\"".into());
            content.replace("__PAGE_SOURCE__", &literal)
        }
    }

    /// Browser entry: hydrates `#__pleb` with the page component.
    pub const HYDRATE_ENTRY: Template<EntryVars<'static>> =
        Template::new(include_str!("compiler/hydrate.mjs"));

    /// Server entry: exports `render(output, exit)` for the render shim.
    pub const SERVER_ENTRY: Template<EntryVars<'static>> =
        Template::new(include_str!("compiler/server.mjs"));
}

#[cfg(test)]
mod tests {
    use super::compiler::*;
    use super::document::*;

    #[test]
    fn test_document_has_single_root_marker() {
        assert_eq!(DOCUMENT_HTML.content().matches(ROOT_MARKER).count(), 1);
    }

    #[test]
    fn test_document_vars_applied() {
        let html = DOCUMENT_HTML.render(&DocumentVars {
            lang: "en",
            title: "Pleb App",
            description: "Web site created using pleb",
            theme_color: "#000000",
            favicon: "/__pleb/static/favicon.ico",
            pleb_data: "{}",
            script_url: "/__pleb/static/chunks/index.js",
        });
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<title>Pleb App</title>"));
        assert!(html.contains("src=\"/__pleb/static/chunks/index.js\""));
        assert!(!html.contains("__TITLE__"));
    }

    #[test]
    fn test_entry_quotes_source_path() {
        let js = HYDRATE_ENTRY.render(&EntryVars {
            source: "C:\\site\\pages\\about.tsx",
        });
        assert!(js.contains(r#"import Page from "C:\\site\\pages\\about.tsx";"#));

        let js = SERVER_ENTRY.render(&EntryVars {
            source: "/site/pages/about.tsx",
        });
        assert!(js.contains(r#"import Page from "/site/pages/about.tsx";"#));
        assert!(js.contains("export function render"));
    }

    #[test]
    fn test_render_shim_reads_module_argument() {
        assert!(RENDER_SHIM.contains("process.argv[2]"));
    }
}
