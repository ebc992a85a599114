//! `[document]` section configuration.
//!
//! Head metadata of the HTML shell every page is rendered into.
//!
//! ```toml
//! [document]
//! lang = "en"
//! title = "Pleb App"
//! description = "Web site created using pleb"
//! theme_color = "#000000"
//! favicon = "/__pleb/static/favicon.ico"
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub lang: String,
    pub title: String,
    pub description: String,
    pub theme_color: String,
    pub favicon: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            lang: "en".into(),
            title: "Pleb App".into(),
            description: "Web site created using pleb".into(),
            theme_color: "#000000".into(),
            favicon: "/__pleb/static/favicon.ico".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_document_config() {
        let config = test_parse_config("[document]\ntitle = \"My Site\"\nlang = \"de\"");
        assert_eq!(config.document.title, "My Site");
        assert_eq!(config.document.lang, "de");
        assert_eq!(config.document.description, "Web site created using pleb");
        assert_eq!(config.document.theme_color, "#000000");
    }
}
