//! Production/development mode.

use std::fmt;

/// Server mode.
///
/// Production prerenders pages to disk; development renders every page on
/// demand from the live sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    /// Resolve mode from `PLEB_ENV`, falling back to `NODE_ENV`.
    ///
    /// Unset means production, so a bare `pleb build` emits a deployable site.
    pub fn from_env() -> Self {
        Self::from_env_values(
            std::env::var("PLEB_ENV").ok().as_deref(),
            std::env::var("NODE_ENV").ok().as_deref(),
        )
    }

    fn from_env_values(pleb_env: Option<&str>, node_env: Option<&str>) -> Self {
        match pleb_env.or(node_env).map(str::trim) {
            None | Some("") => Self::Production,
            Some(value) if value.eq_ignore_ascii_case("production") => Self::Production,
            Some(_) => Self::Development,
        }
    }

    #[inline]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_env_values() {
        assert_eq!(Mode::from_env_values(None, None), Mode::Production);
        assert_eq!(Mode::from_env_values(None, Some("production")), Mode::Production);
        assert_eq!(Mode::from_env_values(None, Some("development")), Mode::Development);
        assert_eq!(Mode::from_env_values(Some("PRODUCTION"), None), Mode::Production);
        assert_eq!(Mode::from_env_values(Some(""), Some("test")), Mode::Production);
    }

    #[test]
    fn test_pleb_env_takes_precedence() {
        assert_eq!(
            Mode::from_env_values(Some("development"), Some("production")),
            Mode::Development
        );
    }

    #[test]
    fn test_is_dev() {
        assert!(Mode::Development.is_dev());
        assert!(!Mode::Production.is_dev());
        assert_eq!(Mode::Production.to_string(), "production");
    }
}
