//! Core types - pure abstractions shared across the codebase.

mod mode;
pub mod slug;

pub use mode::Mode;
pub use slug::{Slug, SlugError};

/// URL prefix of everything the framework serves itself.
pub const PLEB_PREFIX: &str = "/__pleb";

/// URL prefix of `<build>/static/`.
pub const STATIC_PREFIX: &str = "/__pleb/static/";

/// URL prefix of on-demand development modules.
pub const DEV_PREFIX: &str = "/__pleb/dev/";

/// Manifest file name inside the build directory.
pub const MANIFEST_FILE: &str = "buildManifest.json";

/// Build subdirectory holding public assets and client bundles.
pub const STATIC_DIR: &str = "static";

/// `static/` subdirectory holding compiled client bundles.
pub const CHUNKS_DIR: &str = "chunks";

/// Build subdirectory holding server modules.
pub const SERVER_DIR: &str = "server";
