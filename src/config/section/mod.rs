//! Configuration section definitions.
//!
//! Each module corresponds to a section in `pleb.toml`:
//!
//! | Module     | TOML Section   | Purpose                               |
//! |------------|----------------|---------------------------------------|
//! | `build`    | `[build]`      | Pages, output and public directories  |
//! | `serve`    | `[serve]`      | HTTP server                           |
//! | `compiler` | `[compiler]`   | Bundler and runtime commands          |
//! | `document` | `[document]`   | Head metadata of the document shell   |

mod build;
mod compiler;
mod document;
mod serve;

pub use build::BuildConfig;
pub use compiler::CompilerConfig;
pub use document::DocumentConfig;
pub use serve::ServeConfig;
