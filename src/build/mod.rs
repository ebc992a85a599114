//! Build orchestration.
//!
//! # Module Structure
//!
//! ```text
//! build/
//! ├── pipeline    # Pipeline, BuildState, PagePlan
//! ├── manifest    # BuildManifest, ManifestBuilder
//! └── error       # BuildError
//! ```
//!
//! # Output Layout
//!
//! ```text
//! <build>/
//! ├── buildManifest.json
//! ├── about.html              # prerendered documents
//! ├── static/
//! │   ├── favicon.ico         # copied from public/
//! │   └── chunks/about.js     # hydration bundles
//! └── server/about.mjs        # server modules
//! ```

mod error;
mod manifest;
mod pipeline;

pub use error::BuildError;
pub use manifest::{BuildManifest, ManifestBuilder, PageManifestEntry};
pub use pipeline::{BuildOutput, BuildState, Pipeline, plan_pages};
