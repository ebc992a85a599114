//! Shared helpers: processes, filesystem, paths, MIME types.

pub mod exec;
pub mod fs;
pub mod mime;
pub mod path;
pub mod plural;
