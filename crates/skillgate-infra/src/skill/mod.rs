//! Skill package loading.
//!
//! Compiled-in skills come from a `StaticLoader` catalog; everything else is
//! read from the package's JSON entry file.

pub mod declarative;
pub mod loader;

pub use declarative::{parse_entry, StaticModule, Step};
pub use loader::PackageLoader;
