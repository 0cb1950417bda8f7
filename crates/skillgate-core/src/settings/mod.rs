//! Configuration store: dotted paths, deep merge, secret masking and the
//! per-skill settings service.

pub mod mask;
pub mod path;
pub mod store;

pub use mask::{apply_patch_with_mask_handling, mask_sensitive, MaskedSettings, MASK_SENTINEL};
pub use path::{deep_merge, delete_by_path, get_by_path, set_by_path};
pub use store::SettingsStore;
