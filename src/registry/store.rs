// src/registry/store.rs

use std::path::Path;

use crate::registry::descriptor::StoreDescriptor;
use crate::watch::patterns::EntityGlob;
use crate::watch::path_utils::{relative_str, to_slash};

/// Build the descriptor for a store file.
///
/// The name is the path relative to the glob's static base, without the
/// extension: `stores/user/Profile.js` → `user/Profile`.
pub fn store_descriptor(root: &Path, glob: &EntityGlob, path: &Path) -> StoreDescriptor {
    let base = root.join(glob.base());
    let rel = relative_str(&base, path).unwrap_or_else(|| to_slash(path));
    let name = match rel.rfind('.') {
        Some(dot) if dot > rel.rfind('/').map_or(0, |slash| slash + 1) => rel[..dot].to_string(),
        _ => rel,
    };

    StoreDescriptor {
        name,
        path: path.to_path_buf(),
    }
}
