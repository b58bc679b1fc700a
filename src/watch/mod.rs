// src/watch/mod.rs

//! File watching and path reconciliation.
//!
//! This module is responsible for:
//! - Compiling entity globs and walking the tree for matches.
//! - Wiring up cross-platform filesystem watchers (`notify`) as raw sources,
//!   with nested directory watches kept from overlapping.
//! - Resolving which component owns a changed path.
//! - Classifying a changed file by the role it plays in its component.
//!
//! It does **not** mutate the registry; that happens in [`crate::engine`].

pub mod classifier;
pub mod cover;
pub mod path_utils;
pub mod patterns;
pub mod resolver;
pub mod source;

pub use classifier::{classify, FileRole};
pub use cover::{CoverChange, WatchCover};
pub use patterns::{collect_files, collect_matching_files, EntityGlob};
pub use resolver::{resolve, Resolution};
pub use source::{
    NotifySource, NotifySourceFactory, RawInput, RawWatchSource, SourceFactory, WatchTarget,
};
