use std::fmt;
use std::path::PathBuf;

/// Which of the three raw watch sources produced an event.
///
/// - `Stores`: the store-file glob.
/// - `Manifests`: the component-manifest glob.
/// - `ComponentDirs`: the dynamic set of component directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Stores,
    Manifests,
    ComponentDirs,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Stores,
        SourceKind::Manifests,
        SourceKind::ComponentDirs,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Stores => "stores",
            SourceKind::Manifests => "manifests",
            SourceKind::ComponentDirs => "component-dirs",
        };
        f.write_str(s)
    }
}

/// Kind of an unclassified filesystem notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Add,
    Change,
    Unlink,
}

/// A raw event as delivered by one of the watch sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub source: SourceKind,
    pub kind: RawEventKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(source: SourceKind, kind: RawEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            kind,
            path: path.into(),
        }
    }
}
