//! The library provider is the other external collaborator boundary
//!: resolving `COPY` members and macro libraries by
//! logical name is a host concern (it might mean a directory on disk, a
//! dataset on a mainframe, or an in-memory map in tests). This module
//! defines the trait boundary plus the workspace-watcher registration
//! shape the host is expected to set up so the analysis stays current as
//! copybooks change on disk.

/// What the pipeline asks of a library provider when it hits a `COPY`
/// statement or needs to resolve a macro not defined in the current file.
pub trait LibraryProvider {
    /// Fetch the text of `logical_name`, or `None` if no member by that
    /// name is visible to this provider.
    fn fetch(&self, logical_name: &str) -> Option<String>;
    fn has_library(&self, logical_name: &str) -> bool;
}

/// A change class the host should watch for on a registered folder.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WatchKind {
    Create,
    Change,
    Delete,
}

#[derive(Clone, Debug)]
pub struct WatcherRegistration {
    pub id: WatcherId,
    pub base_uri: String,
    pub glob_pattern: String,
    pub kinds: Vec<WatchKind>,
}

impl WatcherRegistration {
    /// Does `relative_path` (a path relative to `base_uri`) fall under this
    /// watcher's glob? Matching is case-insensitive, mirroring the
    /// `glob::MatchOptions { case_sensitive: false, .. }` the host uses when
    /// walking a workspace folder for source files.
    pub fn matches(&self, relative_path: &str) -> Result<bool, globset::Error> {
        let matcher = globset::GlobBuilder::new(&self.glob_pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(matcher.is_match(relative_path) || matcher.is_match(relative_path.to_uppercase()))
    }
}

/// Monotonic watcher id, formatted `"watcher_<n>"`; `0` is never issued
///.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WatcherId(u64);

impl std::fmt::Display for WatcherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watcher_{}", self.0)
    }
}

#[derive(Default)]
pub struct WatcherIdGen {
    next: u64,
}
impl WatcherIdGen {
    pub fn new() -> Self {
        Self { next: 1 }
    }
    pub fn next(&mut self) -> WatcherId {
        let id = WatcherId(self.next);
        self.next += 1;
        id
    }
}

/// Build the pair of watcher registrations for a library folder: a
/// recursive (or flat) content watcher rooted at the folder itself, plus
/// a `create|delete`-only watcher rooted at the *parent* folder that
/// catches the folder itself being renamed or deleted out from under the
/// analysis.
pub fn register_folder(
    gen: &mut WatcherIdGen,
    folder_uri: &str,
    folder_name: &str,
    parent_uri: &str,
    recursive: bool,
) -> [WatcherRegistration; 2] {
    let content_pattern = if recursive { "**/*".to_string() } else { "*".to_string() };
    let content = WatcherRegistration {
        id: gen.next(),
        base_uri: folder_uri.to_string(),
        glob_pattern: content_pattern,
        kinds: vec![WatchKind::Create, WatchKind::Change, WatchKind::Delete],
    };
    let existence = WatcherRegistration {
        id: gen.next(),
        base_uri: parent_uri.to_string(),
        glob_pattern: folder_name.to_string(),
        kinds: vec![WatchKind::Create, WatchKind::Delete],
    };
    [content, existence]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_ids_start_at_one_and_are_monotonic() {
        let mut gen = WatcherIdGen::new();
        let a = gen.next();
        let b = gen.next();
        assert_eq!(a.to_string(), "watcher_1");
        assert_eq!(b.to_string(), "watcher_2");
    }

    #[test]
    fn register_folder_produces_content_and_existence_watchers() {
        let mut gen = WatcherIdGen::new();
        let [content, existence] = register_folder(&mut gen, "file:///ws/copy", "copy", "file:///ws", true);
        assert_eq!(content.glob_pattern, "**/*");
        assert_eq!(content.kinds.len(), 3);
        assert_eq!(existence.glob_pattern, "copy");
        assert_eq!(existence.kinds, vec![WatchKind::Create, WatchKind::Delete]);
        assert_eq!(existence.base_uri, "file:///ws");
    }

    #[test]
    fn flat_library_folder_uses_single_star() {
        let mut gen = WatcherIdGen::new();
        let [content, _] = register_folder(&mut gen, "file:///ws/copy", "copy", "file:///ws", false);
        assert_eq!(content.glob_pattern, "*");
    }

    #[test]
    fn recursive_watcher_matches_nested_paths_case_insensitively() {
        let mut gen = WatcherIdGen::new();
        let [content, _] = register_folder(&mut gen, "file:///ws/copy", "copy", "file:///ws", true);
        assert!(content.matches("sub/member.cpy").unwrap());
        assert!(content.matches("SUB/MEMBER.CPY").unwrap());
    }

    #[test]
    fn flat_watcher_rejects_nested_paths() {
        let mut gen = WatcherIdGen::new();
        let [content, _] = register_folder(&mut gen, "file:///ws/copy", "copy", "file:///ws", false);
        assert!(content.matches("member.cpy").unwrap());
        assert!(!content.matches("sub/member.cpy").unwrap());
    }
}
