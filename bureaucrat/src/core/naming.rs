//! Advisory check for characters that make poor file-system names.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use crate::error::Warning;

fn is_portable(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '/')
}

/// Return the characters of `path` outside `[A-Za-z0-9._-/]`.
///
/// Never fails and never blocks anything; callers turn a non-empty result into
/// a warning.
pub fn flag_unsafe_characters(path: impl AsRef<Path>) -> BTreeSet<char> {
    path.as_ref()
        .to_string_lossy()
        .chars()
        .filter(|ch| !is_portable(*ch))
        .collect()
}

/// A [`Warning::UnsafeCharacters`] if `subject` has flagged characters.
pub fn check_naming(subject: &str) -> Option<Warning> {
    let characters = flag_unsafe_characters(subject);
    if characters.is_empty() {
        return None;
    }
    Some(Warning::UnsafeCharacters {
        subject: subject.to_string(),
        characters,
    })
}

/// True if `name` is exactly one normal path component.
///
/// Task and subrun names must be: a task is the directory directly under its
/// run, and a subrun the directory directly under `subruns/`. Anything deeper
/// would hide the run from structural ancestry lookups.
pub fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
