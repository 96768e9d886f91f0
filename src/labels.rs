use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SelectorError};

/// Decision for a single member of the group under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Label {
    #[default]
    Undecided,
    Keep,
    Delete,
}

impl Label {
    pub fn is_decided(self) -> bool {
        !matches!(self, Label::Undecided)
    }

    /// Next state when the user applies `target`. Any decided state can be
    /// relabeled; nothing transitions back to `Undecided` except undo.
    pub fn transition(self, target: Label) -> Result<Label> {
        match target {
            Label::Undecided => Err(SelectorError::InvalidLabel),
            Label::Keep | Label::Delete => Ok(target),
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Label::Undecided => "[ ]",
            Label::Keep => "[K]",
            Label::Delete => "[D]",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Label::Undecided => "undecided",
            Label::Keep => "keep",
            Label::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Labels of the images currently in the open group, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct GroupLabels {
    members: HashMap<PathBuf, Label>,
}

impl GroupLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.members.contains_key(path)
    }

    pub fn label_of(&self, path: &Path) -> Option<Label> {
        self.members.get(path).copied()
    }

    /// Adds `path` as an undecided member. Returns false if it was already in.
    pub fn join(&mut self, path: &Path) -> bool {
        if self.members.contains_key(path) {
            return false;
        }
        self.members.insert(path.to_path_buf(), Label::Undecided);
        true
    }

    /// Removes `path`, discarding whatever label it had.
    pub fn leave(&mut self, path: &Path) -> Option<Label> {
        self.members.remove(path)
    }

    /// Applies `target` to a member and returns the label it had before.
    /// Returns `Ok(None)` when the member already carried `target`.
    pub fn apply(&mut self, path: &Path, target: Label) -> Result<Option<Label>> {
        let current = self
            .members
            .get_mut(path)
            .ok_or_else(|| SelectorError::NotInGroup(path.display().to_string()))?;
        let next = current.transition(target)?;
        if next == *current {
            return Ok(None);
        }
        let previous = *current;
        *current = next;
        Ok(Some(previous))
    }

    /// Puts a member back to an earlier label. Used by undo only.
    pub fn restore(&mut self, path: &Path, label: Label) -> Result<()> {
        let current = self
            .members
            .get_mut(path)
            .ok_or_else(|| SelectorError::NotInGroup(path.display().to_string()))?;
        *current = label;
        Ok(())
    }

    pub fn undecided_count(&self) -> usize {
        self.members.values().filter(|l| !l.is_decided()).count()
    }

    /// A group can be saved once every member is kept or deleted.
    pub fn ensure_complete(&self) -> Result<()> {
        match self.undecided_count() {
            0 => Ok(()),
            undecided => Err(SelectorError::IncompleteGroup { undecided }),
        }
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}
