//! Directory slot management: name validation, uniqueness, lookup.

use crate::error::{FsError, Result};
use crate::layout::NAME_LEN;
use crate::meta::{DirTable, FileEntry};

/// A name must be 1..=11 bytes, free of control characters and of
/// surrounding whitespace (which the on-disk padding would swallow).
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= NAME_LEN
        && !name.chars().any(char::is_control)
        && name.trim() == name;
    if valid {
        Ok(())
    } else {
        Err(FsError::InvalidName(name.to_string()))
    }
}

impl DirTable {
    /// Slot holding `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|e| e.name == name))
    }

    pub fn get(&self, slot: usize) -> Option<&FileEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut FileEntry> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Occupied slots in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &FileEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| e.as_ref().map(|e| (slot, e)))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().map(|(_, e)| e.name.clone()).collect()
    }

    /// Install an empty entry for `name` in the lowest free slot.
    pub fn create(&mut self, name: &str) -> Result<usize> {
        validate_name(name)?;
        if self.lookup(name).is_some() {
            return Err(FsError::DuplicateName(name.to_string()));
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::DirectoryFull)?;
        self.slots[slot] = Some(FileEntry::new(name));
        Ok(slot)
    }

    /// Clear the slot holding `name` and return its former entry.
    pub fn remove(&mut self, name: &str) -> Result<FileEntry> {
        let slot = self
            .lookup(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.slots[slot]
            .take()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }
}
