//! Bounded, ordered collection of tag entries.

use exif::{Tag, Value};

use crate::error::PostprocError;

/// A single typed tag record.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub tag: Tag,
    pub value: Value,
}

/// Tag entries for one encoded image, in insertion order.
///
/// The capacity is fixed at construction; adding past it fails for that
/// entry only and leaves the set unchanged.
#[derive(Debug, Clone)]
pub struct TagEntrySet {
    capacity: usize,
    entries: Vec<TagEntry>,
}

impl TagEntrySet {
    /// Allocates room for `capacity` entries up front.
    pub fn new(capacity: usize) -> Result<Self, PostprocError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|e| PostprocError::out_of_memory(format!("tag entry set: {}", e)))?;
        Ok(Self { capacity, entries })
    }

    pub fn add(&mut self, tag: Tag, value: Value) -> Result<(), PostprocError> {
        if self.is_full() {
            return Err(PostprocError::out_of_memory(format!(
                "tag entry {} exceeds capacity {}",
                tag, self.capacity
            )));
        }
        self.entries.push(TagEntry { tag, value });
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// First value recorded for `tag`.
    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.entries.iter().find(|e| e.tag == tag).map(|e| &e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagEntry> {
        self.entries.iter()
    }

    /// Tags in insertion order.
    pub fn tags(&self) -> Vec<Tag> {
        self.entries.iter().map(|e| e.tag).collect()
    }
}
