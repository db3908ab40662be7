//! Indexed element tables.
//!
//! A [`Table`] keeps its rows ordered by index and hands out indices from a
//! monotonic counter, so an index removed from the table is never issued
//! again. Loaders can place rows at explicit indices to preserve the indices
//! found in a file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Upper bound (exclusive) on row indices. Files store indices as `uint32`.
pub const MAX_INDEX: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<T> {
    rows: BTreeMap<usize, T>,
    next_index: usize,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_index: 0,
        }
    }
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row under a fresh index.
    pub fn insert(&mut self, row: T) -> GridResult<usize> {
        let index = self.next_index;
        if index >= MAX_INDEX {
            return Err(GridError::validation("element index space exhausted"));
        }
        self.rows.insert(index, row);
        self.next_index = index + 1;
        Ok(index)
    }

    /// Places a row at a caller-chosen index. An occupied or out-of-range
    /// index is rejected and the table is left unchanged.
    pub fn insert_at(&mut self, index: usize, row: T) -> GridResult<()> {
        if index >= MAX_INDEX {
            return Err(GridError::validation(format!(
                "index {index} out of range (limit {MAX_INDEX})"
            )));
        }
        if self.rows.contains_key(&index) {
            return Err(GridError::validation(format!("duplicate index {index}")));
        }
        self.next_index = self.next_index.max(index + 1);
        self.rows.insert(index, row);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.rows.get_mut(&index)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.rows.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.rows.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.rows.iter().map(|(idx, row)| (*idx, row))
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Index the next [`Table::insert`] will issue.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Raises the counter so indices below `next` are never issued.
    /// Never lowers it.
    pub fn reserve_through(&mut self, next: usize) -> GridResult<()> {
        if next > MAX_INDEX {
            return Err(GridError::validation(format!(
                "next index {next} out of range (limit {MAX_INDEX})"
            )));
        }
        self.next_index = self.next_index.max(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_issues_sequential_indices() {
        let mut table = Table::new();
        assert_eq!(table.insert("a").unwrap(), 0);
        assert_eq!(table.insert("b").unwrap(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_removed_index_never_reissued() {
        let mut table = Table::new();
        let a = table.insert(1).unwrap();
        let b = table.insert(2).unwrap();
        table.remove(b);
        let c = table.insert(3).unwrap();
        assert_ne!(c, b);
        assert_ne!(c, a);
        assert_eq!(c, 2);
    }

    #[test]
    fn test_insert_at_advances_counter() {
        let mut table = Table::new();
        table.insert_at(5, "x").unwrap();
        assert_eq!(table.insert("y").unwrap(), 6);
        assert_eq!(table.indices().collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_reserve_through_never_lowers() {
        let mut table: Table<u8> = Table::new();
        table.reserve_through(10).unwrap();
        table.reserve_through(3).unwrap();
        assert_eq!(table.next_index(), 10);
    }

    #[test]
    fn test_insert_at_rejects_occupied_index() {
        let mut table = Table::new();
        table.insert_at(2, "first").unwrap();
        assert!(matches!(table.insert_at(2, "second"), Err(GridError::Validation(_))));
        assert_eq!(table.get(2), Some(&"first"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut table = Table::new();
        assert!(table.insert_at(usize::MAX, 'a').is_err());
        assert!(table.insert_at(MAX_INDEX, 'a').is_err());
        assert!(table.is_empty());
        assert_eq!(table.next_index(), 0);

        assert!(table.reserve_through(usize::MAX).is_err());
        assert_eq!(table.next_index(), 0);
    }

    #[test]
    fn test_exhausted_counter_errors_instead_of_wrapping() {
        let mut table = Table::new();
        table.insert_at(MAX_INDEX - 1, 'a').unwrap();
        assert_eq!(table.next_index(), MAX_INDEX);
        assert!(table.insert('b').is_err());
        assert_eq!(table.len(), 1);
        assert!(!table.contains(0));
    }
}
