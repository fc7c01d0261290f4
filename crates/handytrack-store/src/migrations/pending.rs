//! Pending migration sequence

use super::definition::MigrationDefinition;
use handytrack_core::SchemaVersion;

/// Definitions newer than the store's current version, ascending
///
/// Borrowed from the runner's sorted definition list, so it is lazy and can
/// be cloned to walk the sequence again.
#[derive(Clone)]
pub struct PendingMigrations<'a> {
    remaining: std::slice::Iter<'a, MigrationDefinition>,
}

impl<'a> PendingMigrations<'a> {
    pub(crate) fn new(definitions: &'a [MigrationDefinition]) -> Self {
        Self {
            remaining: definitions.iter(),
        }
    }

    /// True when the store is already current
    pub fn is_empty(&self) -> bool {
        self.remaining.len() == 0
    }

    /// Versions still to be applied
    pub fn versions(&self) -> Vec<SchemaVersion> {
        self.clone().map(|d| d.version().clone()).collect()
    }
}

impl<'a> Iterator for PendingMigrations<'a> {
    type Item = &'a MigrationDefinition;

    fn next(&mut self) -> Option<Self::Item> {
        self.remaining.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.remaining.size_hint()
    }
}

impl ExactSizeIterator for PendingMigrations<'_> {}

impl std::fmt::Debug for PendingMigrations<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.clone().map(|d| d.version())).finish()
    }
}
