//! Trait definitions for the seams between pipeline stages
//!
//! The registry crate implements [`ProvenanceStore`]; the render gate only
//! talks to the trait.

use crate::{EntryKey, EntryRef, ProvenanceDraft, ProvenanceEntry, Tolerance, Unit};

/// Session-scoped store of committed provenance entries
pub trait ProvenanceStore {
    /// Error type for write failures
    type Error;

    /// Commit a draft
    ///
    /// A materially different value for an existing key replaces the old
    /// entry and is reported as [`PutOutcome::Conflict`].
    fn put(&mut self, draft: ProvenanceDraft) -> Result<PutOutcome, Self::Error>;

    /// Look up a current entry by reference
    fn get(&self, entry_ref: EntryRef) -> Option<&ProvenanceEntry>;

    /// Current entries matching a query, in commit order
    fn query(&self, query: &EntryQuery) -> Vec<&ProvenanceEntry>;

    /// First current entry (in commit order) whose value matches within
    /// `tolerance` and which `compatible` accepts; unit-less entries never match
    fn find_matching(
        &self,
        value: f64,
        tolerance: &Tolerance,
        compatible: &dyn Fn(&ProvenanceEntry) -> bool,
    ) -> Option<&ProvenanceEntry>;

    /// Number of current entries
    fn len(&self) -> usize;

    /// Whether nothing has been committed
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a successful `put`
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    /// New key
    Inserted(EntryRef),

    /// Same key and same value; nothing changed
    Unchanged(EntryRef),

    /// Same key, different value; the new value won
    Conflict(DuplicateKeyConflict),
}

impl PutOutcome {
    /// Reference of the entry now current for the key
    pub fn entry_ref(&self) -> EntryRef {
        match self {
            PutOutcome::Inserted(entry_ref) | PutOutcome::Unchanged(entry_ref) => *entry_ref,
            PutOutcome::Conflict(conflict) => conflict.current.entry_ref(),
        }
    }
}

/// A divergent recomputation of the same property
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateKeyConflict {
    /// Contested key
    pub key: EntryKey,
    /// Entry that was superseded
    pub previous: ProvenanceEntry,
    /// Entry that is now current
    pub current: ProvenanceEntry,
}

/// Filter for [`ProvenanceStore::query`]
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Exact property name
    pub property_name: Option<String>,

    /// Exact structure id
    pub structure_id: Option<String>,

    /// Exact source tool
    pub source_tool: Option<String>,

    /// Exact unit
    pub unit: Option<Unit>,

    /// Maximum results to return
    pub limit: Option<usize>,
}

impl EntryQuery {
    /// Query by property name
    pub fn property(name: impl Into<String>) -> Self {
        Self {
            property_name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Whether an entry satisfies every set filter (ignores `limit`)
    pub fn accepts(&self, entry: &ProvenanceEntry) -> bool {
        self.property_name
            .as_deref()
            .map_or(true, |name| entry.property_name() == name)
            && self
                .structure_id
                .as_deref()
                .map_or(true, |structure| entry.structure_id() == Some(structure))
            && self
                .source_tool
                .as_deref()
                .map_or(true, |tool| entry.source_tool() == tool)
            && self.unit.as_ref().map_or(true, |unit| entry.unit() == unit)
    }
}
