//! Attest Value Registry
//!
//! Implements the `ProvenanceStore` trait as a session-scoped, in-memory,
//! append-mostly keyed store.
//!
//! # Semantics
//!
//! - Entries are keyed by `(session_id, property_name, structure_id)`
//! - Committed entries never change; a divergent recomputation supersedes
//!   the old entry, which stays reachable through [`ValueRegistry::superseded`]
//! - Queries return entries in commit order
//! - Numeric lookups match within a relative tolerance plus an absolute floor
//!
//! # Examples
//!
//! ```
//! use attest_domain::{CallId, ProvenanceDraft, SessionId, Tolerance, Unit};
//! use attest_domain::traits::ProvenanceStore;
//! use attest_registry::ValueRegistry;
//!
//! let mut registry = ValueRegistry::new(SessionId::new("s-1"));
//! let draft = ProvenanceDraft::new(
//!     "formation_energy", -6.823, Unit::parse("eV/atom"),
//!     "structure_analysis", CallId::new("c1"),
//! );
//! registry.put(draft).unwrap();
//!
//! let hit = registry.find_matching(-6.82, &Tolerance::default(), &|_| true);
//! assert!(hit.is_some());
//! ```

#![warn(missing_docs)]

use attest_domain::traits::{DuplicateKeyConflict, EntryQuery, ProvenanceStore, PutOutcome};
use attest_domain::{EntryKey, EntryRef, ProvenanceDraft, ProvenanceEntry, SessionId, Tolerance};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Relative difference below which two values count as the same computation
const SAME_VALUE_EPSILON: f64 = 1e-9;

/// Registry write failures
///
/// Any of these is fatal for the session: the pipeline halts numeric
/// rendering rather than continue with a registry it cannot trust.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Value is NaN or infinite
    #[error("Non-finite value for {key}: {value}")]
    NonFiniteValue {
        /// Offending key
        key: String,
        /// Offending value
        value: f64,
    },

    /// Property name is blank
    #[error("Empty property name from tool '{tool}'")]
    EmptyPropertyName {
        /// Tool that produced the draft
        tool: String,
    },

    /// The registry is full
    #[error("Registry capacity exceeded: limit {limit}")]
    CapacityExceeded {
        /// Configured limit
        limit: usize,
    },
}

/// Session-scoped provenance registry
#[derive(Debug, Clone)]
pub struct ValueRegistry {
    session_id: SessionId,
    current: BTreeMap<EntryRef, ProvenanceEntry>,
    by_key: HashMap<EntryKey, EntryRef>,
    superseded: Vec<ProvenanceEntry>,
    next_seq: u64,
    max_entries: Option<usize>,
}

impl ValueRegistry {
    /// Create an empty registry for a session
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            current: BTreeMap::new(),
            by_key: HashMap::new(),
            superseded: Vec::new(),
            next_seq: 1,
            max_entries: None,
        }
    }

    /// Cap the number of current entries
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.max_entries = Some(limit);
        self
    }

    /// Session this registry belongs to
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current entries in commit order
    pub fn entries(&self) -> impl Iterator<Item = &ProvenanceEntry> {
        self.current.values()
    }

    /// Entries replaced by later recomputations, oldest first
    pub fn superseded(&self) -> &[ProvenanceEntry] {
        &self.superseded
    }

    /// Current entry for a key
    pub fn get_by_key(&self, key: &EntryKey) -> Option<&ProvenanceEntry> {
        self.by_key.get(key).and_then(|entry_ref| self.current.get(entry_ref))
    }

    /// Commit a draft with an explicit commit time
    pub fn put_at(
        &mut self,
        draft: ProvenanceDraft,
        timestamp: DateTime<Utc>,
    ) -> Result<PutOutcome, RegistryError> {
        self.check_draft(&draft)?;
        let key = draft.key(&self.session_id);

        let existing_ref = self.by_key.get(&key).copied();
        if existing_ref.is_none() {
            if let Some(limit) = self.max_entries {
                if self.current.len() >= limit {
                    return Err(RegistryError::CapacityExceeded { limit });
                }
            }
        }

        if let Some(existing_ref) = existing_ref {
            if let Some(existing) = self.current.get(&existing_ref) {
                if same_value(existing.value(), draft.value) && *existing.unit() == draft.unit {
                    debug!("Unchanged recomputation of {}", key);
                    return Ok(PutOutcome::Unchanged(existing_ref));
                }
            }
        }

        let entry_ref = EntryRef::from_seq(self.next_seq);
        self.next_seq += 1;
        let entry = draft.commit(entry_ref, self.session_id.clone(), timestamp);
        self.current.insert(entry_ref, entry.clone());
        self.by_key.insert(key.clone(), entry_ref);

        let previous = existing_ref.and_then(|old_ref| self.current.remove(&old_ref));
        match previous {
            Some(previous) => {
                warn!(
                    "Duplicate key conflict for {}: {} {} replaced by {} {}",
                    key,
                    previous.value(),
                    previous.unit(),
                    entry.value(),
                    entry.unit()
                );
                self.superseded.push(previous.clone());
                Ok(PutOutcome::Conflict(DuplicateKeyConflict {
                    key,
                    previous,
                    current: entry,
                }))
            }
            None => {
                debug!("Committed {} as {}", key, entry_ref);
                Ok(PutOutcome::Inserted(entry_ref))
            }
        }
    }

    /// Commit every draft of one tool output, or none of them
    ///
    /// All drafts are validated before the first insert, so a failing batch
    /// leaves the registry untouched.
    pub fn commit_batch(
        &mut self,
        drafts: Vec<ProvenanceDraft>,
    ) -> Result<Vec<PutOutcome>, RegistryError> {
        for draft in &drafts {
            self.check_draft(draft)?;
        }

        if let Some(limit) = self.max_entries {
            let new_keys: HashSet<EntryKey> = drafts
                .iter()
                .map(|draft| draft.key(&self.session_id))
                .filter(|key| !self.by_key.contains_key(key))
                .collect();
            if self.current.len() + new_keys.len() > limit {
                return Err(RegistryError::CapacityExceeded { limit });
            }
        }

        let now = Utc::now();
        drafts
            .into_iter()
            .map(|draft| self.put_at(draft, now))
            .collect()
    }

    /// Hand the committed state over at session end
    pub fn into_entries(self) -> (Vec<ProvenanceEntry>, Vec<ProvenanceEntry>) {
        (self.current.into_values().collect(), self.superseded)
    }

    fn check_draft(&self, draft: &ProvenanceDraft) -> Result<(), RegistryError> {
        if draft.property_name.trim().is_empty() {
            return Err(RegistryError::EmptyPropertyName {
                tool: draft.source_tool.clone(),
            });
        }
        if !draft.value.is_finite() {
            return Err(RegistryError::NonFiniteValue {
                key: draft.key(&self.session_id).to_string(),
                value: draft.value,
            });
        }
        Ok(())
    }
}

impl ProvenanceStore for ValueRegistry {
    type Error = RegistryError;

    fn put(&mut self, draft: ProvenanceDraft) -> Result<PutOutcome, Self::Error> {
        self.put_at(draft, Utc::now())
    }

    fn get(&self, entry_ref: EntryRef) -> Option<&ProvenanceEntry> {
        self.current.get(&entry_ref)
    }

    fn query(&self, query: &EntryQuery) -> Vec<&ProvenanceEntry> {
        let matches = self.current.values().filter(|entry| query.accepts(entry));
        match query.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        }
    }

    fn find_matching(
        &self,
        value: f64,
        tolerance: &Tolerance,
        compatible: &dyn Fn(&ProvenanceEntry) -> bool,
    ) -> Option<&ProvenanceEntry> {
        self.current.values().find(|entry| {
            entry.unit().is_known() && tolerance.matches(value, entry.value()) && compatible(entry)
        })
    }

    fn len(&self) -> usize {
        self.current.len()
    }
}

fn same_value(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= SAME_VALUE_EPSILON * scale
}
