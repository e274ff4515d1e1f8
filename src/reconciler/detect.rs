//! Reuse-versus-fetch decisions against the previous snapshot.

use crate::snapshot::{LoadedEntry, Snapshot};
use crate::store::SecretMetadata;
use std::collections::HashMap;

/// What to do with one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Unchanged since the previous pass
    Reuse(LoadedEntry),
    Fetch,
}

/// Tracks which previous entries this pass has consumed
#[derive(Debug)]
pub(crate) struct ChangeDetector<'a> {
    prior: HashMap<&'a str, &'a LoadedEntry>,
}

impl<'a> ChangeDetector<'a> {
    pub(crate) fn new(previous: &'a Snapshot) -> Self {
        Self {
            prior: previous
                .secrets()
                .iter()
                .map(|(id, entry)| (id.as_str(), entry))
                .collect(),
        }
    }

    /// Reuse requires a prior entry for the same identifier with an identical timestamp
    pub(crate) fn classify(&mut self, candidate: &SecretMetadata) -> Decision {
        let id = candidate.name.as_str();
        let reusable = self
            .prior
            .get(id)
            .filter(|entry| entry.is_up_to_date(candidate.updated))
            .map(|entry| LoadedEntry::clone(entry));

        match reusable {
            Some(entry) => {
                self.prior.remove(id);
                Decision::Reuse(entry)
            }
            None => Decision::Fetch,
        }
    }

    /// Identifiers of previous entries that were not reused
    pub(crate) fn into_unconsumed(self) -> impl Iterator<Item = &'a str> {
        self.prior.into_keys()
    }
}
