//! Postings accumulator for the batch of documents currently held in memory.

use crate::codec::is_encodable_term;
use crate::weighting::Weighting;
use crate::{DocId, Error, Posting, PostingList, Result};
use std::collections::HashMap;
use std::mem::size_of;

// Per-term bookkeeping of a hashbrown entry besides key and value.
const ENTRY_OVERHEAD: usize = 24;

pub struct IndexBuilder<W: Weighting> {
    weighting: W,
    record_positions: bool,
    terms: HashMap<String, PostingList>,
    last_doc: Option<DocId>,
    estimated_bytes: usize,
}

impl<W: Weighting> IndexBuilder<W> {
    pub fn new(weighting: W, record_positions: bool) -> Self {
        Self { weighting, record_positions, terms: HashMap::new(), last_doc: None, estimated_bytes: 0 }
    }

    /// Adds one posting per distinct term of the document.
    ///
    /// `doc_id` must be greater than every id indexed before, which keeps each
    /// posting list sorted without re-sorting.
    pub fn index(&mut self, doc_id: DocId, terms: &[(String, u32)]) -> Result<()> {
        if let Some(last) = self.last_doc {
            if doc_id <= last {
                return Err(Error::NonMonotonicDocument { last, got: doc_id });
            }
        }

        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut positions: HashMap<&str, Vec<u32>> = HashMap::new();
        for (term, pos) in terms {
            if !is_encodable_term(term) {
                tracing::warn!(doc_id, term = term.as_str(), "skipping term containing a reserved separator");
                continue;
            }
            *counts.entry(term.clone()).or_insert(0) += 1;
            if self.record_positions {
                positions.entry(term.as_str()).or_default().push(*pos);
            }
        }
        if counts.is_empty() {
            return Ok(());
        }
        self.last_doc = Some(doc_id);

        self.weighting.reset_accumulator();
        let weights = self.weighting.weights(&counts);
        for (term, raw) in weights {
            let posting = Posting {
                doc_id,
                weight: self.weighting.normalize(raw),
                positions: positions.remove(term.as_str()).unwrap_or_default(),
            };
            let added = size_of::<Posting>() + posting.positions.len() * size_of::<u32>();
            if !self.terms.contains_key(&term) {
                self.estimated_bytes += term.len() + size_of::<String>() + size_of::<PostingList>() + ENTRY_OVERHEAD;
            }
            let list = self.terms.entry(term).or_default();
            if let Err(p) = list.push(posting) {
                return Err(Error::NonMonotonicDocument { last: list.last_doc_id().unwrap_or(0), got: p.doc_id });
            }
            self.estimated_bytes += added;
        }
        self.weighting.reset_accumulator();
        Ok(())
    }

    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn weighting(&self) -> &W {
        &self.weighting
    }

    /// Discards every posting. The doc id floor is kept so later documents still ascend.
    pub fn clear(&mut self) {
        self.terms = HashMap::new();
        self.estimated_bytes = 0;
    }

    /// Takes the whole batch sorted by term, leaving the builder empty.
    pub fn drain_sorted(&mut self) -> Vec<(String, PostingList)> {
        let mut entries: Vec<(String, PostingList)> = std::mem::take(&mut self.terms).into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        self.estimated_bytes = 0;
        entries
    }
}
