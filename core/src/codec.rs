//! Line encodings of segment records.
//!
//! Index records (one per line):
//!
//! ```text
//! frequency   term;doc:count;doc:count
//! weighted    term:idf;doc:weight;doc:weight
//! positional  term:idf;doc:weight,pos,pos;doc:weight
//! ```
//!
//! Spill runs use the configured layout without the `:idf` part. Registry
//! segments hold one external identifier per line; the doc id of the first
//! line is the segment's first key in the metadata.

use crate::{DocId, IndexVariant, Posting, PostingList, TermEntry};
use std::fmt::{self, Write as _};

const RESERVED: [char; 5] = [':', ';', ',', '\n', '\r'];

/// Whether a term can be written without clashing with the separators.
pub fn is_encodable_term(term: &str) -> bool {
    !term.is_empty() && !term.contains(RESERVED)
}

/// How a persister turns entries into bytes.
pub trait SegmentCodec {
    type Key: Ord + Clone + fmt::Debug;
    type Entry;

    fn key(&self, entry: &Self::Entry) -> Self::Key;

    /// Appends one encoded record, trailing newline included.
    fn encode(&self, entry: &Self::Entry, out: &mut String);
}

#[derive(Debug, Clone, Copy)]
pub struct IndexCodec {
    variant: IndexVariant,
    with_idf: bool,
}

impl IndexCodec {
    /// Codec for the final segments of an index of this variant.
    pub fn final_segments(variant: IndexVariant) -> Self {
        Self { variant, with_idf: variant.has_idf() }
    }

    /// Codec for temporary spill runs, written before any IDF is known.
    pub fn spill_runs(variant: IndexVariant) -> Self {
        Self { variant, with_idf: false }
    }

    pub fn decode(&self, line: &str) -> Result<TermEntry, String> {
        let mut records = line.split(';');
        let head = records.next().unwrap_or_default();
        let (term, idf) = if self.with_idf {
            let (term, idf) = head.rsplit_once(':').ok_or_else(|| format!("missing idf in '{head}'"))?;
            let idf = idf.parse::<f32>().map_err(|e| format!("bad idf '{idf}': {e}"))?;
            (term, Some(idf))
        } else {
            (head, None)
        };
        if term.is_empty() {
            return Err("empty term".into());
        }

        let mut postings = PostingList::new();
        for record in records {
            let posting = self.decode_posting(record)?;
            postings.push(posting).map_err(|p| format!("doc id {} out of order for '{term}'", p.doc_id))?;
        }
        if postings.is_empty() {
            return Err(format!("term '{term}' has no postings"));
        }
        Ok(TermEntry { term: term.to_string(), idf, postings })
    }

    fn decode_posting(&self, record: &str) -> Result<Posting, String> {
        let (doc, rest) = record.split_once(':').ok_or_else(|| format!("malformed posting '{record}'"))?;
        let doc_id = doc.parse::<DocId>().map_err(|e| format!("bad doc id '{doc}': {e}"))?;
        let mut parts = rest.split(',');
        let weight = parts.next().unwrap_or_default();
        let weight = weight.parse::<f32>().map_err(|e| format!("bad weight '{weight}': {e}"))?;
        let positions = if self.variant.has_positions() {
            parts.map(|p| p.parse::<u32>().map_err(|e| format!("bad position '{p}': {e}"))).collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(Posting { doc_id, weight, positions })
    }
}

impl SegmentCodec for IndexCodec {
    type Key = String;
    type Entry = TermEntry;

    fn key(&self, entry: &TermEntry) -> String {
        entry.term.clone()
    }

    fn encode(&self, entry: &TermEntry, out: &mut String) {
        out.push_str(&entry.term);
        if self.with_idf {
            let _ = write!(out, ":{}", entry.idf.unwrap_or(0.0));
        }
        for p in &entry.postings {
            let _ = write!(out, ";{}:{}", p.doc_id, p.weight);
            if self.variant.has_positions() {
                for pos in &p.positions {
                    let _ = write!(out, ",{pos}");
                }
            }
        }
        out.push('\n');
    }
}

/// Registry records: the external identifier alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryCodec;

impl SegmentCodec for RegistryCodec {
    type Key = DocId;
    type Entry = (DocId, String);

    fn key(&self, entry: &(DocId, String)) -> DocId {
        entry.0
    }

    fn encode(&self, entry: &(DocId, String), out: &mut String) {
        out.push_str(&entry.1);
        out.push('\n');
    }
}
