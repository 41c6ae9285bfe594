//! Single-pass in-memory indexing under a memory budget.
//!
//! Documents accumulate in an [`IndexBuilder`] until the estimated footprint
//! reaches `load_factor` of the budget. The batch is then sorted and written
//! to a temporary run and the builder starts over. [`SpimiIndexer::finish`]
//! k-way merges all runs into the final, size-bounded index segments and
//! assigns every term its IDF. A build that never spilled merges its single
//! in-memory run through the same path, so IDF is assigned in one place.

use crate::builder::IndexBuilder;
use crate::codec::{IndexCodec, RegistryCodec};
use crate::metadata::{self, MetaFile, FORMAT_VERSION};
use crate::persist::{IndexPaths, SegmentPersister, SegmentReader, INDEX_PREFIX, REGISTRY_PREFIX, SPILL_PREFIX};
use crate::registry::DocumentRegistry;
use crate::tokenizer::Tokenizer;
use crate::weighting::{Lnc, RawFrequency, Weighting};
use crate::{DocId, Error, IndexConfig, IndexVariant, PostingList, Result, SourceDocument, TermEntry};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Indexing,
    Spilling,
    Merging,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub documents: u64,
    pub terms: u64,
    pub spills: usize,
    pub index_segments: usize,
    pub registry_segments: usize,
}

/// Temporary run files, removed when dropped.
#[derive(Default)]
struct SpillFiles {
    paths: Vec<PathBuf>,
}

impl SpillFiles {
    /// Tries every file; the ones that could not be removed stay tracked for `drop`.
    fn remove_all(&mut self) -> Result<()> {
        let mut first_error = None;
        self.paths.retain(|path| match std::fs::remove_file(path) {
            Ok(()) => false,
            Err(e) => {
                first_error.get_or_insert_with(|| Error::io(path, e));
                true
            }
        });
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for SpillFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// One sorted input of the merge.
struct Run {
    label: PathBuf,
    entries: Box<dyn Iterator<Item = Result<TermEntry>>>,
    read: usize,
}

impl Run {
    fn next_entry(&mut self) -> Result<Option<TermEntry>> {
        let next = self.entries.next().transpose()?;
        if next.is_some() {
            self.read += 1;
        }
        Ok(next)
    }
}

pub struct SpimiIndexer<W: Weighting> {
    config: IndexConfig,
    paths: IndexPaths,
    tokenizer: Tokenizer,
    builder: IndexBuilder<W>,
    registry: DocumentRegistry,
    registry_out: SegmentPersister<RegistryCodec>,
    spills: SpillFiles,
    phase: Phase,
}

impl<W: Weighting> SpimiIndexer<W> {
    pub fn new(config: IndexConfig, weighting: W) -> Result<Self> {
        config.validate()?;
        let tokenizer = Tokenizer::load(config.stopwords.as_deref())?;
        Self::with_tokenizer(config, weighting, tokenizer)
    }

    pub fn with_tokenizer(config: IndexConfig, weighting: W, tokenizer: Tokenizer) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.output).map_err(|e| Error::io(&config.output, e))?;
        let paths = IndexPaths::new(&config.output);
        let registry_out =
            SegmentPersister::new(&paths.root, REGISTRY_PREFIX, config.max_registry_segment_bytes(), RegistryCodec);
        let builder = IndexBuilder::new(weighting, config.variant.has_positions());
        tracing::info!(output = %paths.root.display(), variant = %config.variant, "indexing");
        Ok(Self {
            config,
            paths,
            tokenizer,
            builder,
            registry: DocumentRegistry::new(),
            registry_out,
            spills: SpillFiles::default(),
            phase: Phase::Indexing,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn spill_count(&self) -> usize {
        self.spills.paths.len()
    }

    pub fn add_document(&mut self, doc: &SourceDocument) -> Result<DocId> {
        let terms = self.tokenizer.tokenize_fields(&doc.fields);
        self.add_terms(&doc.external_id, &terms)
    }

    /// Registers a document and indexes its already tokenized terms.
    ///
    /// Documents without terms get an id but no postings.
    pub fn add_terms(&mut self, external_id: &str, terms: &[(String, u32)]) -> Result<DocId> {
        let external_id = if external_id.contains(['\n', '\r']) {
            tracing::warn!(external_id, "replacing line breaks in external id");
            external_id.replace(['\n', '\r'], " ")
        } else {
            external_id.to_string()
        };
        let doc_id = self.registry.register(external_id);
        self.builder.index(doc_id, terms)?;
        if self.under_pressure() {
            self.spill()?;
        }
        Ok(doc_id)
    }

    fn memory_used(&self) -> usize {
        self.builder.estimated_bytes() + self.registry.pending_bytes()
    }

    fn under_pressure(&self) -> bool {
        let ratio = self.memory_used() as f64 / self.config.memory_budget_bytes() as f64;
        ratio >= self.config.load_factor
    }

    fn spill(&mut self) -> Result<()> {
        self.phase = Phase::Spilling;
        let used = self.memory_used();
        let entries = self.builder.drain_sorted();
        if !entries.is_empty() {
            let n = self.spills.paths.len() + 1;
            // tracked before writing, so a half-written run is still cleaned up
            self.spills.paths.push(self.paths.spill_run(n));
            let mut run = SegmentPersister::new(&self.paths.root, SPILL_PREFIX, u64::MAX, IndexCodec::spill_runs(self.config.variant))
                .temporary()
                .starting_at(n);
            let terms = entries.len();
            run.persist(entries.into_iter().map(|(term, postings)| TermEntry { term, idf: None, postings }), true)?;
            tracing::debug!(run = self.spills.paths.len(), terms, bytes = run.bytes_written(), used, "spilled in-memory index");
        }
        self.registry_out.persist(self.registry.take_increment(), false)?;
        self.builder.clear();
        self.phase = Phase::Indexing;
        Ok(())
    }

    /// Merges everything indexed so far into the final segments and writes the metadata.
    pub fn finish(mut self) -> Result<IndexSummary> {
        if !self.spills.paths.is_empty() && !self.builder.is_empty() {
            self.spill()?;
        }
        self.phase = Phase::Merging;
        let total_documents = self.registry.len();
        self.registry_out.persist(self.registry.take_increment(), true)?;

        let variant = self.config.variant;
        let runs = if self.spills.paths.is_empty() {
            let batch = self.builder.drain_sorted();
            vec![Run {
                label: PathBuf::from("<memory>"),
                entries: Box::new(batch.into_iter().map(|(term, postings)| Ok(TermEntry { term, idf: None, postings }))),
                read: 0,
            }]
        } else {
            self.spills
                .paths
                .iter()
                .map(|path| {
                    let reader = SegmentReader::open(path, IndexCodec::spill_runs(variant))?;
                    Ok(Run { label: path.clone(), entries: Box::new(reader), read: 0 })
                })
                .collect::<Result<Vec<_>>>()?
        };
        tracing::info!(runs = runs.len(), documents = total_documents, "merging");

        let mut index_out = SegmentPersister::new(
            &self.paths.root,
            INDEX_PREFIX,
            self.config.max_index_segment_bytes(),
            IndexCodec::final_segments(variant),
        );
        let flush_bytes = (self.config.memory_budget_bytes() as f64 * self.config.load_factor) as usize;
        let terms = merge_runs(runs, self.builder.weighting(), total_documents, &mut index_out, flush_bytes)?;

        let spills = self.spills.paths.len();
        self.spills.remove_all()?;

        let meta = MetaFile {
            num_docs: total_documents,
            registry_segments: self.registry_out.segments().to_vec(),
            index_segments: index_out.segments().to_vec(),
            num_terms: terms,
            variant,
            max_index_segment_bytes: self.config.max_index_segment_bytes(),
            max_registry_segment_bytes: self.config.max_registry_segment_bytes(),
            created_at: metadata::now_rfc3339(),
            version: FORMAT_VERSION,
        };
        metadata::save_meta(&self.paths, &meta)?;
        self.phase = Phase::Done;

        let summary = IndexSummary {
            documents: total_documents,
            terms,
            spills,
            index_segments: meta.index_segments.len(),
            registry_segments: meta.registry_segments.len(),
        };
        tracing::info!(?summary, "index build complete");
        Ok(summary)
    }
}

/// K-way merge of sorted runs into `out`. Returns the number of distinct terms.
///
/// A term found at the head of several runs is merged into a single entry; its
/// IDF is assigned here once the merged list is complete.
fn merge_runs<W: Weighting>(
    mut runs: Vec<Run>,
    weighting: &W,
    total_documents: u64,
    out: &mut SegmentPersister<IndexCodec>,
    flush_bytes: usize,
) -> Result<u64> {
    let mut heads: Vec<Option<TermEntry>> = Vec::with_capacity(runs.len());
    let mut heap: BinaryHeap<Reverse<(String, usize)>> = BinaryHeap::with_capacity(runs.len());
    for (i, run) in runs.iter_mut().enumerate() {
        let head = run.next_entry()?;
        if let Some(entry) = &head {
            heap.push(Reverse((entry.term.clone(), i)));
        }
        heads.push(head);
    }

    let mut terms = 0u64;
    let mut batch: Vec<TermEntry> = Vec::new();
    let mut batch_bytes = 0usize;
    while let Some(Reverse((term, first))) = heap.pop() {
        let mut contributors = vec![first];
        while heap.peek().is_some_and(|Reverse((t, _))| *t == term) {
            if let Some(Reverse((_, i))) = heap.pop() {
                contributors.push(i);
            }
        }
        contributors.sort_unstable();

        let mut lists = Vec::with_capacity(contributors.len());
        for &i in &contributors {
            if let Some(head) = heads[i].take() {
                lists.push(head.postings);
            }
            let run = &mut runs[i];
            if let Some(next) = run.next_entry()? {
                if next.term <= term {
                    return Err(Error::corrupt(&run.label, run.read, format!("term '{}' follows '{term}'", next.term)));
                }
                heap.push(Reverse((next.term.clone(), i)));
                heads[i] = Some(next);
            }
        }

        let postings = PostingList::merge(lists).map_err(|doc_id| {
            Error::corrupt(&runs[first].label, runs[first].read, format!("document {doc_id} listed twice for '{term}'"))
        })?;
        let idf = weighting.finalize(&term, &postings, total_documents);

        batch_bytes += term.len() + postings.heap_bytes() + std::mem::size_of::<TermEntry>();
        batch.push(TermEntry { term, idf, postings });
        terms += 1;
        if batch_bytes >= flush_bytes {
            out.persist(std::mem::take(&mut batch), false)?;
            batch_bytes = 0;
        }
    }
    out.persist(batch, true)?;
    Ok(terms)
}

/// Indexes `documents` with the weighting that matches `config.variant`.
pub fn build_index<I>(config: IndexConfig, documents: I) -> Result<IndexSummary>
where
    I: IntoIterator<Item = Result<SourceDocument>>,
{
    match config.variant {
        IndexVariant::Frequency => run(SpimiIndexer::new(config, RawFrequency)?, documents),
        IndexVariant::Weighted | IndexVariant::Positional => run(SpimiIndexer::new(config, Lnc::new())?, documents),
    }
}

fn run<W, I>(mut indexer: SpimiIndexer<W>, documents: I) -> Result<IndexSummary>
where
    W: Weighting,
    I: IntoIterator<Item = Result<SourceDocument>>,
{
    for doc in documents {
        indexer.add_document(&doc?)?;
    }
    indexer.finish()
}
