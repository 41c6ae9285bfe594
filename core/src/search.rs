use crate::cache::{CacheStats, SegmentCache, SegmentLoader};
use crate::codec::IndexCodec;
use crate::metadata::{load_meta, MetaFile};
use crate::persist::{IndexPaths, IndexSegment, RegistrySegment};
use crate::tokenizer::Tokenizer;
use crate::weighting::{Ltc, Weighting};
use crate::{DocId, Error, Posting, Result, SearchConfig};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub external_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// Documents matching at least one query term.
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

struct IndexFiles {
    paths: IndexPaths,
    codec: IndexCodec,
}

impl SegmentLoader<String, IndexSegment> for IndexFiles {
    fn load(&self, _first_key: &String, file_name: &str) -> Result<IndexSegment> {
        IndexSegment::load(&self.paths.segment(file_name), self.codec)
    }
}

struct RegistryFiles {
    paths: IndexPaths,
}

impl SegmentLoader<DocId, RegistrySegment> for RegistryFiles {
    fn load(&self, first_key: &DocId, file_name: &str) -> Result<RegistrySegment> {
        RegistrySegment::load(&self.paths.segment(file_name), *first_key)
    }
}

/// A query term found in the index.
struct MatchedTerm {
    term: String,
    segment: Arc<IndexSegment>,
    weight: f32,
}

/// Ranked cosine retrieval over a built index.
///
/// The segment caches are the only state shared between queries; everything
/// else a query needs lives on its own stack.
pub struct Searcher {
    paths: IndexPaths,
    meta: MetaFile,
    tokenizer: Tokenizer,
    top_k: usize,
    index_cache: Mutex<SegmentCache<String, IndexSegment, IndexFiles>>,
    registry_cache: Mutex<SegmentCache<DocId, RegistrySegment, RegistryFiles>>,
}

impl Searcher {
    pub fn open(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let tokenizer = Tokenizer::load(config.stopwords.as_deref())?;
        Self::with_tokenizer(config, tokenizer)
    }

    pub fn with_tokenizer(config: &SearchConfig, tokenizer: Tokenizer) -> Result<Self> {
        let paths = IndexPaths::new(&config.index);
        let meta = load_meta(&paths)?;
        if !meta.variant.has_idf() {
            return Err(Error::UnsupportedVariant(meta.variant.to_string()));
        }

        let index_capacity = config.cache_capacity(config.index_cache_fraction, meta.max_index_segment_bytes);
        let registry_capacity = config.cache_capacity(config.registry_cache_fraction, meta.max_registry_segment_bytes);
        let index_cache = SegmentCache::new(
            meta.index_table(),
            index_capacity,
            IndexFiles { paths: paths.clone(), codec: IndexCodec::final_segments(meta.variant) },
        );
        let registry_cache = SegmentCache::new(meta.registry_table(), registry_capacity, RegistryFiles { paths: paths.clone() });
        tracing::info!(
            index = %paths.root.display(),
            documents = meta.num_docs,
            index_segments = meta.index_segments.len(),
            index_capacity,
            registry_capacity,
            "searcher ready"
        );
        Ok(Self {
            paths,
            meta,
            tokenizer,
            top_k: config.top_k,
            index_cache: Mutex::new(index_cache),
            registry_cache: Mutex::new(registry_cache),
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.meta.num_docs
    }

    pub fn meta(&self) -> &MetaFile {
        &self.meta
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.index_cache.lock().stats(), self.registry_cache.lock().stats())
    }

    /// Up to the configured top-k hits, best first.
    pub fn query(&self, text: &str) -> Result<Vec<SearchHit>> {
        Ok(self.search(text, self.top_k)?.hits)
    }

    /// External identifiers of [`Searcher::query`].
    pub fn query_ids(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.query(text)?.into_iter().map(|h| h.external_id).collect())
    }

    pub fn search(&self, text: &str, k: usize) -> Result<SearchResults> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for (term, _pos) in self.tokenizer.tokenize(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Ok(SearchResults { total_hits: 0, hits: Vec::new() });
        }

        let mut ltc = Ltc::new();
        let mut weights: Vec<(String, f32)> = ltc.weights(&counts).into_iter().collect();
        // Lexical order keeps cache loads and evictions reproducible.
        weights.sort_by(|a, b| a.0.cmp(&b.0));

        let mut matched = Vec::with_capacity(weights.len());
        for (term, weight) in weights {
            let Some(segment) = self.index_cache.lock().get(&term)? else { continue };
            let Some(idf) = segment.get(&term).map(|e| e.idf.unwrap_or(0.0)) else { continue };
            let weight = ltc.apply_idf(weight, idf);
            matched.push(MatchedTerm { term, segment, weight });
        }
        for m in &mut matched {
            m.weight = ltc.normalize(m.weight);
        }
        ltc.reset_accumulator();

        let lists: Vec<(&[Posting], f32)> = matched
            .iter()
            .filter_map(|m| m.segment.get(&m.term).map(|e| (e.postings.as_slice(), m.weight)))
            .collect();
        let mut scored = score(&lists);
        let total_hits = scored.len();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        let mut hits = Vec::with_capacity(scored.len());
        for (doc_id, score) in scored {
            hits.push(SearchHit { doc_id, external_id: self.external_id(doc_id)?, score });
        }
        Ok(SearchResults { total_hits, hits })
    }

    fn external_id(&self, doc_id: DocId) -> Result<String> {
        let segment = self.registry_cache.lock().get(&doc_id)?;
        segment
            .and_then(|s| s.get(doc_id).map(str::to_string))
            .ok_or_else(|| Error::corrupt(self.paths.meta(), 0, format!("no external id for document {doc_id}")))
    }
}

/// Walks all lists in doc id order, summing `query weight * posting weight`
/// for every list positioned on the current document.
fn score(lists: &[(&[Posting], f32)]) -> Vec<(DocId, f32)> {
    let mut cursors = vec![0usize; lists.len()];
    let mut scored = Vec::new();
    loop {
        let current = lists
            .iter()
            .zip(&cursors)
            .filter_map(|((postings, _), &c)| postings.get(c).map(|p| p.doc_id))
            .min();
        let Some(doc_id) = current else { break };

        let mut sum = 0.0f32;
        for ((postings, q_w), c) in lists.iter().zip(cursors.iter_mut()) {
            if let Some(p) = postings.get(*c) {
                if p.doc_id == doc_id {
                    sum += q_w * p.weight;
                    *c += 1;
                }
            }
        }
        scored.push((doc_id, sum));
    }
    scored
}
