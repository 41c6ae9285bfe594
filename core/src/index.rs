use serde::{Deserialize, Serialize};

pub type DocId = u32;

/// One document as handed over by the corpus reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub external_id: String,
    /// Text fields in document order, e.g. title then body.
    pub fields: Vec<String>,
}

impl SourceDocument {
    pub fn new(external_id: impl Into<String>, fields: Vec<String>) -> Self {
        Self { external_id: external_id.into(), fields }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized lnc weight, or the raw count for frequency indexes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId, weight: f32) -> Self {
        Self { doc_id, weight, positions: Vec::new() }
    }
}

/// Postings of a single term, strictly ascending by doc id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `posting`, refusing ids that are not greater than the current tail.
    pub fn push(&mut self, posting: Posting) -> Result<(), Posting> {
        match self.postings.last() {
            Some(last) if last.doc_id >= posting.doc_id => Err(posting),
            _ => {
                self.postings.push(posting);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn last_doc_id(&self) -> Option<DocId> {
        self.postings.last().map(|p| p.doc_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }

    pub fn is_strictly_ascending(&self) -> bool {
        self.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id)
    }

    /// Heap bytes owned by this list.
    pub fn heap_bytes(&self) -> usize {
        self.postings.capacity() * std::mem::size_of::<Posting>()
            + self.postings.iter().map(|p| p.positions.capacity() * std::mem::size_of::<u32>()).sum::<usize>()
    }

    /// K-way merge of lists that each satisfy the ordering invariant.
    ///
    /// Every step takes the smallest head doc id across all lists. A doc id present
    /// in two lists is returned as `Err(doc_id)`.
    pub fn merge(lists: Vec<PostingList>) -> Result<PostingList, DocId> {
        let mut lists = lists;
        if lists.len() == 1 {
            return Ok(lists.pop().unwrap_or_default());
        }
        let total = lists.iter().map(PostingList::len).sum();
        let mut cursors: Vec<std::iter::Peekable<std::vec::IntoIter<Posting>>> =
            lists.into_iter().map(|l| l.postings.into_iter().peekable()).collect();
        let mut merged = PostingList { postings: Vec::with_capacity(total) };
        loop {
            let mut smallest: Option<(usize, DocId)> = None;
            for (i, cursor) in cursors.iter_mut().enumerate() {
                if let Some(head) = cursor.peek() {
                    match smallest {
                        Some((_, id)) if id < head.doc_id => {}
                        Some((_, id)) if id == head.doc_id => return Err(id),
                        _ => smallest = Some((i, head.doc_id)),
                    }
                }
            }
            let Some((i, _)) = smallest else { break };
            if let Some(posting) = cursors[i].next() {
                merged.push(posting).map_err(|p| p.doc_id)?;
            }
        }
        Ok(merged)
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}

/// A term record as stored in a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct TermEntry {
    pub term: String,
    /// Absent in spill runs and in frequency-only indexes.
    pub idf: Option<f32>,
    pub postings: PostingList,
}
