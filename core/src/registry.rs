use crate::DocId;

/// Hands out sequential document ids (1-based, no gaps) and remembers the
/// external identifiers registered since the last flush.
#[derive(Debug)]
pub struct DocumentRegistry {
    next_id: DocId,
    pending_start: DocId,
    pending: Vec<String>,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self { next_id: 1, pending_start: 1, pending: Vec::new() }
    }
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, external_id: impl Into<String>) -> DocId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(external_id.into());
        id
    }

    /// Documents registered so far.
    pub fn len(&self) -> u64 {
        u64::from(self.next_id - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == 1
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending.iter().map(|s| s.len() + std::mem::size_of::<String>()).sum()
    }

    /// The (doc id, external id) pairs registered since the previous call, in id order.
    pub fn take_increment(&mut self) -> Vec<(DocId, String)> {
        let start = self.pending_start;
        self.pending_start = self.next_id;
        std::mem::take(&mut self.pending)
            .into_iter()
            .enumerate()
            .map(|(i, ext)| (start + i as DocId, ext))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increments_are_contiguous() {
        let mut reg = DocumentRegistry::new();
        assert_eq!(reg.register("a"), 1);
        assert_eq!(reg.register("b"), 2);
        assert_eq!(reg.take_increment(), vec![(1, "a".to_string()), (2, "b".to_string())]);
        assert_eq!(reg.register("c"), 3);
        assert_eq!(reg.take_increment(), vec![(3, "c".to_string())]);
        assert!(reg.take_increment().is_empty());
        assert_eq!(reg.len(), 3);
    }
}
