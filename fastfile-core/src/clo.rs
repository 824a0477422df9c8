// Start offsets of the lines seen so far in a pass
#[derive(Debug, Clone, Default)]
pub struct LineOffsets {
    // offsets[i] is the file offset where line i begins
    offsets: Vec<u64>,
}

impl LineOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    // Lines arrive in order, so only the next unseen index is stored
    pub fn record(&mut self, index: u64, offset: u64) {
        if index == self.offsets.len() as u64 {
            self.offsets.push(offset);
        }
    }

    pub fn start_of(&self, index: u64) -> Option<u64> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.offsets.get(i).copied())
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_the_next_index() {
        let mut offsets = LineOffsets::new();
        offsets.record(0, 0);
        offsets.record(1, 6);
        offsets.record(1, 99);
        offsets.record(5, 200);
        offsets.record(2, 13);

        assert_eq!(offsets.len(), 3);
        assert_eq!(offsets.start_of(1), Some(6));
        assert_eq!(offsets.start_of(2), Some(13));
        assert_eq!(offsets.start_of(3), None);

        offsets.clear();
        assert!(offsets.is_empty());
    }
}
