use std::collections::HashMap;

use crate::lin::Line;

const NIL: usize = usize::MAX;

// Upper bound on up-front allocation for large capacities
const MAX_PREALLOC: usize = 4096;

#[derive(Debug, Clone)]
struct Node {
    index: u64,
    line: Line,
    prev: usize,
    next: usize,
}

/// Count-bounded LRU cache of decoded lines keyed by ordinal index
///
/// Entries live in a slab and are threaded on a doubly linked list ordered
/// from most to least recently used, so lookup, insertion and eviction are
/// all O(1). Once full, an eviction hands its slot to the incoming line.
#[derive(Debug, Clone)]
pub struct LineCache {
    capacity: usize,
    slots: HashMap<u64, usize>,
    nodes: Vec<Node>,
    head: usize,
    tail: usize,
}

impl LineCache {
    pub fn new(capacity: usize) -> Self {
        let prealloc = capacity.min(MAX_PREALLOC);
        Self {
            capacity,
            slots: HashMap::with_capacity(prealloc),
            nodes: Vec::with_capacity(prealloc),
            head: NIL,
            tail: NIL,
        }
    }

    /// Look up a line and mark it most recently used
    pub fn get(&mut self, index: u64) -> Option<Line> {
        let slot = *self.slots.get(&index)?;
        self.touch(slot);
        Some(self.nodes[slot].line.clone())
    }

    /// Look up a line without changing recency
    pub fn peek(&self, index: u64) -> Option<&Line> {
        self.slots.get(&index).map(|&slot| &self.nodes[slot].line)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.slots.contains_key(&index)
    }

    /// Insert or refresh a line; returns the index evicted to make room.
    pub fn put(&mut self, index: u64, line: Line) -> Option<u64> {
        if self.capacity == 0 {
            return None;
        }

        if let Some(&slot) = self.slots.get(&index) {
            self.nodes[slot].line = line;
            self.touch(slot);
            return None;
        }

        if self.nodes.len() < self.capacity {
            let slot = self.nodes.len();
            self.nodes.push(Node {
                index,
                line,
                prev: NIL,
                next: NIL,
            });
            self.link_front(slot);
            self.slots.insert(index, slot);
            return None;
        }

        let slot = self.tail;
        self.unlink(slot);
        let evicted = self.nodes[slot].index;
        self.slots.remove(&evicted);
        self.nodes[slot] = Node {
            index,
            line,
            prev: NIL,
            next: NIL,
        };
        self.link_front(slot);
        self.slots.insert(index, slot);
        Some(evicted)
    }

    /// Index that the next insertion into a full cache would evict
    pub fn lru_index(&self) -> Option<u64> {
        (self.tail != NIL).then(|| self.nodes[self.tail].index)
    }

    /// Cached indices from most to least recently used
    pub fn recency(&self) -> impl Iterator<Item = u64> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let node = &self.nodes[cursor];
            cursor = node.next;
            Some(node.index)
        })
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn touch(&mut self, slot: usize) {
        if self.head == slot {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.nodes[slot];
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn link_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(index: u64) -> Line {
        let text = format!("line{index}");
        let len = text.len() + 1;
        Line::new(index, text, len, 0)
    }

    fn filled(capacity: usize, count: u64) -> LineCache {
        let mut cache = LineCache::new(capacity);
        for i in 0..count {
            cache.put(i, line(i));
        }
        cache
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = filled(3, 3);
        assert_eq!(cache.lru_index(), Some(0));

        assert_eq!(cache.put(3, line(3)), Some(0));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(0).is_none());
        assert_eq!(cache.recency().collect::<Vec<_>>(), [3, 2, 1]);
    }

    #[test]
    fn get_refreshes_recency() {
        let mut cache = filled(3, 3);
        assert_eq!(cache.get(0).unwrap(), "line0");

        assert_eq!(cache.put(3, line(3)), Some(1));
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert_eq!(cache.recency().collect::<Vec<_>>(), [3, 0, 2]);
    }

    #[test]
    fn peek_leaves_recency_alone() {
        let mut cache = filled(2, 2);
        assert_eq!(cache.peek(0).map(Line::text), Some("line0"));
        assert_eq!(cache.put(2, line(2)), Some(0));
    }

    #[test]
    fn put_existing_refreshes_without_eviction() {
        let mut cache = filled(2, 2);
        assert_eq!(cache.put(0, line(0)), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lru_index(), Some(1));
    }

    #[test]
    fn zero_capacity_is_a_no_op() {
        let mut cache = filled(0, 5);
        assert!(cache.is_empty());
        assert!(cache.get(0).is_none());
        assert_eq!(cache.lru_index(), None);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut cache = filled(4, 100);
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.recency().collect::<Vec<_>>(), [99, 98, 97, 96]);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.put(7, line(7)), None);
        assert_eq!(cache.recency().collect::<Vec<_>>(), [7]);
    }

    #[test]
    fn single_slot_cache() {
        let mut cache = filled(1, 1);
        assert_eq!(cache.put(1, line(1)), Some(0));
        assert_eq!(cache.get(1).unwrap().index(), 1);
        assert_eq!(cache.lru_index(), Some(1));
    }
}
