use crate::cursor::RecordCursor;

/// Min-heap of live cursors keyed by their current record's timestamp
///
/// Equal timestamps are ordered by source position (earlier source first), so
/// a merge of the same inputs always produces the same output. Exhausted
/// cursors never enter the heap.
#[derive(Default)]
pub struct Frontier {
    heap: Vec<RecordCursor>,
}

impl Frontier {
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn insert(&mut self, cursor: RecordCursor) {
        debug_assert!(!cursor.is_exhausted(), "exhausted cursor inserted");
        self.heap.push(cursor);
        self.sift_up(self.heap.len() - 1);
    }

    pub fn extract_min(&mut self) -> Option<RecordCursor> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let min = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        min
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.heap[a], &self.heap[b]);
        (a.key(), a.ordinal()) < (b.key(), b.ordinal())
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(smallest, idx) {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }
}
