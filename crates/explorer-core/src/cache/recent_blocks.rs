use crate::cache::types::BlockSummary;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

/// Bounded, most-recent-first cache of block summaries.
///
/// Backed by a fixed-size circular buffer indexed by height offset, so inserting the next
/// height and looking up any height in the window are O(1). Advancing past the window evicts
/// the oldest slots. Re-inserting a height still inside the window replaces its summary,
/// which is how reorg repairs become visible.
pub struct RecentBlocksRing {
    window: RwLock<SummaryWindow>,
}

/// Circular buffer for recent summaries.
///
/// For a window of size 5 holding heights 1001-1005, looking up 1003:
/// - offset = 1003 - 1001 = 2
/// - index = (`start_index` + 2) % 5
struct SummaryWindow {
    size: usize,
    start_height: u64,
    start_index: usize,
    head: Option<u64>,
    slots: Vec<Option<Arc<BlockSummary>>>,
}

impl SummaryWindow {
    fn new(size: usize) -> Self {
        Self { size, start_height: 0, start_index: 0, head: None, slots: vec![None; size] }
    }

    fn index_of(&self, height: u64) -> Option<usize> {
        if height < self.start_height {
            return None;
        }
        let offset = usize::try_from(height - self.start_height).ok()?;
        if offset >= self.size {
            return None;
        }
        Some((self.start_index + offset) % self.size)
    }

    /// Inserts a summary, advancing the window if needed.
    /// Heights older than the window are ignored.
    fn insert(&mut self, summary: Arc<BlockSummary>) -> bool {
        let height = summary.height;
        if height < self.start_height {
            return false;
        }

        let offset = height - self.start_height;
        if offset >= self.size as u64 {
            let advance = offset - self.size as u64 + 1;
            self.advance(advance, height);
        }

        let Some(index) = self.index_of(height) else {
            return false;
        };
        self.slots[index] = Some(summary);
        self.head = Some(self.head.map_or(height, |head| head.max(height)));
        true
    }

    /// Evicts the `advance` oldest slots.
    ///
    /// Advances of at least the window size clear everything and reposition the window so
    /// `target` lands in the last slot.
    fn advance(&mut self, advance: u64, target: u64) {
        if advance >= self.size as u64 {
            for slot in &mut self.slots {
                *slot = None;
            }
            self.start_index = 0;
            self.start_height = target.saturating_sub(self.size as u64 - 1);
            if self.head.is_some_and(|head| head < self.start_height) {
                self.head = None;
            }
            return;
        }

        // advance < size, so it fits in usize
        let advance_slots = usize::try_from(advance).unwrap_or(self.size);
        for i in 0..advance_slots {
            let clear_index = (self.start_index + i) % self.size;
            self.slots[clear_index] = None;
        }
        self.start_index = (self.start_index + advance_slots) % self.size;
        self.start_height = self.start_height.saturating_add(advance);
    }

    fn get(&self, height: u64) -> Option<Arc<BlockSummary>> {
        self.index_of(height).and_then(|index| self.slots[index].as_ref().map(Arc::clone))
    }
}

impl RecentBlocksRing {
    /// Creates a ring holding at most `capacity` summaries. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            warn!("recent blocks capacity of zero raised to one");
        }
        Self { window: RwLock::new(SummaryWindow::new(capacity.max(1))) }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.window.read().size
    }

    /// Inserts or replaces the summary at its height.
    ///
    /// # Returns
    ///
    /// `false` if the height is older than the window and was dropped.
    pub fn insert(&self, summary: Arc<BlockSummary>) -> bool {
        let height = summary.height;
        let inserted = self.window.write().insert(summary);
        trace!(height = height, inserted = inserted, "recent block summary stored");
        inserted
    }

    #[must_use]
    pub fn get(&self, height: u64) -> Option<Arc<BlockSummary>> {
        self.window.read().get(height)
    }

    /// Summary at the highest height inserted so far.
    #[must_use]
    pub fn head(&self) -> Option<Arc<BlockSummary>> {
        let window = self.window.read();
        window.head.and_then(|head| window.get(head))
    }

    /// Up to `count` summaries ordered by descending height.
    #[must_use]
    pub fn latest(&self, count: usize) -> Vec<Arc<BlockSummary>> {
        let window = self.window.read();
        let Some(head) = window.head else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(count.min(window.size));
        let mut height = head;
        while out.len() < count && height >= window.start_height {
            if let Some(summary) = window.get(height) {
                out.push(summary);
            }
            if height == 0 {
                break;
            }
            height -= 1;
        }
        out
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.read().slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
