//! Coverage ledger: which reference pairs a tool's stream has satisfied.
//!
//! One ledger exists per evaluated tool. It is the single owner of the
//! covered state and serializes updates behind one mutex. Coverage is
//! monotonic: a covered pair is never uncovered.

use bitvec::vec::BitVec;
use parking_lot::Mutex;

use crate::corpus::reference::ReferencePairId;

/// Covered flags for every pair of a reference set.
#[derive(Debug)]
pub struct CoverageLedger {
    covered: Mutex<BitVec>,
}

impl CoverageLedger {
    /// Ledger for a reference set of `len` pairs, nothing covered
    pub fn new(len: usize) -> Self {
        Self {
            covered: Mutex::new(BitVec::repeat(false, len)),
        }
    }

    /// Mark every pair in `ids` as covered. Returns how many were newly covered.
    pub fn cover_all(&self, ids: &[ReferencePairId]) -> usize {
        let mut covered = self.covered.lock();
        let mut newly = 0;
        for id in ids {
            if let Some(mut bit) = covered.get_mut(id.index()) {
                if !*bit {
                    *bit = true;
                    newly += 1;
                }
            }
        }
        newly
    }

    /// Whether `id` has been covered
    pub fn is_covered(&self, id: ReferencePairId) -> bool {
        self.covered
            .lock()
            .get(id.index())
            .map_or(false, |bit| *bit)
    }

    /// Number of covered pairs
    pub fn covered_count(&self) -> usize {
        self.covered.lock().count_ones()
    }

    /// Consume the ledger, returning the final covered flags
    pub fn into_inner(self) -> BitVec {
        self.covered.into_inner()
    }
}
