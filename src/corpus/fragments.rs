//! Fragment index: every labeled code fragment of the corpus.
//!
//! Fragments are identified by `(unit, start_line, end_line)` and receive a
//! dense [`FragmentHandle`] in load order. Once [`FragmentIndex::freeze`] has
//! been called the index is read-only and its per-unit lists are sorted by
//! start line so range resolution can binary search them.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::{CloneEvalError, Result};

/// Stable integer handle of a loaded fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentHandle(u32);

impl FragmentHandle {
    /// Wrap a raw handle value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Position of the fragment in the index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FragmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inclusive line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line
    pub start: u32,
    /// Last line (inclusive)
    pub end: u32,
}

impl LineSpan {
    /// Create a span, rejecting `start > end`
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of lines covered, widened so `0..=u32::MAX` cannot overflow
    pub const fn len(&self) -> u64 {
        self.end as u64 - self.start as u64 + 1
    }

    /// Spans always cover at least one line
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Number of lines shared with `other`
    pub fn intersection(&self, other: &LineSpan) -> u64 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            0
        } else {
            u64::from(end) - u64::from(start) + 1
        }
    }

    /// Number of lines covered by either span
    pub fn union_len(&self, other: &LineSpan) -> u64 {
        self.len() + other.len() - self.intersection(other)
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A labeled fragment. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// External identifier from the corpus (e.g. the benchmark's function id)
    pub id: Option<Arc<str>>,
    /// Containing unit (file) identifier
    pub unit: Arc<str>,
    /// Line span inside the unit
    pub span: LineSpan,
}

impl Fragment {
    /// Number of lines in the fragment
    pub fn line_count(&self) -> u64 {
        self.span.len()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id} ({}:{})", self.unit, self.span),
            None => write!(f, "{}:{}", self.unit, self.span),
        }
    }
}

/// Index of all labeled fragments.
#[derive(Debug, Default)]
pub struct FragmentIndex {
    fragments: Vec<Fragment>,
    by_triple: AHashMap<(Arc<str>, LineSpan), FragmentHandle>,
    by_id: AHashMap<Arc<str>, FragmentHandle>,
    by_unit: AHashMap<Arc<str>, Vec<FragmentHandle>>,
    frozen: bool,
}

impl FragmentIndex {
    /// Create an empty, mutable index
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fragment without external metadata.
    pub fn load(&mut self, unit: &str, start_line: u32, end_line: u32) -> Result<FragmentHandle> {
        self.load_fragment(None, unit, start_line, end_line)
    }

    /// Load a fragment carrying its external corpus id.
    pub fn load_with_id(
        &mut self,
        id: &str,
        unit: &str,
        start_line: u32,
        end_line: u32,
    ) -> Result<FragmentHandle> {
        self.load_fragment(Some(id), unit, start_line, end_line)
    }

    fn load_fragment(
        &mut self,
        id: Option<&str>,
        unit: &str,
        start_line: u32,
        end_line: u32,
    ) -> Result<FragmentHandle> {
        if self.frozen {
            return Err(CloneEvalError::IndexFrozen {
                unit: unit.to_string(),
                start_line,
                end_line,
            });
        }

        let span = LineSpan::new(start_line, end_line).ok_or_else(|| {
            CloneEvalError::InvalidFragment {
                unit: unit.to_string(),
                start_line,
                end_line,
            }
        })?;

        let unit: Arc<str> = match self.by_unit.get_key_value(unit) {
            Some((interned, _)) => Arc::clone(interned),
            None => Arc::from(unit),
        };

        if let Some(&existing) = self.by_triple.get(&(Arc::clone(&unit), span)) {
            let current = &self.fragments[existing.index()];
            if current.id.as_deref() == id {
                debug!("Ignoring repeated fragment {}", current);
                return Ok(existing);
            }
            return Err(CloneEvalError::duplicate_fragment(
                unit.as_ref(),
                start_line,
                end_line,
                format!(
                    "already loaded with id {:?}, conflicting id {:?}",
                    current.id.as_deref(),
                    id
                ),
            ));
        }

        let id: Option<Arc<str>> = id.map(Arc::from);
        if let Some(id) = &id {
            if let Some(&other) = self.by_id.get(id) {
                let other = &self.fragments[other.index()];
                return Err(CloneEvalError::duplicate_fragment(
                    unit.as_ref(),
                    start_line,
                    end_line,
                    format!("id '{id}' already names {}:{}", other.unit, other.span),
                ));
            }
        }

        let raw = u32::try_from(self.fragments.len())
            .map_err(|_| CloneEvalError::internal("fragment handle space exhausted"))?;
        let handle = FragmentHandle::new(raw);

        if let Some(id) = &id {
            self.by_id.insert(Arc::clone(id), handle);
        }
        self.by_triple.insert((Arc::clone(&unit), span), handle);
        self.by_unit
            .entry(Arc::clone(&unit))
            .or_default()
            .push(handle);
        self.fragments.push(Fragment { id, unit, span });

        Ok(handle)
    }

    /// Make the index read-only and prepare per-unit range lookups.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        let fragments = &self.fragments;
        for handles in self.by_unit.values_mut() {
            handles.sort_by_key(|h| {
                let span = fragments[h.index()].span;
                (span.start, span.end, *h)
            });
        }
        self.frozen = true;
        debug!(
            "Froze fragment index: {} fragments across {} units",
            self.fragments.len(),
            self.by_unit.len()
        );
    }

    /// Whether [`freeze`](Self::freeze) has been called
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Fragment behind `handle`, if loaded
    pub fn get(&self, handle: FragmentHandle) -> Option<&Fragment> {
        self.fragments.get(handle.index())
    }

    /// Fragment behind `handle`, failing with `UnknownFragment`
    pub fn lookup(&self, handle: FragmentHandle) -> Result<&Fragment> {
        self.get(handle)
            .ok_or_else(|| CloneEvalError::unknown_fragment(handle.to_string(), "fragment lookup"))
    }

    /// Whether `handle` names a loaded fragment
    pub fn contains(&self, handle: FragmentHandle) -> bool {
        handle.index() < self.fragments.len()
    }

    /// Handle of the fragment with external id `id`
    pub fn by_external_id(&self, id: &str) -> Option<FragmentHandle> {
        self.by_id.get(id).copied()
    }

    /// All fragments of one unit. Sorted by span once frozen, load order before.
    pub fn by_unit(&self, unit: &str) -> &[FragmentHandle] {
        self.by_unit.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fragments of `unit` sharing at least one line with `span`, in span order.
    pub fn intersecting(&self, unit: &str, span: LineSpan) -> Vec<FragmentHandle> {
        let handles = self.by_unit(unit);
        let upper = if self.frozen {
            handles.partition_point(|h| self.fragments[h.index()].span.start <= span.end)
        } else {
            handles.len()
        };

        handles[..upper]
            .iter()
            .copied()
            .filter(|h| self.fragments[h.index()].span.intersection(&span) > 0)
            .collect()
    }

    /// Number of loaded fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no fragment was loaded
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of distinct units
    pub fn unit_count(&self) -> usize {
        self.by_unit.len()
    }

    /// Iterate fragments in handle order
    pub fn iter(&self) -> impl Iterator<Item = (FragmentHandle, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, f)| (FragmentHandle::new(i as u32), f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_dense_and_monotonic() {
        let mut index = FragmentIndex::new();
        let a = index.load("A.java", 1, 10).unwrap();
        let b = index.load("A.java", 20, 30).unwrap();
        let c = index.load("B.java", 5, 6).unwrap();

        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert_eq!(index.len(), 3);
        assert_eq!(index.unit_count(), 2);
    }

    #[test]
    fn test_identical_repeat_is_deduplicated() {
        let mut index = FragmentIndex::new();
        let first = index.load_with_id("7", "A.java", 1, 10).unwrap();
        let again = index.load_with_id("7", "A.java", 1, 10).unwrap();
        assert_eq!(first, again);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_conflicting_metadata_is_rejected() {
        let mut index = FragmentIndex::new();
        index.load_with_id("7", "A.java", 1, 10).unwrap();

        let err = index.load_with_id("8", "A.java", 1, 10).unwrap_err();
        assert!(matches!(err, CloneEvalError::DuplicateFragment { .. }));

        let err = index.load_with_id("7", "A.java", 2, 10).unwrap_err();
        assert!(matches!(err, CloneEvalError::DuplicateFragment { .. }));
        assert!(err.to_string().contains("A.java:1-10"));
    }

    #[test]
    fn test_load_after_freeze_fails() {
        let mut index = FragmentIndex::new();
        index.load("A.java", 1, 10).unwrap();
        index.freeze();

        let err = index.load("A.java", 11, 12).unwrap_err();
        assert!(matches!(err, CloneEvalError::IndexFrozen { .. }));
        assert!(err.is_fatal_load_error());
    }

    #[test]
    fn test_inverted_span_rejected() {
        let mut index = FragmentIndex::new();
        let err = index.load("A.java", 10, 9).unwrap_err();
        assert!(matches!(err, CloneEvalError::InvalidFragment { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_lookup_and_by_unit() {
        let mut index = FragmentIndex::new();
        let late = index.load_with_id("2", "A.java", 40, 50).unwrap();
        let early = index.load_with_id("1", "A.java", 1, 10).unwrap();
        index.freeze();

        assert_eq!(index.by_unit("A.java"), &[early, late]);
        assert!(index.by_unit("missing.java").is_empty());
        assert_eq!(index.lookup(late).unwrap().span, LineSpan { start: 40, end: 50 });
        assert_eq!(index.by_external_id("1"), Some(early));
        assert!(index.lookup(FragmentHandle::new(99)).is_err());
    }

    #[test]
    fn test_intersecting_uses_sorted_window() {
        let mut index = FragmentIndex::new();
        let outer = index.load("A.java", 1, 100).unwrap();
        let inner = index.load("A.java", 10, 20).unwrap();
        let tail = index.load("A.java", 90, 120).unwrap();
        index.load("B.java", 10, 20).unwrap();
        index.freeze();

        let span = LineSpan::new(15, 30).unwrap();
        assert_eq!(index.intersecting("A.java", span), vec![outer, inner]);

        let span = LineSpan::new(101, 200).unwrap();
        assert_eq!(index.intersecting("A.java", span), vec![tail]);
    }

    #[test]
    fn test_line_span_geometry() {
        let a = LineSpan::new(10, 19).unwrap();
        let b = LineSpan::new(15, 24).unwrap();
        assert_eq!(a.len(), 10);
        assert_eq!(a.intersection(&b), 5);
        assert_eq!(a.union_len(&b), 15);
        assert_eq!(a.intersection(&LineSpan::new(20, 30).unwrap()), 0);
        assert!(LineSpan::new(3, 2).is_none());
    }
}
