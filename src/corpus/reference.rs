//! Reference clone set: the ground-truth clone pairs of the corpus.
//!
//! Pairs are unordered and stored canonically (smaller handle first). One
//! canonical key may carry several pairs when a clone qualifies at more than
//! one tier, so the key index maps to a list rather than a single record.

use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::core::errors::{CloneEvalError, Result};
use crate::corpus::fragments::{FragmentHandle, FragmentIndex};

/// Clone-type tier, ordered from finest (identical) to coarsest (semantic).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String")]
pub enum CloneTier {
    /// Syntactically identical apart from layout and comments
    #[serde(rename = "T1")]
    Type1,
    /// Identical after identifier and literal renaming
    #[serde(rename = "T2")]
    Type2,
    /// Near-miss clones with added, removed or changed statements
    #[serde(rename = "T3")]
    Type3,
    /// Semantically equivalent with dissimilar syntax
    #[serde(rename = "T4")]
    Type4,
}

impl CloneTier {
    /// Every tier, finest first
    pub const ALL: [CloneTier; 4] = [Self::Type1, Self::Type2, Self::Type3, Self::Type4];

    /// Short label used in reports
    pub const fn label(self) -> &'static str {
        match self {
            Self::Type1 => "T1",
            Self::Type2 => "T2",
            Self::Type3 => "T3",
            Self::Type4 => "T4",
        }
    }
}

impl fmt::Display for CloneTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CloneTier {
    type Err = CloneEvalError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "T1" | "1" | "TYPE-1" | "TYPE1" => Ok(Self::Type1),
            "T2" | "2" | "TYPE-2" | "TYPE2" => Ok(Self::Type2),
            "T3" | "3" | "TYPE-3" | "TYPE3" | "VST3" | "ST3" | "MT3" => Ok(Self::Type3),
            "T4" | "4" | "TYPE-4" | "TYPE4" | "WT3" | "WT3/T4" => Ok(Self::Type4),
            _ => Err(CloneEvalError::validation(format!(
                "Unknown clone tier '{}'",
                s.trim()
            ))),
        }
    }
}

impl TryFrom<String> for CloneTier {
    type Error = CloneEvalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Type-3 similarity bands as reported by BigCloneEval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SimilarityBand {
    /// Very strongly type-3: [0.9, 1.0]
    #[serde(rename = "VST3")]
    VeryStrong,
    /// Strongly type-3: [0.7, 0.9)
    #[serde(rename = "ST3")]
    Strong,
    /// Moderately type-3: [0.5, 0.7)
    #[serde(rename = "MT3")]
    Moderate,
    /// Weakly type-3 / type-4: [0.0, 0.5)
    #[serde(rename = "WT3")]
    Weak,
}

impl SimilarityBand {
    /// Every band, most similar first
    pub const ALL: [SimilarityBand; 4] = [Self::VeryStrong, Self::Strong, Self::Moderate, Self::Weak];

    /// Band containing `similarity`
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 0.9 {
            Self::VeryStrong
        } else if similarity >= 0.7 {
            Self::Strong
        } else if similarity >= 0.5 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    /// Short label used in reports
    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryStrong => "VST3",
            Self::Strong => "ST3",
            Self::Moderate => "MT3",
            Self::Weak => "WT3",
        }
    }
}

/// Unordered fragment pair in canonical order (smaller handle first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    first: FragmentHandle,
    second: FragmentHandle,
}

impl PairKey {
    /// Canonical key of `{a, b}`; `None` when both sides are the same fragment
    pub fn new(a: FragmentHandle, b: FragmentHandle) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Smaller handle
    pub const fn first(&self) -> FragmentHandle {
        self.first
    }

    /// Larger handle
    pub const fn second(&self) -> FragmentHandle {
        self.second
    }

    /// Whether `handle` is one of the endpoints
    pub fn touches(&self, handle: FragmentHandle) -> bool {
        self.first == handle || self.second == handle
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Dense identifier of a reference pair inside one [`ReferenceCloneSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferencePairId(u32);

impl ReferencePairId {
    /// Position inside the set
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A ground-truth clone pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePair {
    /// Identifier inside the owning set
    pub id: ReferencePairId,
    /// Canonical endpoints
    pub key: PairKey,
    /// Clone-type tier
    pub tier: CloneTier,
    /// Recorded similarity of the pair, when the ground truth provides one
    pub similarity: Option<f64>,
}

type KeyEntries = SmallVec<[ReferencePairId; 2]>;

/// Ground-truth pairs indexed by canonical key and by endpoint.
#[derive(Debug, Default, Clone)]
pub struct ReferenceCloneSet {
    pairs: Vec<ReferencePair>,
    by_key: AHashMap<PairKey, KeyEntries>,
    by_fragment: AHashMap<FragmentHandle, SmallVec<[ReferencePairId; 4]>>,
    repeated: usize,
}

impl ReferenceCloneSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ground-truth pair. Repeats of the same key and tier collapse to the first.
    pub fn add_reference_pair(
        &mut self,
        index: &FragmentIndex,
        a: FragmentHandle,
        b: FragmentHandle,
        tier: CloneTier,
        similarity: Option<f64>,
    ) -> Result<ReferencePairId> {
        for handle in [a, b] {
            if !index.contains(handle) {
                return Err(CloneEvalError::unknown_fragment(
                    handle.to_string(),
                    format!("reference pair ({a}, {b}, {tier})"),
                ));
            }
        }

        let key = PairKey::new(a, b).ok_or_else(|| CloneEvalError::InvalidReferencePair {
            a: a.to_string(),
            b: b.to_string(),
            message: "a fragment cannot be its own clone".to_string(),
        })?;

        if let Some(similarity) = similarity {
            if !(0.0..=1.0).contains(&similarity) {
                return Err(CloneEvalError::InvalidReferencePair {
                    a: a.to_string(),
                    b: b.to_string(),
                    message: format!("similarity {similarity} outside [0, 1]"),
                });
            }
        }

        if let Some(existing) = self
            .pairs_for_key(key)
            .iter()
            .copied()
            .find(|id| self.pairs[id.index()].tier == tier)
        {
            debug!("Collapsing repeated reference pair {} at {}", key, tier);
            self.repeated += 1;
            return Ok(existing);
        }

        let raw = u32::try_from(self.pairs.len())
            .map_err(|_| CloneEvalError::internal("reference pair id space exhausted"))?;
        let id = ReferencePairId(raw);

        self.pairs.push(ReferencePair {
            id,
            key,
            tier,
            similarity,
        });
        self.by_key.entry(key).or_default().push(id);
        self.by_fragment.entry(key.first()).or_default().push(id);
        self.by_fragment.entry(key.second()).or_default().push(id);

        Ok(id)
    }

    /// Pair behind `id`
    pub fn get(&self, id: ReferencePairId) -> Option<&ReferencePair> {
        self.pairs.get(id.index())
    }

    /// Every pair sharing the canonical key, one per tier
    pub fn pairs_for_key(&self, key: PairKey) -> &[ReferencePairId] {
        self.by_key.get(&key).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// Finest tier recorded for `key`
    pub fn finest_tier(&self, key: PairKey) -> Option<CloneTier> {
        self.pairs_for_key(key)
            .iter()
            .map(|id| self.pairs[id.index()].tier)
            .min()
    }

    /// Pairs with `handle` as one endpoint, in insertion order
    pub fn pairs_for_fragment(&self, handle: FragmentHandle) -> impl Iterator<Item = &ReferencePair> {
        self.by_fragment
            .get(&handle)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .map(move |id| &self.pairs[id.index()])
    }

    /// All pairs, optionally restricted to one tier, in insertion order
    pub fn all_pairs(&self, tier: Option<CloneTier>) -> impl Iterator<Item = &ReferencePair> {
        self.pairs
            .iter()
            .filter(move |pair| tier.map_or(true, |t| pair.tier == t))
    }

    /// Number of pairs per tier, finest first (every tier present, possibly zero)
    pub fn tier_counts(&self) -> Vec<(CloneTier, usize)> {
        CloneTier::ALL
            .iter()
            .map(|&tier| (tier, self.all_pairs(Some(tier)).count()))
            .collect()
    }

    /// Number of repeated (key, tier) records collapsed on insert
    pub fn repeated_records(&self) -> usize {
        self.repeated
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the set holds no pair
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of distinct canonical keys
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// New set holding only the pairs accepted by `keep`. Ids are reassigned densely.
    pub fn filtered<F>(&self, index: &FragmentIndex, mut keep: F) -> Result<Self>
    where
        F: FnMut(&ReferencePair) -> bool,
    {
        let mut filtered = Self::new();
        for pair in self.pairs.iter().filter(|pair| keep(pair)) {
            filtered.add_reference_pair(
                index,
                pair.key.first(),
                pair.key.second(),
                pair.tier,
                pair.similarity,
            )?;
        }
        filtered.repeated = self.repeated;
        Ok(filtered)
    }
}
