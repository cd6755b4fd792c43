//! # Sample Gamete Definitions
//!
//! A gamete is one chromosome copy of a sample. Samples may be diploid
//! (two gametes) or haploid (one); every gamete in the graph gets a dense
//! index assigned in `(sample, gamete)` sort order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Zero-cost newtype for gamete indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GameteIdx(pub u32);

impl GameteIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for GameteIdx {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for GameteIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl From<GameteIdx> for usize {
    fn from(idx: GameteIdx) -> usize {
        idx.0 as usize
    }
}

/// One chromosome copy of a sample
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleGamete {
    /// Sample name
    pub sample: Arc<str>,
    /// Gamete number within the sample (0 or 1 for diploids)
    pub gamete: u8,
}

impl SampleGamete {
    pub fn new(sample: impl Into<Arc<str>>, gamete: u8) -> Self {
        Self {
            sample: sample.into(),
            gamete,
        }
    }
}

impl std::fmt::Display for SampleGamete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.sample, self.gamete)
    }
}

/// Registry of all sample gametes in a graph
///
/// Holds the gametes in `(sample, gamete)` sort order; `GameteIdx` is the
/// position in that order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SampleGametes {
    gametes: Vec<SampleGamete>,
    #[serde(skip)]
    lookup: HashMap<SampleGamete, GameteIdx>,
}

impl SampleGametes {
    /// Build from an unsorted collection; duplicates are collapsed
    pub fn from_gametes(mut gametes: Vec<SampleGamete>) -> Self {
        gametes.sort();
        gametes.dedup();
        let lookup = gametes
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), GameteIdx::new(i as u32)))
            .collect();
        Self { gametes, lookup }
    }

    /// Number of gametes in the registry
    pub fn len(&self) -> usize {
        self.gametes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gametes.is_empty()
    }

    /// Gamete at a dense index
    pub fn get(&self, idx: GameteIdx) -> &SampleGamete {
        &self.gametes[idx.as_usize()]
    }

    /// Dense index of a gamete, if present
    pub fn index_of(&self, gamete: &SampleGamete) -> Option<GameteIdx> {
        self.lookup.get(gamete).copied()
    }

    /// All gametes in index order
    pub fn iter(&self) -> impl Iterator<Item = (GameteIdx, &SampleGamete)> {
        self.gametes
            .iter()
            .enumerate()
            .map(|(i, g)| (GameteIdx::new(i as u32), g))
    }

    /// All dense indices in order
    pub fn indices(&self) -> impl Iterator<Item = GameteIdx> {
        (0..self.gametes.len() as u32).map(GameteIdx::new)
    }
}

impl std::ops::Index<GameteIdx> for SampleGametes {
    type Output = SampleGamete;

    fn index(&self, idx: GameteIdx) -> &Self::Output {
        &self.gametes[idx.as_usize()]
    }
}
