//! Array of stream rings
//!
//! One ring per logical stream, addressed by index. The array itself is
//! immutable after construction; each ring coordinates its own writer and
//! readers.

use std::sync::Arc;

use crate::ring::{RingConfig, RingError, StreamRing};
use crate::stats::RingStats;

/// Fixed set of independently configured rings
pub struct RingArray {
    rings: Vec<Arc<StreamRing>>,
}

impl RingArray {
    /// Build one ring per configuration
    ///
    /// Fails on the first configuration with invalid geometry.
    pub fn new(configs: impl IntoIterator<Item = RingConfig>) -> Result<Self, RingError> {
        let rings = configs
            .into_iter()
            .map(|config| StreamRing::with_config(config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        for (index, ring) in rings.iter().enumerate() {
            tracing::info!(
                index = index,
                ring = %ring.description(),
                slots = ring.len(),
                slot_size = ring.slot_size(),
                "Ring created"
            );
        }

        Ok(Self { rings })
    }

    /// Build `count` rings sharing one configuration
    pub fn with_uniform(count: usize, config: RingConfig) -> Result<Self, RingError> {
        Self::new(std::iter::repeat(config).take(count))
    }

    /// Get the ring at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<StreamRing>> {
        self.rings.get(index)
    }

    /// Exclusive access to the ring at `index`
    ///
    /// `None` if the index is out of range or another handle to the ring is
    /// still alive.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut StreamRing> {
        self.rings.get_mut(index).and_then(Arc::get_mut)
    }

    /// Number of rings
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    /// Check if the array holds no rings
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Iterate over the rings in index order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StreamRing>> {
        self.rings.iter()
    }

    /// Snapshot of every ring
    pub fn stats(&self) -> Vec<RingStats> {
        self.rings.iter().map(|ring| ring.stats()).collect()
    }
}

impl std::fmt::Display for RingArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, ring) in self.rings.iter().enumerate() {
            writeln!(f, "[{}] {}", index, ring)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RingArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rings.iter()).finish()
    }
}
