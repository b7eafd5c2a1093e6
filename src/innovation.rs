//! Innovation numbers and unique names.
//!
//! Both counters are atomics so they stay monotonic when evaluation work is
//! spread across threads.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global identifier correlating genes across genotypes
pub type Innovation = u64;

/// Issues strictly increasing innovation numbers
#[derive(Debug, Default)]
pub struct InnovationCounter {
    last: AtomicU64,
}

impl InnovationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume counting after `last` (used when restoring checkpoints)
    pub fn starting_after(last: Innovation) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    /// Next innovation number. Never reused.
    #[inline]
    pub fn next(&self) -> Innovation {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued number (0 if none)
    pub fn last(&self) -> Innovation {
        self.last.load(Ordering::SeqCst)
    }
}

const WORDS: &[&str] = &[
    "amber", "basalt", "cedar", "delta", "ember", "fjord", "garnet", "harbor", "indigo",
    "juniper", "kestrel", "lichen", "marrow", "nectar", "onyx", "pollen", "quartz", "rivulet",
    "sorrel", "tundra", "umber", "vervain", "willow", "xylem", "yarrow", "zephyr", "ash",
    "bramble", "cinder", "dune", "eddy", "fern", "gale", "heath", "isle", "jade", "kelp",
    "loam", "moss", "nettle", "ochre", "peat", "quill", "reed", "shale", "thistle", "vale",
];

/// Generates random names suffixed with a monotonic counter
#[derive(Debug, Default)]
pub struct NameGenerator {
    count: AtomicU64,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_after(count: u64) -> Self {
        Self {
            count: AtomicU64::new(count),
        }
    }

    /// Three sampled words plus the counter, e.g. `fern_onyx_gale_42`.
    /// The counter keeps names unique even when the word triple repeats.
    pub fn random_name<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut parts: Vec<String> = (0..3)
            .map(|_| WORDS[rng.gen_range(0..WORDS.len())].to_string())
            .collect();
        parts.push(n.to_string());
        parts.join("_")
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Counter values persisted with checkpoints
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub innovation: Innovation,
    pub names: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn test_innovations_strictly_increase() {
        let counter = InnovationCounter::new();
        let issued: Vec<Innovation> = (0..1000).map(|_| counter.next()).collect();

        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(issued.iter().collect::<HashSet<_>>().len(), 1000);
        assert_eq!(counter.last(), 1000);
    }

    #[test]
    fn test_innovations_resume_after_checkpoint() {
        let counter = InnovationCounter::starting_after(41);
        assert_eq!(counter.next(), 42);
    }

    #[test]
    fn test_innovations_unique_across_threads() {
        let counter = std::sync::Arc::new(InnovationCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = counter.clone();
                std::thread::spawn(move || (0..250).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for innov in h.join().unwrap() {
                assert!(all.insert(innov));
            }
        }
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_random_names_unique() {
        let names = NameGenerator::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let generated: HashSet<String> = (0..500).map(|_| names.random_name(&mut rng)).collect();

        assert_eq!(generated.len(), 500);
        assert!(generated.iter().all(|n| n.split('_').count() == 4));
    }
}
