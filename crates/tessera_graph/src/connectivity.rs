//! Connectivity rules deciding which atom pairs a connection links.

use crate::atoms::AtomRange;
use crate::error::GraphError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fmt;

/// Decides which (pre, post) atom pairs of a connection are linked.
///
/// The mapper only uses [`may_connect`](Self::may_connect), which must never
/// return `false` for a pair of ranges containing a linked pair. The default
/// checks every pair in the two ranges; rules override it with something
/// cheaper where they can.
pub trait ConnectivityRule: fmt::Debug + Send + Sync {
    /// Returns `true` if atom `pre` of the source links to atom `post` of the target.
    fn connects(&self, pre: u32, post: u32) -> bool;

    /// Returns `true` if any atom in `pre` may link to any atom in `post`.
    fn may_connect(&self, pre: AtomRange, post: AtomRange) -> bool {
        pre.iter()
            .any(|a| post.iter().any(|b| self.connects(a, b)))
    }

    /// Checks the rule against the sizes of the units it joins.
    fn validate(&self, _pre_atoms: u32, _post_atoms: u32) -> Result<(), GraphError> {
        Ok(())
    }
}

/// Every source atom links to every target atom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllToAll;

impl ConnectivityRule for AllToAll {
    fn connects(&self, _pre: u32, _post: u32) -> bool {
        true
    }

    fn may_connect(&self, pre: AtomRange, post: AtomRange) -> bool {
        !pre.is_empty() && !post.is_empty()
    }
}

/// Source atom `i` links to target atom `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OneToOne;

impl ConnectivityRule for OneToOne {
    fn connects(&self, pre: u32, post: u32) -> bool {
        pre == post
    }

    fn may_connect(&self, pre: AtomRange, post: AtomRange) -> bool {
        pre.intersect(&post).is_some()
    }
}

/// An explicit list of linked (pre, post) pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FromList {
    pairs: BTreeSet<(u32, u32)>,
}

impl FromList {
    /// Creates a rule from (pre, post) pairs. Duplicates collapse.
    pub fn new(pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }
}

impl ConnectivityRule for FromList {
    fn connects(&self, pre: u32, post: u32) -> bool {
        self.pairs.contains(&(pre, post))
    }

    fn may_connect(&self, pre: AtomRange, post: AtomRange) -> bool {
        self.pairs
            .range((pre.lo, 0)..(pre.hi, 0))
            .any(|&(_, b)| post.contains(b))
    }

    fn validate(&self, pre_atoms: u32, post_atoms: u32) -> Result<(), GraphError> {
        match self
            .pairs
            .iter()
            .find(|&&(a, b)| a >= pre_atoms || b >= post_atoms)
        {
            Some(&(a, b)) => Err(GraphError::InvalidRule(format!(
                "pair ({a}, {b}) lies outside units of {pre_atoms} and {post_atoms} atoms"
            ))),
            None => Ok(()),
        }
    }
}

/// Each pair links independently with probability `p`.
///
/// The targets of one source atom are a Bernoulli process drawn from a
/// generator seeded by the rule's seed and that atom, so repeated queries and
/// repeated compilations agree. Gaps between successive targets are
/// geometric, which makes sparse rows cheap to scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedProbability {
    p: f64,
    seed: u64,
}

impl FixedProbability {
    /// Creates the rule; `p` must lie in `0.0..=1.0`.
    pub fn new(p: f64, seed: u64) -> Result<Self, GraphError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(GraphError::InvalidRule(format!(
                "probability {p} is outside 0..=1"
            )));
        }
        Ok(Self { p, seed })
    }

    /// The link probability.
    pub fn probability(&self) -> f64 {
        self.p
    }

    /// Targets of `pre` in ascending order. Only meaningful for `0 < p < 1`.
    fn row(&self, pre: u32) -> impl Iterator<Item = u32> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(pre).rotate_left(32));
        let log_q = (1.0 - self.p).ln();
        let mut next: u64 = 0;
        std::iter::from_fn(move || {
            let u: f64 = rng.gen();
            // 1 - u lies in (0, 1], so the gap is finite and non-negative
            let gap = ((1.0 - u).ln() / log_q).floor() as u64;
            let at = next.saturating_add(gap);
            next = at.saturating_add(1);
            u32::try_from(at).ok()
        })
    }

    /// First target of `pre` at or above `from`.
    fn first_target_from(&self, pre: u32, from: u32) -> Option<u32> {
        self.row(pre).find(|&b| b >= from)
    }
}

impl ConnectivityRule for FixedProbability {
    fn connects(&self, pre: u32, post: u32) -> bool {
        if self.p <= 0.0 {
            return false;
        }
        if self.p >= 1.0 {
            return true;
        }
        self.first_target_from(pre, post) == Some(post)
    }

    fn may_connect(&self, pre: AtomRange, post: AtomRange) -> bool {
        if pre.is_empty() || post.is_empty() || self.p <= 0.0 {
            return false;
        }
        if self.p >= 1.0 {
            return true;
        }
        pre.iter().any(|a| {
            self.first_target_from(a, post.lo)
                .is_some_and(|b| b < post.hi)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_to_all() {
        assert!(AllToAll.may_connect(AtomRange::new(0, 1), AtomRange::new(5, 6)));
        assert!(!AllToAll.may_connect(AtomRange::new(0, 0), AtomRange::new(5, 6)));
    }

    #[test]
    fn one_to_one_needs_overlap() {
        assert!(OneToOne.may_connect(AtomRange::new(0, 60), AtomRange::new(50, 100)));
        assert!(!OneToOne.may_connect(AtomRange::new(0, 60), AtomRange::new(60, 100)));
        assert!(OneToOne.connects(7, 7));
        assert!(!OneToOne.connects(7, 8));
    }

    #[test]
    fn from_list_scans_source_range() {
        let rule = FromList::new([(0, 5), (10, 1), (10, 90)]);
        assert!(rule.may_connect(AtomRange::new(10, 11), AtomRange::new(80, 100)));
        assert!(!rule.may_connect(AtomRange::new(0, 10), AtomRange::new(80, 100)));
        assert!(!rule.may_connect(AtomRange::new(11, 20), AtomRange::new(0, 100)));
        assert!(rule.validate(11, 100).is_ok());
        assert!(rule.validate(11, 50).is_err());
    }

    #[test]
    fn fixed_probability_is_deterministic() {
        let rule = FixedProbability::new(0.3, 42).unwrap();
        let first: Vec<bool> = (0..50).map(|i| rule.connects(i, 2 * i)).collect();
        let second: Vec<bool> = (0..50).map(|i| rule.connects(i, 2 * i)).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|&b| b));
        assert!(first.iter().any(|&b| !b));
    }

    #[test]
    fn fixed_probability_block_test_matches_pairs() {
        let rule = FixedProbability::new(0.05, 9).unwrap();
        let blocks = [
            (AtomRange::new(0, 4), AtomRange::new(0, 8)),
            (AtomRange::new(4, 6), AtomRange::new(30, 33)),
            (AtomRange::new(10, 11), AtomRange::new(200, 260)),
            (AtomRange::new(7, 9), AtomRange::new(5, 6)),
        ];
        for (pre, post) in blocks {
            let brute = pre.iter().any(|a| post.iter().any(|b| rule.connects(a, b)));
            assert_eq!(rule.may_connect(pre, post), brute, "{pre:?} x {post:?}");
        }
    }

    #[test]
    fn fixed_probability_row_density() {
        let rule = FixedProbability::new(0.1, 3).unwrap();
        let links = rule.row(5).take_while(|&b| b < 10_000).count();
        assert!((800..1200).contains(&links), "{links} links");
    }

    #[test]
    fn fixed_probability_extremes() {
        let never = FixedProbability::new(0.0, 1).unwrap();
        assert!(!never.may_connect(AtomRange::new(0, 100), AtomRange::new(0, 100)));
        let always = FixedProbability::new(1.0, 1).unwrap();
        assert!(always.may_connect(AtomRange::new(0, 1), AtomRange::new(0, 1)));
        assert!(FixedProbability::new(1.5, 1).is_err());
    }
}
