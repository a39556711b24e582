//! The ACE gene (`spec.md` §3.5): a tree whose internal nodes are
//! `(node-id, parameters, children)` and whose leaves are terminal graph
//! references. Every transform currently registered in `vex-graph`
//! (`delta`, `zigzag`) is unary, so the general multi-child tree in the
//! original collapses to a linked pipeline: zero or more transform
//! steps feeding a single terminal leaf codec.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A unary transform step (`spec.md` §4.E built-ins restricted to the
/// `Numeric -> Numeric` ones ACE can chain freely).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    /// `vex_graph::codecs::delta::Delta`.
    Delta,
    /// `vex_graph::codecs::zigzag::Zigzag`.
    Zigzag,
}

/// A terminal leaf codec (`spec.md` §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leaf {
    /// `vex_graph::codecs::store::Store`.
    Store,
    /// `vex_graph::codecs::rangepack::RangePack`.
    RangePack,
}

/// A compressor gene: a pipeline of [`Op`] steps over a [`Leaf`].
/// Structural equality and hashing (used for crossover/mutation site
/// selection and fitness memoization) fall out of `derive`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Individual {
    /// An internal pipeline step wrapping a subtree.
    Transform { op: Op, child: Box<Individual> },
    /// A terminal leaf.
    Leaf { leaf: Leaf },
}

impl Individual {
    /// A single leaf, with no transform steps.
    pub fn leaf(leaf: Leaf) -> Self {
        Individual::Leaf { leaf }
    }

    /// Prepend a transform step in front of `child`.
    pub fn transform(op: Op, child: Individual) -> Self {
        Individual::Transform {
            op,
            child: Box::new(child),
        }
    }

    /// Number of components (transform steps plus the terminal leaf) in
    /// this tree. Used both as a tie-breaking simplicity penalty on
    /// fitness and as a termination check for mutation's "shorten" action.
    pub fn node_count(&self) -> usize {
        match self {
            Individual::Leaf { .. } => 1,
            Individual::Transform { child, .. } => 1 + child.node_count(),
        }
    }

    /// Every component in this tree, in pre-order (root first). Index `i`
    /// into this list is the addressing scheme [`Individual::replace_at`]
    /// and [`Individual::subtree_at`] use for crossover/mutation sites.
    pub fn components(&self) -> Vec<&Individual> {
        let mut out = Vec::new();
        self.collect_components(&mut out);
        out
    }

    fn collect_components<'a>(&'a self, out: &mut Vec<&'a Individual>) {
        out.push(self);
        if let Individual::Transform { child, .. } = self {
            child.collect_components(out);
        }
    }

    /// The subtree rooted at pre-order index `index`.
    pub fn subtree_at(&self, index: usize) -> &Individual {
        self.components()[index]
    }

    /// Rebuild this tree with the subtree at pre-order index `index`
    /// replaced by `replacement`. Every component in this tree accepts a
    /// `Numeric` stream and every component produces one, so the result
    /// is always type-compatible without a splice-site search.
    pub fn replace_at(&self, index: usize, replacement: Individual) -> Individual {
        fn go(node: &Individual, index: usize, counter: &mut usize, replacement: &Individual) -> Individual {
            let here = *counter;
            *counter += 1;
            if here == index {
                return replacement.clone();
            }
            match node {
                Individual::Leaf { .. } => node.clone(),
                Individual::Transform { op, child } => Individual::Transform {
                    op: *op,
                    child: Box::new(go(child, index, counter, replacement)),
                },
            }
        }
        let mut counter = 0;
        go(self, index, &mut counter, &replacement)
    }

    /// A stable structural hash: two genes with the same shape and
    /// content hash identically regardless of where they were built.
    /// Used for crossover/mutation population-deduplication and for
    /// fitness memoization.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// The hand-curated seed compressors ACE starts every run from
/// (`spec.md` §4.L "Initial population": "for numeric: delta→field-lz,
/// zigzag→field-lz, transpose→zstd, quantize-offsets → fse, etc.").
/// Restricted to the leaf/op catalog currently registered in
/// `vex-graph`, this becomes chains of `delta`/`zigzag` at a few depths
/// into `rangepack`: repeated prefix-summed data (`spec.md` §8 scenario
/// 5) needs one `delta` per summation to flatten, so a single-step seed
/// alone would leave ACE to discover multi-step chains from mutation
/// alone every run.
pub fn prebuilt_compressors() -> Vec<Individual> {
    let mut seeds = vec![Individual::leaf(Leaf::Store), Individual::leaf(Leaf::RangePack)];
    for depth in 1..=3 {
        let mut delta_chain = Individual::leaf(Leaf::RangePack);
        let mut zigzag_chain = Individual::leaf(Leaf::RangePack);
        for _ in 0..depth {
            delta_chain = Individual::transform(Op::Delta, delta_chain);
            zigzag_chain = Individual::transform(Op::Zigzag, zigzag_chain);
        }
        seeds.push(delta_chain);
        seeds.push(zigzag_chain);
    }
    seeds.push(Individual::transform(
        Op::Delta,
        Individual::transform(Op::Zigzag, Individual::leaf(Leaf::RangePack)),
    ));
    seeds
}

/// Picks one of [`prebuilt_compressors`] uniformly at random. Used both
/// to seed the initial population and as mutation's "replace with a
/// prebuilt" action.
pub fn random_prebuilt(rng: &mut impl Rng) -> Individual {
    let choices = prebuilt_compressors();
    choices[rng.gen_range(0..choices.len())].clone()
}

/// Builds a random pipeline of up to `max_ops` transform steps (each of
/// `Delta` or `Zigzag`, chosen independently) over a random leaf
/// (`spec.md` §4.L "Initial population" / mutation's "random tree").
pub fn random_tree(rng: &mut impl Rng, max_ops: usize) -> Individual {
    let leaf = if rng.gen_bool(0.5) { Leaf::Store } else { Leaf::RangePack };
    let mut tree = Individual::leaf(leaf);
    let num_ops = rng.gen_range(0..=max_ops);
    for _ in 0..num_ops {
        let op = if rng.gen_bool(0.5) { Op::Delta } else { Op::Zigzag };
        tree = Individual::transform(op, tree);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Individual {
        Individual::transform(Op::Delta, Individual::transform(Op::Zigzag, Individual::leaf(Leaf::RangePack)))
    }

    #[test]
    fn node_count_counts_every_component() {
        assert_eq!(sample_tree().node_count(), 3);
        assert_eq!(Individual::leaf(Leaf::Store).node_count(), 1);
    }

    #[test]
    fn components_are_preorder() {
        let tree = sample_tree();
        let components = tree.components();
        assert_eq!(components.len(), 3);
        assert!(matches!(components[0], Individual::Transform { op: Op::Delta, .. }));
        assert!(matches!(components[1], Individual::Transform { op: Op::Zigzag, .. }));
        assert!(matches!(components[2], Individual::Leaf { leaf: Leaf::RangePack }));
    }

    #[test]
    fn replace_at_root_replaces_whole_tree() {
        let tree = sample_tree();
        let replaced = tree.replace_at(0, Individual::leaf(Leaf::Store));
        assert_eq!(replaced, Individual::leaf(Leaf::Store));
    }

    #[test]
    fn replace_at_leaf_only_changes_the_leaf() {
        let tree = sample_tree();
        let replaced = tree.replace_at(2, Individual::leaf(Leaf::Store));
        assert_eq!(
            replaced,
            Individual::transform(Op::Delta, Individual::transform(Op::Zigzag, Individual::leaf(Leaf::Store)))
        );
    }

    #[test]
    fn structural_equality_ignores_nothing() {
        let a = Individual::transform(Op::Delta, Individual::leaf(Leaf::Store));
        let b = Individual::transform(Op::Delta, Individual::leaf(Leaf::Store));
        let c = Individual::transform(Op::Zigzag, Individual::leaf(Leaf::Store));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn random_tree_never_exceeds_requested_depth() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let tree = random_tree(&mut rng, 4);
            assert!(tree.node_count() <= 5);
        }
    }
}
