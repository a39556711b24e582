//! Crossover and mutation over [`crate::individual::Individual`]
//! (`spec.md` §4.L "Crossover" / "Mutation"), ported from
//! `tools/training/ace/ace_crossover.h` and `ace_mutate.h`.
//!
//! Every component currently registered (`delta`, `zigzag`, `store`,
//! `rangepack`) accepts and produces a `Numeric` stream, so unlike the
//! original (whose catalog mixes node types with incompatible ports)
//! every splice site here is type-compatible by construction; the
//! original's retry-then-fall-back-to-mutation loop is therefore
//! unnecessary and dropped.

use rand::Rng;

use crate::individual::{random_prebuilt, random_tree, Individual, Op};

/// Default cap on how many transform steps a freshly random tree grows.
pub const DEFAULT_MAX_RANDOM_OPS: usize = 4;

/// Splices a random subtree of `donor` into a random site of `recipient`.
pub fn crossover(rng: &mut impl Rng, donor: &Individual, recipient: &Individual) -> Individual {
    let donor_components = donor.components();
    let piece = donor_components[rng.gen_range(0..donor_components.len())].clone();
    let recipient_components = recipient.components();
    let site = rng.gen_range(0..recipient_components.len());
    recipient.replace_at(site, piece)
}

/// One of four equally-likely mutation actions applied at a random site
/// in `tree` (`spec.md` §4.L "Mutation").
pub fn mutate(rng: &mut impl Rng, tree: &Individual) -> Individual {
    let components = tree.components();
    let site = rng.gen_range(0..components.len());
    match rng.gen_range(0..4u8) {
        0 => tree.replace_at(site, random_prebuilt(rng)),
        1 => tree.replace_at(site, random_tree(rng, DEFAULT_MAX_RANDOM_OPS)),
        2 => {
            let shortened = shorten(tree.subtree_at(site));
            tree.replace_at(site, shortened)
        }
        3 => {
            let op = if rng.gen_bool(0.5) { Op::Delta } else { Op::Zigzag };
            let lengthened = Individual::transform(op, tree.subtree_at(site).clone());
            tree.replace_at(site, lengthened)
        }
        _ => unreachable!("gen_range(0..4) is exhaustive"),
    }
}

/// Deletes the outermost transform step of a unary-prefix pipeline
/// (`spec.md` §4.L "delete a random unary-prefix pipeline"). A bare leaf
/// has nothing to delete and is returned unchanged.
fn shorten(subtree: &Individual) -> Individual {
    match subtree {
        Individual::Transform { child, .. } => (**child).clone(),
        Individual::Leaf { .. } => subtree.clone(),
    }
}
