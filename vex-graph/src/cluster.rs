//! Clustering support: grouping and splitting/merging the N-ary inputs of
//! a [`crate::graph::GraphKind::Cluster`] graph (`spec.md` §4.K).
//!
//! A group's member streams are concatenated byte-for-byte (no framing of
//! their own — their shapes, carried in the trace, are enough to split
//! them back apart) and fed to the group's successor as one stream.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use vex_core::error::{logic_error, Error, ErrorCode, Result};
use vex_core::stream::{StreamType, TypedStream};

use crate::graph::Successor;
use crate::trace::{ClusterGroup, OriginalMember, StreamShape};

/// `IntMetadata` key reserved for a stream's clustering tag (`spec.md`
/// §4.K, glossary "Tag"): a small integer, usually schema-derived, that a
/// parser or caller attaches before a stream reaches a cluster graph.
pub const TAG_METADATA_KEY: u16 = 0;

/// One of the clustering graph's fixed concatenation codecs — every
/// stream flavor has exactly one (`spec.md` §4.K).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatCodec {
    /// Concatenates `Serial` streams.
    Serial,
    /// Concatenates `Struct` streams of a shared element width.
    Struct,
    /// Concatenates `Numeric` streams of a shared element width.
    Numeric,
    /// Concatenates `String` streams, preserving per-element lengths.
    String,
}

impl ConcatCodec {
    /// The codec this stream type is concatenated with; `spec.md` §4.K's
    /// "each cluster's type matches its clustering codec" invariant means
    /// this mapping is the only valid (type, codec) pairing.
    pub fn for_type(ty: StreamType) -> Self {
        match ty {
            StreamType::Serial => ConcatCodec::Serial,
            StreamType::Struct => ConcatCodec::Struct,
            StreamType::Numeric => ConcatCodec::Numeric,
            StreamType::String => ConcatCodec::String,
        }
    }

    fn matches(self, ty: StreamType) -> bool {
        self == Self::for_type(ty)
    }
}

/// One group [`ClusterConfig::cluster`] (via [`crate::graph::ClusteringStrategy`])
/// has resolved: which input indices belong to it, the codec and width
/// their concatenation uses, and the successor the merged stream runs
/// through next.
pub struct ClusterGroupPlan {
    /// Indices into the cluster graph's input slice.
    pub indices: Vec<usize>,
    /// The concat codec this group's members share.
    pub codec: ConcatCodec,
    /// The element width this group's members share (byte width for
    /// `Serial`/`Numeric`; unused, always `0`, for `String`).
    pub width: usize,
    /// The successor the merged stream is routed to.
    pub successor: Successor,
}

/// One configured cluster: the tags it claims within a (type, width)
/// key, and which entry of the parent [`ClusterConfig`]'s shared
/// successor table consumes its concatenation.
#[derive(Debug, Clone)]
struct ClusterEntry {
    tags: BTreeSet<i64>,
    ty: StreamType,
    width: usize,
    successor_index: usize,
}

/// Tag/type/width clustering configuration (`spec.md` §4.K): partitions a
/// cluster graph's inputs by reading each stream's [`TAG_METADATA_KEY`]
/// and its (type, width), falling back to a per-type default successor
/// for inputs with no matching cluster.
///
/// Validated as each cluster is declared: a cluster's tag set must be
/// disjoint from every other cluster's tag set sharing its (type, width)
/// (`spec.md` §4.K, §8 "Clustering disjointness"), and every successor
/// index must reference a real entry of the shared successor table.
pub struct ClusterConfig {
    successors: Vec<Successor>,
    entries: Vec<ClusterEntry>,
    default_successors: HashMap<StreamType, usize>,
}

impl ClusterConfig {
    /// Start a configuration over a shared successor table; clusters and
    /// defaults reference entries of `successors` by index.
    pub fn new(successors: Vec<Successor>) -> Self {
        Self {
            successors,
            entries: Vec::new(),
            default_successors: HashMap::new(),
        }
    }

    fn check_successor_index(&self, successor_index: usize) -> Result<()> {
        if successor_index >= self.successors.len() {
            return Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("cluster successor index {successor_index} out of range"),
            ));
        }
        Ok(())
    }

    /// Declare one cluster: streams tagged with any of `tags`, of type
    /// `ty` and element width `width`, are concatenated and routed to
    /// `successors[successor_index]`.
    ///
    /// Errors if `successor_index` is out of range, or if `tags`
    /// intersects an already-declared cluster's tag set at the same
    /// `(ty, width)` (`spec.md` §4.K's configuration-time disjointness
    /// invariant).
    pub fn with_cluster(
        mut self,
        tags: impl IntoIterator<Item = i64>,
        ty: StreamType,
        width: usize,
        successor_index: usize,
    ) -> Result<Self> {
        self.check_successor_index(successor_index)?;
        let tags: BTreeSet<i64> = tags.into_iter().collect();
        for existing in &self.entries {
            if existing.ty == ty && existing.width == width && !existing.tags.is_disjoint(&tags) {
                return Err(Error::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "cluster tag sets must be disjoint within the same (type, width); \
                         a tag is claimed by two clusters of type {ty:?} width {width}"
                    ),
                ));
            }
        }
        self.entries.push(ClusterEntry { tags, ty, width, successor_index });
        Ok(self)
    }

    /// Declare the successor unassigned inputs of type `ty` are routed
    /// to: any stream of that type whose tag (if any) matches no
    /// declared cluster (`spec.md` §4.K "default successor per type").
    pub fn with_default_successor(mut self, ty: StreamType, successor_index: usize) -> Result<Self> {
        self.check_successor_index(successor_index)?;
        self.default_successors.insert(ty, successor_index);
        Ok(self)
    }

    fn entry_for(&self, stream: &TypedStream) -> Option<&ClusterEntry> {
        let tag = stream.int_metadata().get(TAG_METADATA_KEY)?;
        self.entries
            .iter()
            .find(|e| e.ty == stream.ty() && e.width == stream.width() && e.tags.contains(&tag))
    }
}

impl crate::graph::ClusteringStrategy for ClusterConfig {
    fn cluster(&self, inputs: &[TypedStream]) -> Vec<ClusterGroupPlan> {
        // successor_index -> (codec, width, member indices), built in one
        // pass so every input sharing a destination lands in one group
        // regardless of which cluster or default matched it.
        let mut groups: BTreeMap<usize, (ConcatCodec, usize, Vec<usize>)> = BTreeMap::new();
        for (i, stream) in inputs.iter().enumerate() {
            let successor_index = match self.entry_for(stream) {
                Some(entry) => entry.successor_index,
                None => match self.default_successors.get(&stream.ty()) {
                    Some(&idx) => idx,
                    None => continue,
                },
            };
            let codec = ConcatCodec::for_type(stream.ty());
            groups.entry(successor_index).or_insert_with(|| (codec, stream.width(), Vec::new())).2.push(i);
        }
        groups
            .into_iter()
            .map(|(successor_index, (codec, width, indices))| ClusterGroupPlan {
                indices,
                codec,
                width,
                successor: self.successors[successor_index].clone(),
            })
            .collect()
    }
}

/// Concatenate `streams`' raw bytes into one fresh stream of type `ty` at
/// `width`, computing the right committed element count for each
/// `StreamType` (`String` needs each input's per-element lengths carried
/// along; `Numeric`/`Struct` divide total bytes by `width`; `Serial`
/// counts bytes directly). Shared by [`merge_group`]'s forward
/// concatenation and a function graph's reverse `run_split` replay,
/// which is exactly the same operation run on resolved edge streams
/// instead of cluster members.
pub(crate) fn concat_streams(ty: StreamType, width: usize, streams: &[&TypedStream]) -> Result<TypedStream> {
    let mut bytes = Vec::new();
    let mut lengths = Vec::new();
    for stream in streams {
        stream.with_bytes(|b| bytes.extend_from_slice(b));
        if ty == StreamType::String {
            lengths.extend(stream.string_lengths());
        }
    }

    let merged = TypedStream::create(ty, if ty == StreamType::String { 0 } else { width })?;
    let count = match ty {
        StreamType::String => lengths.len(),
        StreamType::Numeric | StreamType::Struct => bytes.len() / width.max(1),
        _ => bytes.len(),
    };
    merged.reserve(count)?;
    merged.write_bytes(&bytes)?;
    if ty == StreamType::String {
        for len in lengths {
            merged.append_to_string_lengths(len)?;
        }
    }
    merged.commit(count)?;
    Ok(merged)
}

/// Concatenate `members`' raw bytes into a single stream of `codec`'s
/// stream type at `width`, recording each member's original index and
/// shape.
pub fn merge_group(
    indices: &[usize],
    streams: &[&TypedStream],
    codec: ConcatCodec,
    width: usize,
) -> Result<(TypedStream, ClusterGroup)> {
    let ty = match codec {
        ConcatCodec::Serial => StreamType::Serial,
        ConcatCodec::Struct => StreamType::Struct,
        ConcatCodec::Numeric => StreamType::Numeric,
        ConcatCodec::String => StreamType::String,
    };
    for stream in streams {
        if !codec.matches(stream.ty()) {
            return Err(logic_error("cluster merge: member stream type does not match the group's codec"));
        }
    }

    let members = indices
        .iter()
        .zip(streams)
        .map(|(&original_index, &stream)| OriginalMember {
            original_index,
            shape: StreamShape::of(stream),
        })
        .collect();

    let merged = concat_streams(ty, width, streams)?;
    Ok((merged, ClusterGroup { members }))
}

/// Slice `stream` into contiguous segments of `sizes[i]` elements each,
/// in order (`spec.md` §4.H "run a split node with caller-supplied
/// segment sizes"). `stream` must not be a `String` stream: an element
/// count alone doesn't determine a byte range without the per-element
/// lengths a dedicated string-splitting op would need to carry.
pub fn split_by_sizes(stream: &TypedStream, sizes: &[usize]) -> Result<Vec<TypedStream>> {
    if stream.ty() == StreamType::String {
        return Err(Error::new(ErrorCode::InvalidRequest, "run_split does not support String streams"));
    }
    let total: usize = sizes.iter().sum();
    if total != stream.num_elements() {
        return Err(Error::new(
            ErrorCode::InvalidRequest,
            format!("split sizes sum to {total} elements but the stream has {}", stream.num_elements()),
        ));
    }
    let width = stream.width().max(1);
    let mut out = Vec::with_capacity(sizes.len());
    stream.with_bytes(|bytes| -> Result<()> {
        let mut pos = 0;
        for &count in sizes {
            let len = count * width;
            let segment = TypedStream::create(stream.ty(), stream.width())?;
            segment.reserve(count)?;
            segment.write_bytes(&bytes[pos..pos + len])?;
            segment.commit(count)?;
            out.push(segment);
            pos += len;
        }
        Ok(())
    })?;
    Ok(out)
}

/// Invert [`merge_group`]: split `merged`'s bytes back into the original
/// per-member streams, each restored to its recorded shape.
pub fn split_group(merged: &TypedStream, group: &ClusterGroup) -> Result<Vec<(usize, TypedStream)>> {
    let mut out = Vec::with_capacity(group.members.len());
    merged.with_bytes(|bytes| -> Result<()> {
        let mut pos = 0;
        for member in &group.members {
            let len = member_byte_len(&member.shape);
            if pos + len > bytes.len() {
                return Err(logic_error("cluster split: merged stream shorter than member shapes imply"));
            }
            let stream = TypedStream::create(member.shape.ty, member.shape.width)?;
            stream.reserve(len)?;
            stream.write_bytes(&bytes[pos..pos + len])?;
            if member.shape.ty == StreamType::String {
                for l in member.shape.string_lengths.as_deref().unwrap_or(&[]) {
                    stream.append_to_string_lengths(*l)?;
                }
            }
            stream.commit(member.shape.num_elements)?;
            for (key, value) in member.shape.int_metadata.iter() {
                stream.int_metadata_set(key, value);
            }
            out.push((member.original_index, stream));
            pos += len;
        }
        Ok(())
    })?;
    Ok(out)
}

fn member_byte_len(shape: &StreamShape) -> usize {
    if shape.ty == StreamType::String {
        shape.string_lengths.as_deref().unwrap_or(&[]).iter().map(|&l| l as usize).sum()
    } else {
        shape.num_elements * shape.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ClusteringStrategy;
    use crate::node::NodeId;

    fn leaf_successor(id: u32) -> Successor {
        Successor { node: NodeId(id), next: vec![] }
    }

    #[test]
    fn merge_then_split_restores_two_numeric_streams() {
        let a = TypedStream::create(StreamType::Numeric, 4).unwrap();
        a.reserve(2).unwrap();
        a.write_bytes(&1u32.to_le_bytes()).unwrap();
        a.write_bytes(&2u32.to_le_bytes()).unwrap();
        a.commit(2).unwrap();
        a.int_metadata_set(2, 99);

        let b = TypedStream::create(StreamType::Numeric, 4).unwrap();
        b.reserve(1).unwrap();
        b.write_bytes(&3u32.to_le_bytes()).unwrap();
        b.commit(1).unwrap();

        let (merged, group) = merge_group(&[5, 9], &[&a, &b], ConcatCodec::Numeric, 4).unwrap();
        assert_eq!(merged.ty(), StreamType::Numeric);
        let restored = split_group(&merged, &group).unwrap();
        assert_eq!(restored[0].0, 5);
        assert_eq!(restored[1].0, 9);
        restored[0].1.with_bytes(|got| a.with_bytes(|orig| assert_eq!(got, orig)));
        restored[1].1.with_bytes(|got| b.with_bytes(|orig| assert_eq!(got, orig)));
        assert_eq!(restored[0].1.int_metadata_get(2), Some(99));
    }

    #[test]
    fn merge_then_split_restores_serial_streams() {
        let a = TypedStream::create(StreamType::Serial, 1).unwrap();
        a.reserve(3).unwrap();
        a.write_bytes(b"xyz").unwrap();
        a.commit(3).unwrap();

        let b = TypedStream::create(StreamType::Serial, 1).unwrap();
        b.reserve(2).unwrap();
        b.write_bytes(b"ab").unwrap();
        b.commit(2).unwrap();

        let (merged, group) = merge_group(&[0, 1], &[&a, &b], ConcatCodec::Serial, 1).unwrap();
        merged.with_bytes(|got| assert_eq!(got, b"xyzab"));
        let restored = split_group(&merged, &group).unwrap();
        restored[0].1.with_bytes(|got| a.with_bytes(|orig| assert_eq!(got, orig)));
        restored[1].1.with_bytes(|got| b.with_bytes(|orig| assert_eq!(got, orig)));
    }

    #[test]
    fn merge_then_split_restores_string_streams_with_their_lengths() {
        let a = TypedStream::create(StreamType::String, 0).unwrap();
        a.reserve(5).unwrap();
        a.write_bytes(b"hi").unwrap();
        a.append_to_string_lengths(2).unwrap();
        a.write_bytes(b"there").unwrap();
        a.append_to_string_lengths(5).unwrap();
        a.commit(2).unwrap();

        let b = TypedStream::create(StreamType::String, 0).unwrap();
        b.reserve(1).unwrap();
        b.write_bytes(b"!").unwrap();
        b.append_to_string_lengths(1).unwrap();
        b.commit(1).unwrap();

        let (merged, group) = merge_group(&[0, 1], &[&a, &b], ConcatCodec::String, 0).unwrap();
        assert_eq!(merged.string_lengths(), vec![2, 5, 1]);
        let restored = split_group(&merged, &group).unwrap();
        restored[0].1.with_bytes(|got| a.with_bytes(|orig| assert_eq!(got, orig)));
        restored[1].1.with_bytes(|got| b.with_bytes(|orig| assert_eq!(got, orig)));
        assert_eq!(restored[0].1.string_lengths(), vec![2, 5]);
        assert_eq!(restored[1].1.string_lengths(), vec![1]);
    }

    #[test]
    fn with_cluster_rejects_overlapping_tag_sets_at_the_same_type_and_width() {
        let config = ClusterConfig::new(vec![leaf_successor(1), leaf_successor(2)])
            .with_cluster([1, 2], StreamType::Numeric, 8, 0)
            .unwrap();
        let err = config.with_cluster([2, 3], StreamType::Numeric, 8, 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn with_cluster_allows_overlapping_tags_at_different_widths() {
        let config = ClusterConfig::new(vec![leaf_successor(1), leaf_successor(2)])
            .with_cluster([1, 2], StreamType::Numeric, 4, 0)
            .unwrap()
            .with_cluster([1, 2], StreamType::Numeric, 8, 1)
            .unwrap();
        assert_eq!(config.entries.len(), 2);
    }

    #[test]
    fn with_cluster_rejects_an_out_of_range_successor_index() {
        let err = ClusterConfig::new(vec![leaf_successor(1)])
            .with_cluster([1], StreamType::Numeric, 4, 5)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn cluster_routes_tagged_streams_to_their_entry_and_untagged_to_the_default() {
        let config = ClusterConfig::new(vec![leaf_successor(1), leaf_successor(2)])
            .with_cluster([7], StreamType::Numeric, 4, 0)
            .unwrap()
            .with_default_successor(StreamType::Numeric, 1)
            .unwrap();

        let tagged = TypedStream::create(StreamType::Numeric, 4).unwrap();
        tagged.reserve(1).unwrap();
        tagged.write_bytes(&1u32.to_le_bytes()).unwrap();
        tagged.commit(1).unwrap();
        tagged.int_metadata_set(TAG_METADATA_KEY, 7);

        let untagged = TypedStream::create(StreamType::Numeric, 4).unwrap();
        untagged.reserve(1).unwrap();
        untagged.write_bytes(&2u32.to_le_bytes()).unwrap();
        untagged.commit(1).unwrap();

        let plans = config.cluster(&[tagged, untagged]);
        assert_eq!(plans.len(), 2);
        let tagged_plan = plans.iter().find(|p| p.indices == vec![0]).unwrap();
        assert_eq!(tagged_plan.successor.node, NodeId(1));
        let default_plan = plans.iter().find(|p| p.indices == vec![1]).unwrap();
        assert_eq!(default_plan.successor.node, NodeId(2));
    }

    #[test]
    fn cluster_skips_streams_matching_neither_a_cluster_nor_a_default() {
        let config = ClusterConfig::new(vec![leaf_successor(1)]).with_cluster([7], StreamType::Numeric, 4, 0).unwrap();

        let stray = TypedStream::create(StreamType::Serial, 1).unwrap();
        stray.reserve(1).unwrap();
        stray.write_bytes(b"x").unwrap();
        stray.commit(1).unwrap();

        assert!(config.cluster(&[stray]).is_empty());
    }
}
