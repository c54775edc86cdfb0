//! Named-level hierarchy of segments and the summing matrices between levels.
//!
//! ```text
//! level "total":            total
//!                          /     \
//! level "market":         X       Y
//!                        / \     / \
//! level "product":      a   b   c   d
//! ```
//!
//! Branches may stop above the deepest level. A leaf that does so *tails*: it
//! stands in for itself at every deeper level, so that each level still covers
//! the whole series universe exactly once.
//!
//! ```text
//! level "l1":   total               level segments
//!               /    \              l1: [total]
//! level "l2":  X      Y             l2: [X, Y]
//!              :     / \            l3: [X, c, d]
//! level "l3":  X    c   d           l4: [X, f, g]
//!              :    |   |
//! level "l4":  X    f   g
//! ```

use super::node::Node;
use super::validate::{validate_level_structure, Severity};
use crate::error::{Error, Result};
use crate::sparse::SparseMatrix;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serializable description of a hierarchy.
///
/// ```json
/// {
///   "level_structure": {"total": ["X", "Y"], "X": ["a", "b"], "Y": ["c", "d"]},
///   "level_names": ["total", "market", "product"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyDescription {
    /// Parent segment → ordered children.
    pub level_structure: BTreeMap<String, Vec<String>>,
    /// Level names, root first.
    pub level_names: Vec<String>,
}

/// An immutable hierarchy of segments with named levels.
///
/// Summing matrices are built on first request for a level pair and cached in
/// write-once cells, so a structure can be shared between threads behind an
/// [`Arc`] and queried concurrently.
#[derive(Debug, Clone)]
pub struct HierarchicalStructure {
    level_structure: BTreeMap<String, Vec<String>>,
    level_names: Vec<String>,
    /// Arena in breadth-first order, root at 0.
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    level_index: HashMap<String, usize>,
    /// Active segments of each level, sorted by name.
    level_segments: Vec<Vec<String>>,
    /// Arena ids parallel to `level_segments`.
    level_nodes: Vec<Vec<usize>>,
    /// `summing_matrices[target_depth * n_levels + source_depth]`.
    summing_matrices: Vec<OnceCell<Arc<SparseMatrix>>>,
}

impl HierarchicalStructure {
    /// Build a structure from a parent → children mapping and root-first level names.
    pub fn new(
        level_structure: BTreeMap<String, Vec<String>>,
        level_names: Vec<String>,
    ) -> Result<Self> {
        if level_structure.is_empty() {
            return Err(Error::EmptyHierarchy);
        }

        let report = validate_level_structure(&level_structure, &level_names);
        if let Some(issue) = report.worst() {
            if issue.severity >= Severity::Error {
                return Err(Error::InvalidStructure {
                    reason: issue.to_string(),
                });
            }
        }
        for issue in report.issues_at_level(Severity::Warning) {
            warn!(%issue, "hierarchy description");
        }

        let children: HashSet<&String> = level_structure.values().flatten().collect();
        let root_name = level_structure
            .keys()
            .find(|name| !children.contains(name))
            .cloned()
            .ok_or_else(|| Error::InvalidStructure {
                reason: "no root segment found".to_string(),
            })?;

        let mut nodes: Vec<Node> = Vec::new();
        let mut node_index: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<(String, Option<usize>, usize)> = VecDeque::new();
        queue.push_back((root_name, None, 0));

        while let Some((name, parent, depth)) = queue.pop_front() {
            let id = nodes.len();
            if let Some(p) = parent {
                nodes[p].children.push(id);
            }
            if let Some(children) = level_structure.get(&name) {
                for child in children {
                    queue.push_back((child.clone(), Some(id), depth + 1));
                }
            }
            let _ = node_index.insert(name.clone(), id);
            nodes.push(Node {
                id,
                name,
                depth,
                parent,
                children: Vec::new(),
                last_active_depth: depth,
            });
        }

        let max_depth = nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        if level_names.len() != max_depth + 1 {
            return Err(Error::InvalidStructure {
                reason: format!(
                    "length of level names ({}) must be equal to hierarchy tree depth ({})",
                    level_names.len(),
                    max_depth + 1
                ),
            });
        }

        for node in nodes.iter_mut().filter(|n| n.is_leaf()) {
            node.last_active_depth = max_depth;
        }

        let n_levels = level_names.len();
        let mut level_nodes: Vec<Vec<usize>> = (0..n_levels)
            .map(|depth| {
                nodes
                    .iter()
                    .filter(|n| n.is_active_at(depth))
                    .map(|n| n.id)
                    .collect()
            })
            .collect();
        for ids in &mut level_nodes {
            ids.sort_by(|&a, &b| nodes[a].name.cmp(&nodes[b].name));
        }
        let level_segments: Vec<Vec<String>> = level_nodes
            .iter()
            .map(|ids| ids.iter().map(|&id| nodes[id].name.clone()).collect())
            .collect();

        let level_index = level_names
            .iter()
            .enumerate()
            .map(|(depth, name)| (name.clone(), depth))
            .collect();

        debug!(
            levels = n_levels,
            segments = nodes.len(),
            leaves = nodes.iter().filter(|n| n.is_leaf()).count(),
            "built hierarchical structure"
        );

        Ok(Self {
            level_structure,
            level_names,
            nodes,
            node_index,
            level_index,
            level_segments,
            level_nodes,
            summing_matrices: (0..n_levels * n_levels).map(|_| OnceCell::new()).collect(),
        })
    }

    /// Decode a structure from a JSON [`HierarchyDescription`].
    pub fn from_json(json: &str) -> Result<Self> {
        let description: HierarchyDescription = serde_json::from_str(json)?;
        Self::try_from(description)
    }

    /// Encode the structure as a JSON [`HierarchyDescription`].
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_description())?)
    }

    /// The description this structure was built from.
    pub fn to_description(&self) -> HierarchyDescription {
        HierarchyDescription {
            level_structure: self.level_structure.clone(),
            level_names: self.level_names.clone(),
        }
    }

    /// Level names, root first.
    pub fn level_names(&self) -> &[String] {
        &self.level_names
    }

    /// Parent → children mapping.
    pub fn level_structure(&self) -> &BTreeMap<String, Vec<String>> {
        &self.level_structure
    }

    /// Number of levels.
    pub fn n_levels(&self) -> usize {
        self.level_names.len()
    }

    /// Name of the root segment.
    pub fn root(&self) -> &str {
        &self.nodes[0].name
    }

    /// Arena node of a segment.
    pub fn node(&self, segment: &str) -> Option<&Node> {
        self.node_index.get(segment).map(|&id| &self.nodes[id])
    }

    /// Leaf segments, sorted by name.
    pub fn leaf_segments(&self) -> Vec<&str> {
        let mut leaves: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.name.as_str())
            .collect();
        leaves.sort_unstable();
        leaves
    }

    /// Position of a level in `level_names`.
    pub fn level_depth(&self, level_name: &str) -> Result<usize> {
        self.level_index
            .get(level_name)
            .copied()
            .ok_or_else(|| Error::UnknownLevel {
                level: level_name.to_string(),
            })
    }

    /// Segments active at a level, sorted by name.
    pub fn level_segments(&self, level_name: &str) -> Result<&[String]> {
        let depth = self.level_depth(level_name)?;
        Ok(&self.level_segments[depth])
    }

    /// Segments active at a depth, sorted by name.
    pub(crate) fn segments_at_depth(&self, depth: usize) -> &[String] {
        &self.level_segments[depth]
    }

    /// Depths at which a segment is the active node of its branch.
    pub fn segment_level_range(&self, segment: &str) -> Result<RangeInclusive<usize>> {
        self.node(segment)
            .map(|node| node.depth..=node.last_active_depth)
            .ok_or_else(|| Error::UnknownSegment {
                segment: segment.to_string(),
            })
    }

    /// Sparse 0/1 matrix aggregating `source_level` segments into `target_level` segments.
    ///
    /// Shape is `|target segments| x |source segments|`; rows and columns follow
    /// [`level_segments`](Self::level_segments) order. The target level must be the
    /// same as or above the source level.
    pub fn summing_matrix(&self, target_level: &str, source_level: &str) -> Result<Arc<SparseMatrix>> {
        let target_depth = self.level_depth(target_level)?;
        let source_depth = self.level_depth(source_level)?;
        if target_depth > source_depth {
            return Err(Error::InvalidLevelOrder {
                finer: source_level.to_string(),
                coarser: target_level.to_string(),
            });
        }

        let cell = &self.summing_matrices[target_depth * self.n_levels() + source_depth];
        cell.get_or_try_init(|| {
            debug!(target_level, source_level, "computing summing matrix");
            self.build_summing_matrix(target_depth, source_depth)
                .map(Arc::new)
        })
        .map(Arc::clone)
    }

    fn build_summing_matrix(&self, target_depth: usize, source_depth: usize) -> Result<SparseMatrix> {
        let target_segments = &self.level_segments[target_depth];
        let triplets = self.level_nodes[source_depth]
            .iter()
            .enumerate()
            .map(|(col, &id)| {
                let ancestor = self.active_ancestor(id, target_depth);
                target_segments
                    .binary_search(&self.nodes[ancestor].name)
                    .map(|row| (row, col, 1.0))
                    .map_err(|_| Error::UnknownSegment {
                        segment: self.nodes[ancestor].name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        SparseMatrix::from_triplets(
            target_segments.len(),
            self.level_segments[source_depth].len(),
            triplets,
        )
    }

    /// Walk up from `id` to the node that represents its branch at `depth`.
    ///
    /// A tailing leaf above `depth` is its own representative.
    fn active_ancestor(&self, id: usize, depth: usize) -> usize {
        let mut current = id;
        while self.nodes[current].depth > depth {
            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}

impl PartialEq for HierarchicalStructure {
    fn eq(&self, other: &Self) -> bool {
        self.level_names == other.level_names && self.level_structure == other.level_structure
    }
}

impl Eq for HierarchicalStructure {}

impl TryFrom<HierarchyDescription> for HierarchicalStructure {
    type Error = Error;

    fn try_from(description: HierarchyDescription) -> Result<Self> {
        Self::new(description.level_structure, description.level_names)
    }
}

impl From<&HierarchicalStructure> for HierarchyDescription {
    fn from(structure: &HierarchicalStructure) -> Self {
        structure.to_description()
    }
}

impl Serialize for HierarchicalStructure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_description().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HierarchicalStructure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let description = HierarchyDescription::deserialize(deserializer)?;
        Self::try_from(description).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn build(edges: &[(&str, &[&str])], levels: &[&str]) -> Result<HierarchicalStructure> {
        let level_structure = edges
            .iter()
            .map(|(p, cs)| (p.to_string(), cs.iter().map(|c| c.to_string()).collect()))
            .collect();
        HierarchicalStructure::new(
            level_structure,
            levels.iter().map(|l| l.to_string()).collect(),
        )
    }

    fn market_product() -> HierarchicalStructure {
        build(
            &[("total", &["X", "Y"]), ("X", &["a", "b"]), ("Y", &["c", "d"])],
            &["total", "market", "product"],
        )
        .unwrap()
    }

    // One branch of depth 2 (X), one of depth 4 (Y -> c -> f, Y -> d -> g).
    fn tailed() -> HierarchicalStructure {
        build(
            &[("total", &["X", "Y"]), ("Y", &["c", "d"]), ("c", &["f"]), ("d", &["g"])],
            &["l1", "l2", "l3", "l4"],
        )
        .unwrap()
    }

    fn assert_partition(m: &SparseMatrix) {
        assert!(m.col_counts().iter().all(|&c| c == 1), "{:?}", m);
        assert!(m.row_counts().iter().all(|&c| c >= 1), "{:?}", m);
    }

    #[test]
    fn test_level_depth_and_segments() {
        let hs = market_product();
        assert_eq!(hs.level_depth("total").unwrap(), 0);
        assert_eq!(hs.level_depth("product").unwrap(), 2);
        assert_eq!(hs.level_segments("market").unwrap(), ["X", "Y"]);
        assert_eq!(hs.level_segments("product").unwrap(), ["a", "b", "c", "d"]);
        assert_eq!(hs.root(), "total");
        assert_eq!(hs.leaf_segments(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unknown_level() {
        let hs = market_product();
        assert_eq!(
            hs.level_depth("abcd").unwrap_err(),
            Error::UnknownLevel {
                level: "abcd".to_string()
            }
        );
        assert!(hs.level_segments("").is_err());
    }

    #[test]
    fn test_tailed_level_segments() {
        let hs = tailed();
        assert_eq!(hs.level_segments("l1").unwrap(), ["total"]);
        assert_eq!(hs.level_segments("l2").unwrap(), ["X", "Y"]);
        assert_eq!(hs.level_segments("l3").unwrap(), ["X", "c", "d"]);
        assert_eq!(hs.level_segments("l4").unwrap(), ["X", "f", "g"]);
        assert_eq!(hs.segment_level_range("X").unwrap(), 1..=3);
        assert_eq!(hs.segment_level_range("c").unwrap(), 2..=2);
        assert!(hs.segment_level_range("zzz").is_err());
    }

    #[test]
    fn test_summing_matrix_market_product() {
        let hs = market_product();
        let s = hs.summing_matrix("market", "product").unwrap();
        assert_eq!((s.nrows(), s.ncols()), (2, 4));
        assert_eq!(s.support(), vec![(0, 0), (0, 1), (1, 2), (1, 3)]);

        let total = hs.summing_matrix("total", "product").unwrap();
        assert_eq!(total.support(), vec![(0, 0), (0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn test_summing_matrix_same_level_is_identity() {
        let hs = market_product();
        let s = hs.summing_matrix("product", "product").unwrap();
        assert_eq!(s.support(), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_summing_matrix_tailed() {
        let hs = tailed();
        // l4 [X, f, g] -> l2 [X, Y]
        let s = hs.summing_matrix("l2", "l4").unwrap();
        assert_eq!(s.support(), vec![(0, 0), (1, 1), (1, 2)]);
        // l4 [X, f, g] -> l3 [X, c, d]
        let s = hs.summing_matrix("l3", "l4").unwrap();
        assert_eq!(s.support(), vec![(0, 0), (1, 1), (2, 2)]);
        assert_partition(&s);
    }

    #[test]
    fn test_summing_matrix_invalid_order() {
        let hs = market_product();
        let err = hs.summing_matrix("product", "market").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidLevelOrder {
                finer: "market".to_string(),
                coarser: "product".to_string()
            }
        );
    }

    #[test]
    fn test_summing_matrix_is_cached() {
        let hs = market_product();
        let first = hs.summing_matrix("total", "market").unwrap();
        let second = hs.summing_matrix("total", "market").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_summing_matrix_concurrent_readers() {
        let hs = Arc::new(tailed());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let hs = Arc::clone(&hs);
                scope.spawn(move || {
                    let s = hs.summing_matrix("l1", "l4").unwrap();
                    assert_eq!(s.nnz(), 3);
                });
            }
        });
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(build(&[], &["total"]).unwrap_err(), Error::EmptyHierarchy);

        let err = build(&[("total", &["X"])], &["total", "market", "product"]).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure { ref reason } if reason.contains("depth")));

        let err = build(&[("a", &["b"]), ("b", &["a"])], &["l1", "l2"]).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure { ref reason } if reason.contains("cycle")));

        let err = build(&[("total", &["X"]), ("other", &["Y"])], &["l1", "l2"]).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure { .. }));
    }

    #[test]
    fn test_equality() {
        assert_eq!(market_product(), market_product());
        let renamed = build(
            &[("total", &["X", "Y"]), ("X", &["a", "b"]), ("Y", &["c", "d"])],
            &["l1", "l2", "l3"],
        )
        .unwrap();
        assert_ne!(market_product(), renamed);
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "level_structure": {"total": ["X", "Y"], "X": ["a", "b"], "Y": ["c", "d"]},
            "level_names": ["total", "market", "product"]
        }"#;
        let hs = HierarchicalStructure::from_json(json).unwrap();
        assert_eq!(hs, market_product());

        let encoded = hs.to_json().unwrap();
        let decoded: HierarchicalStructure = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, hs);

        assert!(matches!(
            HierarchicalStructure::from_json("{\"level_names\": []}"),
            Err(Error::Json(_))
        ));
    }

    /// Random tree: each node gets 0..=3 children, bounded depth.
    fn arb_tree() -> impl Strategy<Value = (BTreeMap<String, Vec<String>>, usize)> {
        proptest::collection::vec(0usize..4, 1..40).prop_map(|fanouts| {
            let mut structure: BTreeMap<String, Vec<String>> = BTreeMap::new();
            let mut frontier = vec![("total".to_string(), 0usize)];
            let mut next_id = 0usize;
            let mut max_depth = 0usize;
            let mut fanouts = fanouts.into_iter();
            // root always gets at least one child
            let mut first = true;
            while let Some((name, depth)) = frontier.pop() {
                let Some(fanout) = fanouts.next() else { break };
                let fanout = if first { fanout.max(1) } else { fanout };
                first = false;
                if depth >= 4 || fanout == 0 {
                    continue;
                }
                let children: Vec<String> = (0..fanout)
                    .map(|_| {
                        next_id += 1;
                        format!("s{next_id:03}")
                    })
                    .collect();
                for child in &children {
                    frontier.push((child.clone(), depth + 1));
                }
                max_depth = max_depth.max(depth + 1);
                structure.insert(name, children);
            }
            (structure, max_depth)
        })
    }

    proptest! {
        #[test]
        fn summing_matrices_partition_every_level_pair((structure, max_depth) in arb_tree()) {
            let level_names: Vec<String> = (0..=max_depth).map(|d| format!("l{d}")).collect();
            let hs = HierarchicalStructure::new(structure, level_names.clone()).unwrap();

            for (t, target) in level_names.iter().enumerate() {
                for source in &level_names[t..] {
                    let s = hs.summing_matrix(target, source).unwrap();
                    prop_assert!(s.col_counts().iter().all(|&c| c == 1));
                    prop_assert!(s.row_counts().iter().all(|&c| c >= 1));
                }
                for source in &level_names[..t] {
                    let is_order_error = matches!(
                        hs.summing_matrix(target, source),
                        Err(Error::InvalidLevelOrder { .. })
                    );
                    prop_assert!(is_order_error);
                }
            }
        }

        #[test]
        fn level_segments_cover_leaf_universe((structure, max_depth) in arb_tree()) {
            let level_names: Vec<String> = (0..=max_depth).map(|d| format!("l{d}")).collect();
            let hs = HierarchicalStructure::new(structure, level_names.clone()).unwrap();
            let leaves: BTreeSet<&str> = hs.leaf_segments().into_iter().collect();

            for level in &level_names {
                let segments = hs.level_segments(level).unwrap();
                let unique: BTreeSet<&str> = segments.iter().map(String::as_str).collect();
                prop_assert_eq!(unique.len(), segments.len());

                // every leaf rolls up into exactly one segment of this level
                let s = hs.summing_matrix(level, level_names.last().unwrap()).unwrap();
                prop_assert_eq!(s.ncols(), leaves.len());
                prop_assert_eq!(s.nrows(), segments.len());
            }
            let deepest = hs.level_segments(level_names.last().unwrap()).unwrap();
            let deepest: BTreeSet<&str> = deepest.iter().map(String::as_str).collect();
            prop_assert_eq!(deepest, leaves);
        }
    }
}
