//! Arena-backed multigrid: vertices, nodes and elements of every level.
//!
//! The multigrid owns three arenas and one [`Grid`] per refinement level.
//! Neighbor, father, son and corner references are handles into the
//! arenas, which keeps removal O(1) and makes every reference checkable.
//!
//! Only the replication middleware changes an element's [`Priority`]; the
//! partitioners write the destination attribute ([`Element::partition`])
//! and the overlap planner writes node [`VectorOwnership`] flags.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshDistribError;
use crate::topology::cell_type::ElementTag;
use crate::topology::grid::{Grid, Linked, Links, ListIter, Slots};
use crate::topology::handle::{ElementId, NodeId, VertexId};
use crate::topology::priority::{ControlWord, ElementFlag, Priority, VectorOwnership};
use hashbrown::HashMap;

/// Process rank.
pub type Rank = usize;

/// Level-local grid type of a [`MultiGrid`].
pub type LevelGrid = Grid<ElementId, NodeId>;

/// Coordinates of a geometric vertex; unused axes are zero.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vertex {
    pub coords: [f64; 3],
}

/// Auxiliary degree-of-freedom data attached to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuxVector {
    pub components: usize,
}

/// One level's instance of a vertex.
#[derive(Clone, Debug)]
pub struct Node {
    links: Links<NodeId>,
    level: usize,
    vertex: VertexId,
    vector: Option<AuxVector>,
    ownership: VectorOwnership,
}

impl Node {
    pub fn level(&self) -> usize {
        self.level
    }
    pub fn vertex(&self) -> VertexId {
        self.vertex
    }
    pub fn vector(&self) -> Option<AuxVector> {
        self.vector
    }
    pub fn ownership(&self) -> VectorOwnership {
        self.ownership
    }
}

impl Linked<NodeId> for Node {
    fn links(&self) -> &Links<NodeId> {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links<NodeId> {
        &mut self.links
    }
}

/// One side of an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Side {
    /// Element across this side; `None` on the domain or partition boundary.
    pub neighbor: Option<ElementId>,
    /// Domain part of the boundary segment this side lies on.
    pub boundary_part: Option<u32>,
}

/// A mesh element.
#[derive(Clone, Debug)]
pub struct Element {
    links: Links<ElementId>,
    level: usize,
    tag: ElementTag,
    corners: Vec<NodeId>,
    sides: Vec<Side>,
    father: Option<ElementId>,
    sons: Vec<ElementId>,
    partition: Rank,
    control: ControlWord,
}

impl Element {
    pub fn level(&self) -> usize {
        self.level
    }
    pub fn tag(&self) -> ElementTag {
        self.tag
    }
    pub fn corners(&self) -> &[NodeId] {
        &self.corners
    }
    pub fn sides(&self) -> &[Side] {
        &self.sides
    }
    /// Neighbor across `side`, `None` if absent or out of range.
    pub fn neighbor(&self, side: usize) -> Option<ElementId> {
        self.sides.get(side).and_then(|s| s.neighbor)
    }
    /// Existing side neighbors.
    pub fn neighbors(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.sides.iter().filter_map(|s| s.neighbor)
    }
    pub fn father(&self) -> Option<ElementId> {
        self.father
    }
    pub fn sons(&self) -> &[ElementId] {
        &self.sons
    }
    /// Destination rank computed by the partitioners.
    pub fn partition(&self) -> Rank {
        self.partition
    }
    pub fn priority(&self) -> Priority {
        self.control.priority()
    }
    pub fn control(&self) -> ControlWord {
        self.control
    }
    /// Whether any side lies on a domain boundary segment.
    pub fn is_boundary(&self) -> bool {
        self.control.has(ElementFlag::Boundary)
    }
}

impl Linked<ElementId> for Element {
    fn links(&self) -> &Links<ElementId> {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links<ElementId> {
        &mut self.links
    }
}

/// All levels of one process's local mesh.
#[derive(Clone, Debug)]
pub struct MultiGrid {
    dim: usize,
    vertices: Vec<Vertex>,
    nodes: Slots<NodeId, Node>,
    elements: Slots<ElementId, Element>,
    grids: Vec<LevelGrid>,
}

impl MultiGrid {
    /// Empty multigrid of dimension `dim` (2 or 3) with a single level.
    ///
    /// # Panics
    /// Panics if `dim` is not 2 or 3.
    pub fn new(dim: usize) -> Self {
        assert!(dim == 2 || dim == 3, "multigrid dimension must be 2 or 3, got {dim}");
        Self {
            dim,
            vertices: Vec::new(),
            nodes: Slots::default(),
            elements: Slots::default(),
            grids: vec![LevelGrid::new(0)],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Index of the finest level.
    pub fn top_level(&self) -> usize {
        self.grids.len() - 1
    }

    /// Append an empty level and return its index.
    pub fn add_level(&mut self) -> usize {
        let level = self.grids.len();
        self.grids.push(LevelGrid::new(level));
        level
    }

    pub fn grid(&self, level: usize) -> Result<&LevelGrid, MeshDistribError> {
        self.grids.get(level).ok_or(MeshDistribError::LevelOutOfRange {
            level,
            top: self.top_level(),
        })
    }

    /// Total number of live elements over all levels.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Total number of live nodes over all levels.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    pub fn add_vertex(&mut self, coords: [f64; 3]) -> VertexId {
        let v = VertexId::from_index(self.vertices.len());
        self.vertices.push(Vertex { coords });
        v
    }

    /// Add a node on `level` referring to `vertex`.
    pub fn add_node(
        &mut self,
        level: usize,
        vertex: VertexId,
        vector: Option<AuxVector>,
    ) -> Result<NodeId, MeshDistribError> {
        self.grid(level)?;
        self.vertex(vertex)?;
        let n = self.nodes.insert(Node {
            links: Links::default(),
            level,
            vertex,
            vector,
            ownership: VectorOwnership::default(),
        });
        self.grids[level].nodes.push_back(&mut self.nodes, n);
        Ok(n)
    }

    /// Add an element on `level`. A `father` must live on `level - 1`; the
    /// new element is appended to the father's sons and inherits its
    /// destination attribute.
    pub fn add_element(
        &mut self,
        level: usize,
        tag: ElementTag,
        corners: &[NodeId],
        father: Option<ElementId>,
    ) -> Result<ElementId, MeshDistribError> {
        self.grid(level)?;
        if tag.dimension() != self.dim {
            return Err(MeshDistribError::DimensionMismatch {
                tag,
                tag_dim: tag.dimension(),
                dim: self.dim,
            });
        }
        if corners.len() != tag.corners() {
            return Err(MeshDistribError::CornerCount {
                tag,
                expected: tag.corners(),
                found: corners.len(),
            });
        }
        for &c in corners {
            let node_level = self.node(c)?.level;
            if node_level != level {
                return Err(MeshDistribError::NodeLevelMismatch {
                    node: c,
                    node_level,
                    level,
                });
            }
        }
        let mut partition = 0;
        if let Some(f) = father {
            let fel = self.element(f)?;
            if fel.level + 1 != level {
                return Err(MeshDistribError::FatherLevelMismatch {
                    father: f,
                    father_level: fel.level,
                    level,
                });
            }
            partition = fel.partition;
        }
        let mut control = ControlWord::new(Priority::Master);
        control.set(ElementFlag::Refined, father.is_some());
        let e = self.elements.insert(Element {
            links: Links::default(),
            level,
            tag,
            corners: corners.to_vec(),
            sides: vec![Side::default(); tag.sides()],
            father,
            sons: Vec::new(),
            partition,
            control,
        });
        self.grids[level].elements.push_back(&mut self.elements, e);
        if let Some(f) = father {
            self.element_mut(f)?.sons.push(e);
        }
        Ok(e)
    }

    /// Set the neighbor across `side` of `e` (one direction only).
    pub fn set_neighbor(
        &mut self,
        e: ElementId,
        side: usize,
        neighbor: Option<ElementId>,
    ) -> Result<(), MeshDistribError> {
        if let Some(nb) = neighbor {
            self.element(nb)?;
        }
        self.side_mut(e, side)?.neighbor = neighbor;
        Ok(())
    }

    /// Mark `side` of `e` as lying on boundary segment `part`.
    pub fn set_boundary_part(
        &mut self,
        e: ElementId,
        side: usize,
        part: u32,
    ) -> Result<(), MeshDistribError> {
        self.side_mut(e, side)?.boundary_part = Some(part);
        self.element_mut(e)?.control.set(ElementFlag::Boundary, true);
        Ok(())
    }

    /// Link side neighbors on `level` by matching side corner sets.
    ///
    /// Returns the number of interior sides found. Sides without a partner
    /// keep their neighbor slot empty.
    pub fn connect_sides(&mut self, level: usize) -> Result<usize, MeshDistribError> {
        let elems: Vec<ElementId> = self.elements_on(level)?.collect();
        let mut open: HashMap<Vec<VertexId>, (ElementId, usize)> = HashMap::new();
        let mut pairs = Vec::new();
        for e in elems {
            let el = self.element(e)?;
            for s in 0..el.tag.sides() {
                let mut key = Vec::with_capacity(4);
                for &c in el.tag.side_corners(s) {
                    key.push(self.node(el.corners[c])?.vertex);
                }
                key.sort_unstable();
                match open.remove(&key) {
                    Some((other, os)) => pairs.push(((e, s), (other, os))),
                    None => {
                        open.insert(key, (e, s));
                    }
                }
            }
        }
        for &((a, sa), (b, sb)) in &pairs {
            self.set_neighbor(a, sa, Some(b))?;
            self.set_neighbor(b, sb, Some(a))?;
        }
        Ok(pairs.len())
    }

    // ---------------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------------

    pub fn element(&self, e: ElementId) -> Result<&Element, MeshDistribError> {
        self.elements
            .get(e)
            .ok_or(MeshDistribError::InvalidElement(e))
    }

    fn element_mut(&mut self, e: ElementId) -> Result<&mut Element, MeshDistribError> {
        self.elements
            .get_mut(e)
            .ok_or(MeshDistribError::InvalidElement(e))
    }

    fn side_mut(&mut self, e: ElementId, side: usize) -> Result<&mut Side, MeshDistribError> {
        self.element_mut(e)?
            .sides
            .get_mut(side)
            .ok_or(MeshDistribError::InvalidSide { element: e, side })
    }

    pub fn node(&self, n: NodeId) -> Result<&Node, MeshDistribError> {
        self.nodes.get(n).ok_or(MeshDistribError::InvalidNode(n))
    }

    pub fn vertex(&self, v: VertexId) -> Result<&Vertex, MeshDistribError> {
        self.vertices
            .get(v.index())
            .ok_or(MeshDistribError::InvalidVertex(v))
    }

    /// Coordinates of a node's vertex.
    pub fn node_coords(&self, n: NodeId) -> Result<[f64; 3], MeshDistribError> {
        Ok(self.vertex(self.node(n)?.vertex)?.coords)
    }

    /// Elements of `level` in list order.
    pub fn elements_on(
        &self,
        level: usize,
    ) -> Result<ListIter<'_, ElementId, Element>, MeshDistribError> {
        Ok(self.grid(level)?.elements.iter(&self.elements))
    }

    /// Nodes of `level` in list order.
    pub fn nodes_on(&self, level: usize) -> Result<ListIter<'_, NodeId, Node>, MeshDistribError> {
        Ok(self.grid(level)?.nodes.iter(&self.nodes))
    }

    /// Master elements of `level` in list order.
    ///
    /// Only these carry a destination; Ghost and VGhost replicas are owned
    /// by another rank.
    pub fn masters_on(&self, level: usize) -> Result<Vec<ElementId>, MeshDistribError> {
        Ok(self
            .elements_on(level)?
            .filter(|&e| {
                self.elements
                    .get(e)
                    .is_some_and(|el| el.priority() == Priority::Master)
            })
            .collect())
    }

    /// All elements, coarsest level first.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.grids
            .iter()
            .flat_map(move |g| g.elements.iter(&self.elements))
    }

    /// All nodes, coarsest level first.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.grids.iter().flat_map(move |g| g.nodes.iter(&self.nodes))
    }

    // ---------------------------------------------------------------------
    // Mutation by the distribution layer
    // ---------------------------------------------------------------------

    /// Set the destination attribute of `e`.
    pub fn set_partition(&mut self, e: ElementId, rank: Rank) -> Result<(), MeshDistribError> {
        self.element_mut(e)?.partition = rank;
        Ok(())
    }

    /// Set the destination attribute of every element to `rank`.
    pub fn reset_partitions(&mut self, rank: Rank) {
        let all: Vec<ElementId> = self.elements().collect();
        for e in all {
            if let Some(el) = self.elements.get_mut(e) {
                el.partition = rank;
            }
        }
    }

    pub(crate) fn set_flag(
        &mut self,
        e: ElementId,
        flag: ElementFlag,
        on: bool,
    ) -> Result<(), MeshDistribError> {
        self.element_mut(e)?.control.set(flag, on);
        Ok(())
    }

    pub(crate) fn set_vector_ownership(
        &mut self,
        n: NodeId,
        ownership: VectorOwnership,
    ) -> Result<(), MeshDistribError> {
        self.nodes
            .get_mut(n)
            .ok_or(MeshDistribError::InvalidNode(n))?
            .ownership = ownership;
        Ok(())
    }

    /// Check that every son of an element on `from_level` or above is
    /// destined for the same rank as its father.
    pub fn check_inherited_partitions(&self, from_level: usize) -> Result<(), MeshDistribError> {
        for e in self.elements() {
            let el = self.element(e)?;
            if el.level < from_level {
                continue;
            }
            for &son in el.sons() {
                let son_rank = self.element(son)?.partition;
                if son_rank != el.partition {
                    return Err(MeshDistribError::PartitionNotInherited {
                        son,
                        son_rank,
                        father_rank: el.partition,
                    });
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Mutation by the replication middleware
    // ---------------------------------------------------------------------

    /// Overwrite the replication priority of `e`.
    pub fn apply_priority(&mut self, e: ElementId, p: Priority) -> Result<(), MeshDistribError> {
        self.element_mut(e)?.control.set_priority(p);
        Ok(())
    }

    /// Drop a node's auxiliary data; returns whether it had any.
    pub fn drop_vector(&mut self, n: NodeId) -> Result<bool, MeshDistribError> {
        let node = self
            .nodes
            .get_mut(n)
            .ok_or(MeshDistribError::InvalidNode(n))?;
        Ok(node.vector.take().is_some())
    }

    /// Remove `e` from its level in O(1) and vacate its slot.
    ///
    /// Neighbors pointing at `e` lose that reference, `e` is removed from
    /// its father's sons, and its sons become roots.
    pub fn remove_element(&mut self, e: ElementId) -> Result<Element, MeshDistribError> {
        let level = self.element(e)?.level;
        self.grids[level].elements.unlink(&mut self.elements, e);
        let el = self
            .elements
            .remove(e)
            .ok_or(MeshDistribError::InvalidElement(e))?;
        for nb in el.neighbors() {
            if let Some(nel) = self.elements.get_mut(nb) {
                for side in nel.sides.iter_mut().filter(|s| s.neighbor == Some(e)) {
                    side.neighbor = None;
                }
            }
        }
        if let Some(f) = el.father.and_then(|f| self.elements.get_mut(f)) {
            f.sons.retain(|&s| s != e);
        }
        for &s in &el.sons {
            if let Some(son) = self.elements.get_mut(s) {
                son.father = None;
            }
        }
        Ok(el)
    }

    /// Remove `n` from its level in O(1) and vacate its slot.
    pub fn remove_node(&mut self, n: NodeId) -> Result<Node, MeshDistribError> {
        let level = self.node(n)?.level;
        self.grids[level].nodes.unlink(&mut self.nodes, n);
        self.nodes.remove(n).ok_or(MeshDistribError::InvalidNode(n))
    }
}

impl DebugInvariants for MultiGrid {
    /// Corner arity and levels, symmetric side neighbors, father one level
    /// below and listing its sons back.
    fn validate_invariants(&self) -> Result<(), MeshDistribError> {
        for e in self.elements() {
            let el = self.element(e)?;
            if el.corners.len() != el.tag.corners() {
                return Err(MeshDistribError::CornerCount {
                    tag: el.tag,
                    expected: el.tag.corners(),
                    found: el.corners.len(),
                });
            }
            for &c in &el.corners {
                let node = self.node(c)?;
                if node.level != el.level {
                    return Err(MeshDistribError::NodeLevelMismatch {
                        node: c,
                        node_level: node.level,
                        level: el.level,
                    });
                }
            }
            for nb in el.neighbors() {
                let back = self.element(nb)?.neighbors().any(|x| x == e);
                if !back {
                    return Err(MeshDistribError::AsymmetricNeighbor {
                        element: e,
                        neighbor: nb,
                    });
                }
            }
            if let Some(f) = el.father {
                let fel = self.element(f)?;
                if fel.level + 1 != el.level || !fel.sons.contains(&e) {
                    return Err(MeshDistribError::FatherLevelMismatch {
                        father: f,
                        father_level: fel.level,
                        level: el.level,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square_quads(n: usize) -> (MultiGrid, Vec<ElementId>) {
        let mut mg = MultiGrid::new(2);
        let h = 1.0 / n as f64;
        let mut nodes = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let v = mg.add_vertex([i as f64 * h, j as f64 * h, 0.0]);
                nodes.push(mg.add_node(0, v, None).unwrap());
            }
        }
        let mut elems = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let a = j * (n + 1) + i;
                let corners = [nodes[a], nodes[a + 1], nodes[a + n + 2], nodes[a + n + 1]];
                elems.push(
                    mg.add_element(0, ElementTag::Quadrilateral, &corners, None)
                        .unwrap(),
                );
            }
        }
        (mg, elems)
    }

    #[test]
    fn replicas_are_not_partitioned() {
        let (mut mg, elems) = unit_square_quads(2);
        mg.apply_priority(elems[1], Priority::Ghost).unwrap();
        mg.apply_priority(elems[2], Priority::VGhost).unwrap();
        assert_eq!(mg.masters_on(0).unwrap(), vec![elems[0], elems[3]]);
        assert!(mg.masters_on(1).is_err());
    }

    #[test]
    fn connect_sides_on_structured_grid() {
        let (mut mg, elems) = unit_square_quads(3);
        // 3x3 quads: 2*3*2 interior edges
        assert_eq!(mg.connect_sides(0).unwrap(), 12);
        let center = mg.element(elems[4]).unwrap();
        assert_eq!(center.neighbors().count(), 4);
        let corner = mg.element(elems[0]).unwrap();
        assert_eq!(corner.neighbors().count(), 2);
    }

    #[test]
    fn wrong_corner_count_is_rejected() {
        let mut mg = MultiGrid::new(2);
        let v = mg.add_vertex([0.0; 3]);
        let n = mg.add_node(0, v, None).unwrap();
        let err = mg
            .add_element(0, ElementTag::Triangle, &[n, n], None)
            .unwrap_err();
        assert!(matches!(err, MeshDistribError::CornerCount { expected: 3, found: 2, .. }));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut mg = MultiGrid::new(2);
        let v = mg.add_vertex([0.0; 3]);
        let n = mg.add_node(0, v, None).unwrap();
        let err = mg
            .add_element(0, ElementTag::Tetrahedron, &[n; 4], None)
            .unwrap_err();
        assert!(matches!(err, MeshDistribError::DimensionMismatch { .. }));
    }

    #[test]
    fn sons_register_with_father_and_inherit_partition() {
        let (mut mg, elems) = unit_square_quads(1);
        mg.set_partition(elems[0], 3).unwrap();
        let l1 = mg.add_level();
        let corners: Vec<NodeId> = (0..4)
            .map(|i| {
                let v = mg.add_vertex([i as f64, 0.5, 0.0]);
                mg.add_node(l1, v, None).unwrap()
            })
            .collect();
        let son = mg
            .add_element(l1, ElementTag::Quadrilateral, &corners, Some(elems[0]))
            .unwrap();
        assert_eq!(mg.element(elems[0]).unwrap().sons(), &[son]);
        assert_eq!(mg.element(son).unwrap().partition(), 3);
        assert!(mg.element(son).unwrap().control().has(ElementFlag::Refined));
    }

    #[test]
    fn father_on_wrong_level_is_rejected() {
        let (mut mg, elems) = unit_square_quads(1);
        let corners = mg.element(elems[0]).unwrap().corners().to_vec();
        let err = mg
            .add_element(0, ElementTag::Quadrilateral, &corners, Some(elems[0]))
            .unwrap_err();
        assert!(matches!(err, MeshDistribError::FatherLevelMismatch { .. }));
    }

    #[test]
    fn remove_element_clears_references() {
        let (mut mg, elems) = unit_square_quads(2);
        mg.connect_sides(0).unwrap();
        mg.remove_element(elems[0]).unwrap();
        assert_eq!(mg.grid(0).unwrap().element_count(), 3);
        assert!(mg.element(elems[0]).is_err());
        for &e in &elems[1..] {
            assert!(mg.element(e).unwrap().neighbors().all(|nb| nb != elems[0]));
        }
        assert_eq!(mg.elements_on(0).unwrap().count(), 3);
    }

    #[test]
    fn boundary_part_sets_flag() {
        let (mut mg, elems) = unit_square_quads(1);
        mg.set_boundary_part(elems[0], 0, 7).unwrap();
        let el = mg.element(elems[0]).unwrap();
        assert!(el.is_boundary());
        assert_eq!(el.sides()[0].boundary_part, Some(7));
        assert!(mg.set_boundary_part(elems[0], 9, 7).is_err());
    }

    #[test]
    fn invariants_catch_one_sided_neighbor() {
        let (mut mg, elems) = unit_square_quads(2);
        mg.connect_sides(0).unwrap();
        assert!(mg.validate_invariants().is_ok());
        mg.set_neighbor(elems[0], 0, Some(elems[3])).unwrap();
        assert_eq!(
            mg.validate_invariants(),
            Err(MeshDistribError::AsymmetricNeighbor {
                element: elems[0],
                neighbor: elems[3]
            })
        );
    }

    #[test]
    fn inherited_partition_check() {
        let (mut mg, elems) = unit_square_quads(1);
        let l1 = mg.add_level();
        let corners: Vec<NodeId> = (0..4)
            .map(|i| {
                let v = mg.add_vertex([i as f64, 0.5, 0.0]);
                mg.add_node(l1, v, None).unwrap()
            })
            .collect();
        let son = mg
            .add_element(l1, ElementTag::Quadrilateral, &corners, Some(elems[0]))
            .unwrap();
        assert!(mg.check_inherited_partitions(0).is_ok());
        mg.set_partition(son, 2).unwrap();
        assert!(mg.check_inherited_partitions(1).is_ok());
        assert!(matches!(
            mg.check_inherited_partitions(0),
            Err(MeshDistribError::PartitionNotInherited { son_rank: 2, father_rank: 0, .. })
        ));
    }
}
