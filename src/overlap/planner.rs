//! Master/Ghost survival and auxiliary-data ownership for one level.
//!
//! Given destination attributes, the planner issues the directives that
//! realise the new distribution with a one-layer overlap:
//!
//! 1. every node of the level starts with [`VectorOwnership::Delete`];
//! 2. every Master element gets a Master copy on its destination;
//! 3. every Master element gets a Ghost copy on each distinct remote
//!    destination of its Master side neighbors;
//! 4. an element that is not Master here afterwards stays as a local Ghost
//!    if one of its neighbors is a Master destined here, and is deleted
//!    otherwise;
//! 5. corners of elements staying Master here are flagged
//!    [`VectorOwnership::Keep`];
//! 6. auxiliary data of nodes still flagged `Delete` is scheduled for
//!    deletion, and nodes no surviving element touches are deleted.
//!
//! Only Master copies carry a destination. Ghost and VGhost replicas already
//! on this rank are owned elsewhere, so they only go through step 4.
//!
//! The planner never changes priorities itself; the middleware does that
//! when the session commits.

use std::collections::HashSet;

use crate::mesh_error::MeshDistribError;
use crate::replication::middleware::{ObjectRef, ReplicationMiddleware};
use crate::topology::context::ProcessContext;
use crate::topology::handle::{ElementId, NodeId};
use crate::topology::multigrid::{MultiGrid, Rank};
use crate::topology::priority::{ElementFlag, Priority, VectorOwnership};

/// What one planning pass scheduled.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OverlapSummary {
    /// Elements whose destination is the local rank.
    pub local_masters: usize,
    /// Elements leaving this rank but kept as local Ghost.
    pub local_ghosts: usize,
    /// Elements scheduled for local deletion.
    pub deleted: usize,
    /// Ghost copies requested on other ranks.
    pub remote_ghosts: usize,
    /// Nodes flagged to keep their auxiliary data.
    pub kept_nodes: usize,
    /// Node vectors scheduled for deletion.
    pub dropped_vectors: usize,
    /// Nodes no surviving element touches, scheduled for deletion.
    pub dropped_nodes: usize,
}

/// Plan the overlap of `level` inside an open transfer session.
pub fn plan_overlap<M: ReplicationMiddleware>(
    mg: &mut MultiGrid,
    ctx: &ProcessContext,
    mw: &mut M,
    level: usize,
) -> Result<OverlapSummary, MeshDistribError> {
    let me = ctx.rank();
    let mut summary = OverlapSummary::default();

    let nodes: Vec<NodeId> = mg.nodes_on(level)?.collect();
    for &n in &nodes {
        mg.set_vector_ownership(n, VectorOwnership::Delete)?;
    }

    let elements: Vec<ElementId> = mg.elements_on(level)?.collect();
    let master_dest = |mg: &MultiGrid, e: ElementId| -> Result<Option<Rank>, MeshDistribError> {
        let el = mg.element(e)?;
        Ok((el.priority() == Priority::Master).then_some(el.partition()))
    };

    let mut ghost_ranks: Vec<Rank> = Vec::with_capacity(8);
    let mut touched: HashSet<NodeId> = HashSet::new();
    for &e in &elements {
        let el = mg.element(e)?;
        let own_dest = master_dest(&*mg, e)?;

        ghost_ranks.clear();
        let mut local_neighbor = false;
        for nb in el.neighbors() {
            let Some(nb_dest) = master_dest(&*mg, nb)? else {
                continue;
            };
            if Some(nb_dest) == own_dest {
                continue;
            }
            if nb_dest == me {
                // the local Ghost is scheduled below, once
                local_neighbor = true;
            } else if own_dest.is_some() && !ghost_ranks.contains(&nb_dest) {
                ghost_ranks.push(nb_dest);
            }
        }
        if let Some(dest) = own_dest {
            mw.copy(ObjectRef::Element(e), dest, Priority::Master)?;
        }
        for &r in &ghost_ranks {
            mw.copy(ObjectRef::Element(e), r, Priority::Ghost)?;
        }
        summary.remote_ghosts += ghost_ranks.len();

        let corners = el.corners().to_vec();
        if own_dest == Some(me) {
            summary.local_masters += 1;
            mg.set_flag(e, ElementFlag::LocalNeighbor, false)?;
            for &c in &corners {
                mg.set_vector_ownership(c, VectorOwnership::Keep)?;
            }
            touched.extend(corners);
        } else if local_neighbor {
            mw.copy(ObjectRef::Element(e), me, Priority::Ghost)?;
            mg.set_flag(e, ElementFlag::LocalNeighbor, true)?;
            summary.local_ghosts += 1;
            touched.extend(corners);
        } else {
            mw.delete(ObjectRef::Element(e))?;
            mg.set_flag(e, ElementFlag::LocalNeighbor, false)?;
            summary.deleted += 1;
        }
    }

    for &n in &nodes {
        let node = mg.node(n)?;
        match node.ownership() {
            VectorOwnership::Keep => summary.kept_nodes += 1,
            VectorOwnership::Delete if node.vector().is_some() => {
                mw.delete(ObjectRef::Vector(n))?;
                summary.dropped_vectors += 1;
            }
            VectorOwnership::Delete => {}
        }
        if !touched.contains(&n) {
            mw.delete(ObjectRef::Node(n))?;
            summary.dropped_nodes += 1;
        }
    }

    log::debug!(
        "overlap: level {level} rank {me}: {} master, {} ghost, {} deleted, {} remote ghosts, {} nodes dropped",
        summary.local_masters,
        summary.local_ghosts,
        summary.deleted,
        summary.remote_ghosts,
        summary.dropped_nodes
    );
    Ok(summary)
}
