//! Generic "transfer mesh from level L".
//!
//! Inherits destinations down the refinement tree, plans the overlap of
//! every level from `L` to the top inside one transfer session and commits.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshDistribError;
use crate::overlap::planner::plan_overlap;
use crate::partitioning::inherit::inherit_level;
use crate::replication::middleware::{
    InterfaceDecl, ObjectKind, ReplicationMiddleware, TransferReport,
};
use crate::topology::context::ProcessContext;
use crate::topology::multigrid::{AuxVector, Element, MultiGrid, Node, Vertex};
use crate::topology::priority::Priority;

/// Register the distributed object kinds and the standard interfaces.
///
/// Interfaces declared:
/// - `ElementIF`: elements, Master on one side, Ghost on the other;
/// - `ElementVHIF`: elements, Master against Ghost or VGhost;
/// - `BorderNodeIF`: nodes shared by Master and Border copies;
/// - `VectorIF`: auxiliary data, Master against VGhost.
pub fn register_object_types<M: ReplicationMiddleware>(mw: &mut M) {
    mw.register_type(ObjectKind::Element, std::mem::size_of::<Element>());
    mw.register_type(ObjectKind::Node, std::mem::size_of::<Node>());
    mw.register_type(ObjectKind::Vertex, std::mem::size_of::<Vertex>());
    mw.register_type(ObjectKind::Vector, std::mem::size_of::<AuxVector>());

    let decls = [
        ("ElementIF", vec![ObjectKind::Element], vec![Priority::Master], vec![Priority::Ghost]),
        (
            "ElementVHIF",
            vec![ObjectKind::Element],
            vec![Priority::Master],
            vec![Priority::Ghost, Priority::VGhost],
        ),
        (
            "BorderNodeIF",
            vec![ObjectKind::Node],
            vec![Priority::Master, Priority::Border],
            vec![Priority::Master, Priority::Border],
        ),
        ("VectorIF", vec![ObjectKind::Vector], vec![Priority::Master], vec![Priority::VGhost]),
    ];
    for (name, kinds, side_a, side_b) in decls {
        mw.declare_interface(InterfaceDecl {
            name: name.to_string(),
            kinds,
            side_a,
            side_b,
        });
    }
}

/// Redistribute levels `level..=top` according to the destination
/// attributes of `level`.
///
/// Collective: every process must call this with the same `level`.
pub fn transfer_from_level<M: ReplicationMiddleware>(
    mg: &mut MultiGrid,
    ctx: &ProcessContext,
    mw: &mut M,
    level: usize,
) -> Result<TransferReport, MeshDistribError> {
    let top = mg.top_level();
    if level > top {
        return Err(MeshDistribError::LevelOutOfRange { level, top });
    }
    mg.debug_assert_invariants();
    let inherited = inherit_level(mg, level)?;
    log::trace!("xfer: {inherited} descendants inherit from level {level}");
    crate::debug_invariants!(
        mg.check_inherited_partitions(level),
        "destinations after inheritance"
    );

    mw.begin_session()?;
    for l in level..=top {
        if let Err(e) = plan_overlap(mg, ctx, mw, l) {
            // close the session so the middleware stays usable
            let _ = mw.end_session(mg);
            return Err(e);
        }
    }
    mw.end_session(mg)
}
