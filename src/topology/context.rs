//! Process identity for one SPMD run.

use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshDistribError;
use crate::topology::multigrid::Rank;

/// Rank, process count and coordinator rank; fixed for the lifetime of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProcessContext {
    rank: Rank,
    size: usize,
    coordinator: Rank,
}

impl ProcessContext {
    /// Build a context, validating both ranks against `size`.
    pub fn new(rank: Rank, size: usize, coordinator: Rank) -> Result<Self, MeshDistribError> {
        for r in [rank, coordinator] {
            if r >= size {
                return Err(MeshDistribError::RankOutOfRange { rank: r, size });
            }
        }
        Ok(Self {
            rank,
            size,
            coordinator,
        })
    }

    /// Context of the calling process in `comm`.
    pub fn from_comm<C: Communicator>(comm: &C, coordinator: Rank) -> Result<Self, MeshDistribError> {
        Self::new(comm.rank(), comm.size(), coordinator)
    }

    /// Single-process context.
    pub fn serial() -> Self {
        Self {
            rank: 0,
            size: 1,
            coordinator: 0,
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn coordinator(&self) -> Rank {
        self.coordinator
    }

    /// Whether this process is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.rank == self.coordinator
    }
}
