//! Blocking collectives built on point-to-point messages.
//!
//! Every rank posts all of its sends before it waits on any receive, so
//! the collectives work with the mailbox backend and with eager MPI
//! delivery alike. All multi-byte values travel little-endian.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::mesh_error::MeshDistribError;
use bytemuck::{Pod, Zeroable};

/// A `u64` carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireU64 {
    pub v_le: u64,
}

impl WireU64 {
    pub fn new(v: u64) -> Self {
        Self { v_le: v.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.v_le)
    }
}

fn recv_u64<C: Communicator>(comm: &C, peer: usize, tag: CommTag) -> Result<u64, MeshDistribError> {
    let mut w = WireU64::new(0);
    let h = comm.irecv(
        peer,
        tag.as_u16(),
        bytemuck::cast_slice_mut(std::slice::from_mut(&mut w)),
    );
    match h.wait() {
        Some(data) if data.len() == std::mem::size_of::<WireU64>() => {
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut w)).copy_from_slice(&data);
            Ok(w.get())
        }
        Some(data) => Err(MeshDistribError::CommError {
            neighbor: peer,
            reason: format!(
                "expected {} bytes, got {}",
                std::mem::size_of::<WireU64>(),
                data.len()
            ),
        }),
        None => Err(MeshDistribError::CommError {
            neighbor: peer,
            reason: "no data received".into(),
        }),
    }
}

/// Global maximum of `value` over all ranks (all-to-all exchange).
pub fn global_max_u64<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: u64,
) -> Result<u64, MeshDistribError> {
    let (me, size) = (comm.rank(), comm.size());
    if size <= 1 {
        return Ok(value);
    }
    let w = WireU64::new(value);
    let mut sends = Vec::with_capacity(size - 1);
    for peer in (0..size).filter(|&p| p != me) {
        sends.push(comm.isend(peer, tag.as_u16(), bytemuck::bytes_of(&w)));
    }
    let mut max = value;
    let mut first_err = None;
    for peer in (0..size).filter(|&p| p != me) {
        match recv_u64(comm, peer, tag) {
            Ok(v) => max = max.max(v),
            Err(e) if first_err.is_none() => first_err = Some(e),
            Err(_) => {}
        }
    }
    for s in sends {
        let _ = s.wait();
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(max),
    }
}

/// Gather one flag per rank on `root`.
///
/// Returns `Some(flags)` indexed by rank on `root`, `None` elsewhere.
pub fn gather_flags<C: Communicator>(
    comm: &C,
    tag: CommTag,
    root: usize,
    flag: bool,
) -> Result<Option<Vec<bool>>, MeshDistribError> {
    let (me, size) = (comm.rank(), comm.size());
    if me != root {
        comm.isend(root, tag.as_u16(), bytemuck::bytes_of(&WireU64::new(flag as u64)))
            .wait();
        return Ok(None);
    }
    let mut flags = vec![false; size];
    flags[me] = flag;
    for peer in (0..size).filter(|&p| p != me) {
        flags[peer] = recv_u64(comm, peer, tag)? != 0;
    }
    Ok(Some(flags))
}
