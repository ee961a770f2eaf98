//! In-process realisation of the replication middleware for one rank.
//!
//! `LocalMiddleware` records every directive of a session and, at commit,
//! applies the part that concerns the local rank: copies addressed to
//! this rank set the local priority (the strongest one wins, and a local
//! copy overrides a delete), deletes without a local copy remove the
//! object. Copies addressed to other ranks are only counted. It serves
//! serial runs and lets tests inspect exactly what was scheduled.

use crate::mesh_error::MeshDistribError;
use crate::replication::middleware::{
    Directive, GlobalId, InterfaceDecl, InterfaceId, ObjectKind, ObjectRef, ReplicationMiddleware,
    TransferReport,
};
use crate::topology::multigrid::{MultiGrid, Rank};
use crate::topology::priority::Priority;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use std::time::Instant;

/// Single-rank middleware that records directives.
#[derive(Debug)]
pub struct LocalMiddleware {
    rank: Rank,
    types: Vec<(ObjectKind, usize)>,
    interfaces: Vec<InterfaceDecl>,
    session: Option<(Instant, Vec<Directive>)>,
    last_plan: Vec<Directive>,
    committed: usize,
    stats: bool,
    // priorities of non-element objects; elements keep theirs in the multigrid
    priorities: HashMap<ObjectRef, Priority>,
    remote_holders: HashMap<ObjectRef, Vec<Rank>>,
}

impl LocalMiddleware {
    pub fn new(rank: Rank) -> Self {
        Self {
            rank,
            types: Vec::new(),
            interfaces: Vec::new(),
            session: None,
            last_plan: Vec::new(),
            committed: 0,
            stats: false,
            priorities: HashMap::new(),
            remote_holders: HashMap::new(),
        }
    }

    /// Directives of the open session, `None` outside a session.
    pub fn pending(&self) -> Option<&[Directive]> {
        self.session.as_ref().map(|(_, d)| d.as_slice())
    }

    /// Directives of the most recently committed session.
    pub fn last_plan(&self) -> &[Directive] {
        &self.last_plan
    }

    /// Number of committed sessions.
    pub fn committed_sessions(&self) -> usize {
        self.committed
    }

    /// Registered object kinds with their sizes.
    pub fn registered_types(&self) -> &[(ObjectKind, usize)] {
        &self.types
    }

    pub fn transfer_stats_enabled(&self) -> bool {
        self.stats
    }

    fn push(&mut self, d: Directive) -> Result<(), MeshDistribError> {
        match self.session.as_mut() {
            Some((_, plan)) => {
                plan.push(d);
                Ok(())
            }
            None => Err(MeshDistribError::SessionState(
                "directive issued outside a transfer session",
            )),
        }
    }

    fn exists(mg: &MultiGrid, object: ObjectRef) -> bool {
        match object {
            ObjectRef::Element(e) => mg.element(e).is_ok(),
            ObjectRef::Node(n) => mg.node(n).is_ok(),
            ObjectRef::Vertex(v) => mg.vertex(v).is_ok(),
            ObjectRef::Vector(n) => mg.node(n).is_ok_and(|n| n.vector().is_some()),
        }
    }
}

impl ReplicationMiddleware for LocalMiddleware {
    fn register_type(&mut self, kind: ObjectKind, size: usize) {
        match self.types.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = size,
            None => self.types.push((kind, size)),
        }
    }

    fn declare_interface(&mut self, decl: InterfaceDecl) -> InterfaceId {
        self.interfaces.push(decl);
        self.interfaces.len() - 1
    }

    fn begin_session(&mut self) -> Result<(), MeshDistribError> {
        if self.session.is_some() {
            return Err(MeshDistribError::SessionState("transfer session already open"));
        }
        self.session = Some((Instant::now(), Vec::new()));
        Ok(())
    }

    fn copy_sized(
        &mut self,
        object: ObjectRef,
        dest: Rank,
        priority: Priority,
        size: Option<usize>,
    ) -> Result<(), MeshDistribError> {
        self.push(Directive::Copy {
            object,
            dest,
            priority,
            size,
        })
    }

    fn delete(&mut self, object: ObjectRef) -> Result<(), MeshDistribError> {
        self.push(Directive::Delete { object })
    }

    fn end_session(&mut self, mg: &mut MultiGrid) -> Result<TransferReport, MeshDistribError> {
        let (started, plan) = self.session.take().ok_or(MeshDistribError::SessionState(
            "commit without an open transfer session",
        ))?;
        let mut report = TransferReport::default();
        let mut local: HashMap<ObjectRef, Priority> = HashMap::new();
        let mut deleted: HashSet<ObjectRef> = HashSet::new();
        let mut remote: HashMap<ObjectRef, Vec<Rank>> = HashMap::new();

        for d in &plan {
            match *d {
                Directive::Copy {
                    object,
                    dest,
                    priority,
                    ..
                } => {
                    report.count_copy(priority);
                    if dest == self.rank {
                        let p = local.entry(object).or_insert(priority);
                        *p = (*p).max(priority);
                    } else {
                        report.sent_off_rank += 1;
                        remote.entry(object).or_default().push(dest);
                    }
                }
                Directive::Delete { object } => {
                    report.deletes += 1;
                    deleted.insert(object);
                }
            }
        }

        for (&object, &p) in local.iter().sorted_by_key(|(o, _)| **o) {
            if !Self::exists(mg, object) {
                continue;
            }
            match object {
                ObjectRef::Element(e) => {
                    if mg.element(e)?.priority() != p {
                        mg.apply_priority(e, p)?;
                        report.applied_locally += 1;
                    }
                }
                other => {
                    self.priorities.insert(other, p);
                }
            }
        }

        for object in deleted.into_iter().sorted() {
            if local.contains_key(&object) || !Self::exists(mg, object) {
                continue;
            }
            match object {
                ObjectRef::Element(e) => {
                    mg.remove_element(e)?;
                }
                ObjectRef::Node(n) => {
                    mg.remove_node(n)?;
                }
                ObjectRef::Vector(n) => {
                    mg.drop_vector(n)?;
                }
                ObjectRef::Vertex(_) => {}
            }
            self.priorities.remove(&object);
            report.applied_locally += 1;
        }

        for ranks in remote.values_mut() {
            ranks.sort_unstable();
            ranks.dedup();
        }
        self.remote_holders = remote;
        report.elapsed = started.elapsed();
        self.committed += 1;
        self.last_plan = plan;

        log::debug!(
            "xfer: rank {} committed {} copies, {} deletes",
            self.rank,
            report.total_copies(),
            report.deletes
        );
        if self.stats {
            log::info!(
                "xfer: rank {} master={} border={} ghost={} vghost={} delete={} off-rank={} applied={} in {:?}",
                self.rank,
                report.master_copies,
                report.border_copies,
                report.ghost_copies,
                report.vghost_copies,
                report.deletes,
                report.sent_off_rank,
                report.applied_locally,
                report.elapsed
            );
        }
        Ok(report)
    }

    fn priority(&self, mg: &MultiGrid, object: ObjectRef) -> Option<Priority> {
        if !Self::exists(mg, object) {
            return None;
        }
        match object {
            ObjectRef::Element(e) => mg.element(e).ok().map(|el| el.priority()),
            other => Some(
                self.priorities
                    .get(&other)
                    .copied()
                    .unwrap_or(Priority::Master),
            ),
        }
    }

    fn global_id(&self, object: ObjectRef) -> GlobalId {
        object.global_id(self.rank)
    }

    fn holders(&self, mg: &MultiGrid, object: ObjectRef) -> Vec<Rank> {
        let mut ranks = self.remote_holders.get(&object).cloned().unwrap_or_default();
        if Self::exists(mg, object) {
            ranks.push(self.rank);
        }
        ranks.sort_unstable();
        ranks.dedup();
        ranks
    }

    fn consistency_check(&self, mg: &MultiGrid) -> usize {
        let mut errors = 0;
        if self.session.is_some() {
            log::warn!("check: rank {} has an uncommitted transfer session", self.rank);
            errors += 1;
        }
        for e in mg.elements() {
            let Ok(el) = mg.element(e) else { continue };
            if el.priority() == Priority::Ghost {
                let anchored = el
                    .neighbors()
                    .filter_map(|nb| mg.element(nb).ok())
                    .any(|nb| nb.priority().is_owner());
                if !anchored {
                    log::warn!("check: ghost {e} has no owning neighbor on rank {}", self.rank);
                    errors += 1;
                }
            }
            if let Some(f) = el.father().and_then(|f| mg.element(f).ok()) {
                if f.level() + 1 != el.level() {
                    log::warn!("check: {e} on level {} has father on level {}", el.level(), f.level());
                    errors += 1;
                }
            }
        }
        let mut kept: HashSet<_> = HashSet::new();
        let mut cornered: HashSet<_> = HashSet::new();
        for e in mg.elements() {
            if let Ok(el) = mg.element(e) {
                if el.priority().is_owner() {
                    kept.extend(el.corners().iter().copied());
                }
                cornered.extend(el.corners().iter().copied());
            }
        }
        for n in mg.nodes() {
            if !cornered.contains(&n) {
                log::warn!("check: {n} is not a corner of any element on rank {}", self.rank);
                errors += 1;
            }
            if mg.node(n).is_ok_and(|node| node.vector().is_some()) && !kept.contains(&n) {
                log::warn!("check: {n} keeps auxiliary data without an owned element");
                errors += 1;
            }
        }
        errors
    }

    fn set_transfer_stats(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.stats, on)
    }

    fn status(&self) -> String {
        format!(
            "local middleware on rank {}: {} types, {} interfaces, {} sessions committed, session {}",
            self.rank,
            self.types.len(),
            self.interfaces.len(),
            self.committed,
            if self.session.is_some() { "open" } else { "closed" }
        )
    }

    fn interfaces(&self) -> &[InterfaceDecl] {
        &self.interfaces
    }
}
