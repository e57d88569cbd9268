//! Host-based split of a process group.
//!
//! The *intrahost* group holds the ranks sharing this process's host, in
//! parent rank order. The *interhost* group holds one rank per host: the
//! ranks with the same intrahost rank, ordered by host. Kernels cooperate
//! through shared memory inside a host and reconcile hosts over the interhost
//! group, which assumes every host runs the same number of processes.

use tracing::debug;

use super::{Comm, HostTopology};
use crate::error::{HlError, Result};

pub struct HostBasedComms<C> {
    topology: HostTopology,
    intrahost: C,
    intrahost_color: usize,
    interhost: C,
    interhost_color: usize,
}

impl<C: Comm> HostBasedComms<C> {
    /// Collective over `comm`.
    pub fn new(comm: &C) -> Result<Self> {
        let topology = HostTopology::discover(comm)?;
        let host = topology.host_name(comm.rank());
        let intrahost_color = topology
            .host_index(host)
            .ok_or_else(|| HlError::Topology(format!("host `{host}` missing from topology")))?;
        let intrahost = comm.split(intrahost_color, 0)?;
        let interhost_color = intrahost.rank();
        let interhost = comm.split(interhost_color, intrahost_color)?;
        debug!(
            rank = comm.rank(),
            intrahost_color,
            interhost_color,
            intrahost_size = intrahost.size(),
            interhost_size = interhost.size(),
            "split process group by host"
        );
        Ok(Self {
            topology,
            intrahost,
            intrahost_color,
            interhost,
            interhost_color,
        })
    }

    pub fn topology(&self) -> &HostTopology {
        &self.topology
    }

    pub fn intrahost(&self) -> &C {
        &self.intrahost
    }

    /// Index of this process's host.
    pub fn intrahost_color(&self) -> usize {
        self.intrahost_color
    }

    pub fn interhost(&self) -> &C {
        &self.interhost
    }

    /// Rank of this process within its host.
    pub fn interhost_color(&self) -> usize {
        self.interhost_color
    }

    pub fn num_hosts(&self) -> usize {
        self.topology.num_hosts()
    }
}
