//! Which host each rank of a process group runs on.

use std::collections::BTreeSet;

use tracing::debug;

use super::Comm;
use crate::error::Result;

/// Host name of every rank, indexed by rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostTopology {
    host_names: Vec<String>,
}

impl HostTopology {
    /// Collective: every rank broadcasts its host name in turn.
    pub fn discover<C: Comm>(comm: &C) -> Result<Self> {
        let mine = comm.host_name()?;
        let host_names: Vec<String> = (0..comm.size())
            .map(|root| comm.broadcast_string(&mine, root))
            .collect();
        let topology = Self { host_names };
        debug!(
            rank = comm.rank(),
            ranks = comm.size(),
            hosts = topology.num_hosts(),
            "discovered host topology"
        );
        Ok(topology)
    }

    pub fn from_host_names(host_names: Vec<String>) -> Self {
        Self { host_names }
    }

    pub fn num_ranks(&self) -> usize {
        self.host_names.len()
    }

    pub fn host_name(&self, rank: usize) -> &str {
        &self.host_names[rank]
    }

    /// Distinct host names, sorted.
    pub fn host_names(&self) -> BTreeSet<&str> {
        self.host_names.iter().map(String::as_str).collect()
    }

    pub fn ranks_at(&self, host: &str) -> BTreeSet<usize> {
        self.host_names
            .iter()
            .enumerate()
            .filter(|(_, h)| *h == host)
            .map(|(rank, _)| rank)
            .collect()
    }

    pub fn num_hosts(&self) -> usize {
        self.host_names().len()
    }

    /// Position of `host` among the sorted distinct host names.
    pub fn host_index(&self, host: &str) -> Option<usize> {
        self.host_names().iter().position(|h| *h == host)
    }

    /// True when every host runs the same number of ranks.
    pub fn is_uniform(&self) -> bool {
        let names = self.host_names();
        let mut counts = names.iter().map(|h| self.ranks_at(h).len());
        match counts.next() {
            Some(first) => counts.all(|c| c == first),
            None => true,
        }
    }
}
