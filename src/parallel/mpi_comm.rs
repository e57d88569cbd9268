//! MPI-based process group.
//!
//! Wraps an rsmpi communicator behind the [`Comm`](super::Comm) trait. Only
//! available with the `mpi` feature.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")] {
//! use hylinal::parallel::{Comm, MpiComm, mpi_comm};
//! let universe = mpi_comm::initialize().unwrap();
//! let comm = MpiComm::world(&universe);
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::*;
use mpi::Threading;

use crate::error::{HlError, Result};

/// Initializes MPI with funneled thread support: worker threads compute,
/// the main thread communicates.
pub fn initialize() -> Result<Universe> {
    let (universe, threading) = mpi::initialize_with_threading(Threading::Funneled)
        .ok_or_else(|| HlError::Topology("MPI is already initialized".into()))?;
    if matches!(threading, Threading::Single) {
        return Err(HlError::Topology(
            "MPI library does not provide funneled thread support".into(),
        ));
    }
    Ok(universe)
}

pub struct MpiComm {
    comm: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiComm {
    pub fn world(universe: &Universe) -> Self {
        Self::from_communicator(universe.world())
    }

    pub fn from_communicator(comm: SimpleCommunicator) -> Self {
        let rank = comm.rank() as usize;
        let size = comm.size() as usize;
        MpiComm { comm, rank, size }
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.comm.barrier();
    }

    fn broadcast_bytes(&self, buf: &mut [u8], root: usize) {
        self.comm.process_at_rank(root as i32).broadcast_into(buf);
    }

    fn all_reduce(&self, x: f64) -> f64 {
        let mut y = x;
        self.comm.all_reduce_into(&x, &mut y, &SystemOperation::sum());
        y
    }

    fn all_reduce_and(&self, flag: bool) -> bool {
        let x = i32::from(flag);
        let mut y = x;
        self.comm.all_reduce_into(&x, &mut y, &SystemOperation::min());
        y != 0
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        let sub = self
            .comm
            .split_by_color_with_key(Color::with_value(color as i32), key as i32)
            .ok_or_else(|| HlError::Topology(format!("split by color {color} returned no group")))?;
        Ok(Self::from_communicator(sub))
    }

    fn host_name(&self) -> Result<String> {
        mpi::environment::processor_name()
            .map_err(|err| HlError::Topology(format!("processor name is not UTF-8: {err}")))
    }
}
