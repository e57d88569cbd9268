//! Process-group and thread-pool substrates.
//!
//! Every distributed routine is collective: all ranks of the group must call
//! it in the same order with consistent arguments. Within a process, work is
//! further split between the threads of the pool in [`thread_pool`].

use crate::core::traits::{Scalar, as_bytes_mut};
use crate::error::Result;

/// Message-passing process group.
pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Overwrites `buf` on every rank with the contents of `buf` on `root`.
    /// All ranks pass buffers of the same length.
    fn broadcast_bytes(&self, buf: &mut [u8], root: usize);
    /// Sum of `x` over all ranks.
    fn all_reduce(&self, x: f64) -> f64;
    /// Logical AND of `flag` over all ranks.
    fn all_reduce_and(&self, flag: bool) -> bool;
    /// Partitions the group by `color`; within a part, ranks are ordered by
    /// `key` and then by their rank in `self`.
    fn split(&self, color: usize, key: usize) -> Result<Self>
    where
        Self: Sized;
    /// Name of the host this rank runs on.
    fn host_name(&self) -> Result<String>;

    fn broadcast<T: Scalar>(&self, buf: &mut [T], root: usize) {
        self.broadcast_bytes(as_bytes_mut(buf), root);
    }

    fn broadcast_usize(&self, value: usize, root: usize) -> usize {
        let mut bytes = (value as u64).to_le_bytes();
        self.broadcast_bytes(&mut bytes, root);
        u64::from_le_bytes(bytes) as usize
    }

    /// Length-prefixed broadcast of `value` from `root`; other ranks' `value`
    /// is ignored.
    fn broadcast_string(&self, value: &str, root: usize) -> String {
        let len = self.broadcast_usize(value.len(), root);
        let mut bytes = if self.rank() == root {
            value.as_bytes().to_vec()
        } else {
            vec![0u8; len]
        };
        self.broadcast_bytes(&mut bytes, root);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

pub mod copy;
pub mod fabric;
pub mod local_comm;
pub mod shared_memory;
pub mod thread_pool;
pub mod topology;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

pub use copy::{parallel_copy, threaded_copy};
pub use fabric::HostBasedComms;
pub use local_comm::LocalComm;
pub use shared_memory::{RawMatrix, SharedMatrix, SharedMemory, ShmMode};
pub use topology::HostTopology;
