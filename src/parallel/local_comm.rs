//! In-process process group.
//!
//! Ranks are OS threads sharing one `LocalGroup`. Collectives are built on an
//! exchange board guarded by a mutex and a barrier: every rank posts its
//! contribution, waits, reads what it needs, and waits again before the board
//! is reused. Each rank can claim an arbitrary host name, which lets a single
//! process stand in for a multi-host job.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

use crate::error::Result;

struct LocalGroup {
    size: usize,
    barrier: Barrier,
    board: Mutex<Vec<Vec<u8>>>,
    // Sub-groups under construction, keyed by (split sequence, color).
    pending: Mutex<HashMap<(u64, usize), Arc<LocalGroup>>>,
}

impl LocalGroup {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            barrier: Barrier::new(size),
            board: Mutex::new(vec![Vec::new(); size]),
            pending: Mutex::new(HashMap::new()),
        })
    }
}

/// Process group whose ranks are threads of the current process.
pub struct LocalComm {
    group: Arc<LocalGroup>,
    rank: usize,
    host: String,
    splits: Cell<u64>,
}

impl LocalComm {
    /// Single-rank group on host `localhost`.
    pub fn solo() -> Self {
        Self::member(LocalGroup::new(1), 0, "localhost".to_string())
    }

    /// Runs `f` on `hosts.len()` ranks, rank `r` claiming host `hosts[r]`,
    /// and returns the results in rank order. A panic on any rank is resumed
    /// on the caller once all ranks have finished.
    pub fn run<R, F>(hosts: &[&str], f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(LocalComm) -> R + Sync,
    {
        assert!(!hosts.is_empty(), "A process group needs at least one rank");
        let group = LocalGroup::new(hosts.len());
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = hosts
                .iter()
                .enumerate()
                .map(|(rank, host)| {
                    let comm = Self::member(Arc::clone(&group), rank, host.to_string());
                    scope.spawn(move || f(comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
                .collect()
        })
    }

    fn member(group: Arc<LocalGroup>, rank: usize, host: String) -> Self {
        Self {
            group,
            rank,
            host,
            splits: Cell::new(0),
        }
    }

    /// Posts `bytes`, then returns every rank's post in rank order.
    fn all_gather(&self, bytes: Vec<u8>) -> Vec<Vec<u8>> {
        self.group.board.lock().unwrap_or_else(PoisonError::into_inner)[self.rank] = bytes;
        self.group.barrier.wait();
        let posts = self
            .group
            .board
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.group.barrier.wait();
        posts
    }
}

impl super::Comm for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }

    fn broadcast_bytes(&self, buf: &mut [u8], root: usize) {
        assert!(root < self.group.size, "Broadcast root {root} out of range");
        if self.rank == root {
            self.group.board.lock().unwrap_or_else(PoisonError::into_inner)[root] = buf.to_vec();
        }
        self.group.barrier.wait();
        if self.rank != root {
            let board = self.group.board.lock().unwrap_or_else(PoisonError::into_inner);
            assert_eq!(board[root].len(), buf.len(), "Broadcast buffer lengths differ");
            buf.copy_from_slice(&board[root]);
        }
        self.group.barrier.wait();
    }

    fn all_reduce(&self, x: f64) -> f64 {
        self.all_gather(x.to_le_bytes().to_vec())
            .iter()
            .map(|b| f64::from_le_bytes(b[..8].try_into().unwrap_or([0; 8])))
            .sum()
    }

    fn all_reduce_and(&self, flag: bool) -> bool {
        self.all_gather(vec![u8::from(flag)])
            .iter()
            .all(|b| b[0] != 0)
    }

    fn split(&self, color: usize, key: usize) -> Result<Self> {
        let seq = self.splits.get();
        self.splits.set(seq + 1);

        let mut post = Vec::with_capacity(16);
        post.extend_from_slice(&(color as u64).to_le_bytes());
        post.extend_from_slice(&(key as u64).to_le_bytes());
        let decode = |b: &[u8], at: usize| {
            u64::from_le_bytes(b[at..at + 8].try_into().unwrap_or([0; 8])) as usize
        };
        let mut members: Vec<(usize, usize)> = self
            .all_gather(post)
            .iter()
            .enumerate()
            .filter(|(_, b)| decode(b, 0) == color)
            .map(|(rank, b)| (decode(b, 8), rank))
            .collect();
        members.sort_unstable();
        // The gather includes this rank's own post, so it is always a member.
        let position = members.iter().position(|&(_, rank)| rank == self.rank);
        debug_assert!(
            position.is_some(),
            "rank {} is missing from its own split group",
            self.rank
        );
        let new_rank = position.unwrap_or_default();

        if new_rank == 0 {
            self.group
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((seq, color), LocalGroup::new(members.len()));
        }
        self.group.barrier.wait();
        let group = self
            .group
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(seq, color))
            .cloned();
        self.group.barrier.wait();
        if new_rank == 0 {
            self.group
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&(seq, color));
        }
        let group = group.ok_or_else(|| {
            crate::error::HlError::Topology(format!("sub-group for color {color} was not published"))
        })?;
        Ok(Self::member(group, new_rank, self.host.clone()))
    }

    fn host_name(&self) -> Result<String> {
        Ok(self.host.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::Comm;

    #[test]
    fn solo_group() {
        let comm = LocalComm::solo();
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        assert_eq!(comm.all_reduce(2.5), 2.5);
        assert_eq!(comm.host_name().unwrap(), "localhost");
    }

    #[test]
    fn collectives_agree() {
        let out = LocalComm::run(&["a", "a", "b"], |comm| {
            let mut buf = [comm.rank() as u8; 4];
            comm.broadcast_bytes(&mut buf, 2);
            let sum = comm.all_reduce(comm.rank() as f64);
            let all = comm.all_reduce_and(comm.rank() != 1);
            let name = comm.broadcast_string(if comm.rank() == 1 { "rank one" } else { "" }, 1);
            (buf, sum, all, name)
        });
        for (buf, sum, all, name) in out {
            assert_eq!(buf, [2; 4]);
            assert_eq!(sum, 3.0);
            assert!(!all);
            assert_eq!(name, "rank one");
        }
    }

    #[test]
    fn split_orders_by_key_then_rank() {
        let out = LocalComm::run(&["h"; 4], |comm| {
            let color = comm.rank() % 2;
            let key = 3 - comm.rank();
            let sub = comm.split(color, key).unwrap();
            let total = sub.all_reduce(comm.rank() as f64);
            (sub.rank(), sub.size(), total)
        });
        assert_eq!(out[0], (1, 2, 2.0));
        assert_eq!(out[2], (0, 2, 2.0));
        assert_eq!(out[1], (1, 2, 4.0));
        assert_eq!(out[3], (0, 2, 4.0));
    }

    #[test]
    fn split_with_equal_keys_keeps_parent_order() {
        let out = LocalComm::run(&["h"; 5], |comm| {
            let sub = comm.split(comm.rank() % 2, 0).unwrap();
            let nested = sub.split(0, 0).unwrap();
            (sub.rank(), sub.size(), nested.rank(), nested.size())
        });
        let expected = [(0, 3), (0, 2), (1, 3), (1, 2), (2, 3)];
        for (rank, &(sub_rank, sub_size, nested_rank, nested_size)) in out.iter().enumerate() {
            assert_eq!((sub_rank, sub_size), expected[rank]);
            assert_eq!((nested_rank, nested_size), (sub_rank, sub_size));
        }
    }
}
