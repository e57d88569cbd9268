//! Byte copy split between processes and threads.

use std::ops::Range;

use super::Comm;
use super::thread_pool;
use crate::utils::partition::group_range;

#[derive(Clone, Copy)]
struct Dest(*mut u8);

// SAFETY: threads write disjoint byte ranges through it.
unsafe impl Send for Dest {}
unsafe impl Sync for Dest {}

impl Dest {
    fn at(&self, offset: usize) -> *mut u8 {
        // SAFETY: offsets stay within the destination buffer.
        unsafe { self.0.add(offset) }
    }
}

fn copy_range_threaded(src: &[u8], dst: Dest, range: Range<usize>) {
    thread_pool::parallel_ranges(range, |_, r| {
        // SAFETY: each thread owns `r`, a sub-range of the process's range.
        unsafe { std::ptr::copy_nonoverlapping(src[r.clone()].as_ptr(), dst.at(r.start), r.len()) }
    });
}

/// Copies `src` into `dst` split by rank of `comm`, then by thread, and ends
/// with a barrier on `comm`. Without a group the copy is thread-parallel only.
///
/// With a group, `src` must hold the same bytes on every rank and `dst` must
/// be the base of a segment shared by all of them.
///
/// # Safety
/// `dst` is valid for `src.len()` bytes of writes, does not overlap `src`, and
/// is not accessed by anyone else until the call returns.
pub unsafe fn parallel_copy<C: Comm>(comm: Option<&C>, src: &[u8], dst: *mut u8) {
    if src.is_empty() {
        return;
    }
    let dst = Dest(dst);
    match comm {
        Some(comm) => {
            let mine = group_range(0, src.len(), comm.size(), comm.rank());
            copy_range_threaded(src, dst, mine);
            comm.barrier();
        }
        None => copy_range_threaded(src, dst, 0..src.len()),
    }
}

/// Thread-parallel copy between two local buffers.
pub fn threaded_copy(src: &[u8], dst: &mut [u8]) {
    assert_eq!(src.len(), dst.len(), "Copy buffers differ in length");
    copy_range_threaded(src, Dest(dst.as_mut_ptr()), 0..src.len());
}
