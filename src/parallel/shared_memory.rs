//! Named shared-memory segments, one per host.
//!
//! A segment is a file under `/dev/shm` (the temp directory where that does
//! not exist) mapped read-write by every rank of a host. Intrahost rank 0
//! creates and sizes the file, announces the outcome to its peers, and every
//! rank maps it; construction completes only once all ranks of the host have
//! mapped. Rank 0 unlinks the file on drop. Mappings outlive the unlink, so
//! drop needs no barrier.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use faer::{Mat, MatRef};
use memmap2::{MmapOptions, MmapRaw};
use tracing::debug;

use super::{Comm, HostBasedComms};
use crate::core::traits::Scalar;
use crate::error::{HlError, Result};

static SEGMENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// How intrahost rank 0 obtains the named segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShmMode {
    /// Reuse a segment of the same name if one exists.
    OpenOrCreate,
    /// Fail if a segment of the same name exists.
    CreateOnly,
}

/// Segment names become file names, so only ASCII alphanumerics, `-` and
/// `_` are accepted.
fn check_segment_name(what: &str, name: &str) -> Result<()> {
    let valid = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if name.is_empty() || !name.chars().all(valid) {
        return Err(HlError::Domain(format!(
            "invalid shared memory {what} {name:?}: expected ASCII letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

fn segment_path(name: &str) -> PathBuf {
    let shm = PathBuf::from("/dev/shm");
    if shm.is_dir() {
        shm.join(name)
    } else {
        std::env::temp_dir().join(name)
    }
}

fn create_segment(path: &Path, size: usize, mode: ShmMode) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true);
    match mode {
        ShmMode::OpenOrCreate => opts.create(true),
        ShmMode::CreateOnly => opts.create_new(true),
    };
    let file = opts.open(path)?;
    file.set_len(size as u64)
}

fn map_segment(path: &Path, size: usize) -> io::Result<MmapRaw> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    check_len(&file, size)?;
    MmapOptions::new().len(size).map_raw(&file)
}

fn check_len(file: &File, size: usize) -> io::Result<()> {
    let len = file.metadata()?.len();
    if len < size as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("segment holds {len} bytes, {size} requested"),
        ));
    }
    Ok(())
}

/// Byte buffer shared by the ranks of one host.
///
/// There is no bounds checking on access through [`SharedMemory::as_ptr`];
/// callers partition the buffer between writers and separate phases with
/// intrahost barriers.
pub struct SharedMemory<C: Comm> {
    comms: HostBasedComms<C>,
    name: String,
    path: PathBuf,
    size: usize,
    map: Option<MmapRaw>,
}

impl<C: Comm> SharedMemory<C> {
    /// Collective over `comm`.
    pub fn new(comm: &C, name: &str, size: usize, mode: ShmMode) -> Result<Self> {
        Self::with_comms(HostBasedComms::new(comm)?, name, size, mode)
    }

    /// Segment for one use site, under a name unique to this host and call.
    /// Collective over `comm`.
    pub fn scoped(comm: &C, site: &str, size: usize) -> Result<Self> {
        Self::scoped_with_comms(HostBasedComms::new(comm)?, site, size)
    }

    /// As [`SharedMemory::scoped`], reusing an existing host split.
    pub fn scoped_with_comms(comms: HostBasedComms<C>, site: &str, size: usize) -> Result<Self> {
        check_segment_name("site", site)?;
        let intra = comms.intrahost();
        let proposal = if intra.rank() == 0 {
            format!(
                "hylinal-{site}-{}-{}",
                std::process::id(),
                SEGMENT_SEQ.fetch_add(1, Ordering::Relaxed)
            )
        } else {
            String::new()
        };
        let name = intra.broadcast_string(&proposal, 0);
        Self::with_comms(comms, &name, size, ShmMode::CreateOnly)
    }

    /// Collective over the intrahost group of `comms`.
    pub fn with_comms(comms: HostBasedComms<C>, name: &str, size: usize, mode: ShmMode) -> Result<Self> {
        check_segment_name("name", name)?;
        let path = segment_path(name);
        let intra = comms.intrahost();
        let shm_err = |source| HlError::SharedMemory {
            name: name.to_string(),
            source,
        };

        let mut created = [1u8];
        let mut create_err = None;
        if intra.rank() == 0 {
            if let Err(err) = create_segment(&path, size, mode) {
                created[0] = 0;
                create_err = Some(err);
            } else {
                debug!(name, size, ?mode, "created shared memory segment");
            }
        }
        intra.broadcast_bytes(&mut created, 0);
        if created[0] == 0 {
            return Err(shm_err(create_err.unwrap_or_else(|| {
                io::Error::other("segment creation failed on the host's first rank")
            })));
        }

        let mapped = if size == 0 {
            Ok(None)
        } else {
            map_segment(&path, size).map(Some)
        };
        if !intra.all_reduce_and(mapped.is_ok()) {
            if intra.rank() == 0 {
                let _ = fs::remove_file(&path);
            }
            return Err(shm_err(mapped.err().unwrap_or_else(|| {
                io::Error::other("segment mapping failed on another rank of this host")
            })));
        }
        let map = mapped.map_err(shm_err)?;
        Ok(Self {
            comms,
            name: name.to_string(),
            path,
            size,
            map,
        })
    }

    /// Base address of the mapping; dangling for an empty segment.
    pub fn as_ptr(&self) -> *mut u8 {
        match &self.map {
            Some(map) => map.as_mut_ptr(),
            None => std::ptr::NonNull::dangling().as_ptr(),
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comms(&self) -> &HostBasedComms<C> {
        &self.comms
    }
}

impl<C: Comm> Drop for SharedMemory<C> {
    fn drop(&mut self) {
        if self.comms.intrahost().rank() != 0 {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(name = %self.name, "removed shared memory segment"),
            Err(err) => debug!(name = %self.name, error = %err, "could not remove shared memory segment"),
        }
    }
}

/// Column-major matrix stored in a host-shared segment.
pub struct SharedMatrix<C: Comm, T> {
    segment: SharedMemory<C>,
    nrows: usize,
    ncols: usize,
    _marker: PhantomData<T>,
}

impl<C: Comm, T: Scalar> SharedMatrix<C, T> {
    /// Zero-filled matrix in a fresh scoped segment. Collective over `comm`.
    pub fn new(comm: &C, site: &str, nrows: usize, ncols: usize) -> Result<Self> {
        Self::with_comms(HostBasedComms::new(comm)?, site, nrows, ncols)
    }

    pub fn with_comms(comms: HostBasedComms<C>, site: &str, nrows: usize, ncols: usize) -> Result<Self> {
        let bytes = nrows * ncols * std::mem::size_of::<T>();
        let segment = SharedMemory::scoped_with_comms(comms, site, bytes)?;
        Ok(Self {
            segment,
            nrows,
            ncols,
            _marker: PhantomData,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn comms(&self) -> &HostBasedComms<C> {
        self.segment.comms()
    }

    pub fn segment(&self) -> &SharedMemory<C> {
        &self.segment
    }

    /// Unchecked view for partitioned writers.
    pub fn raw(&self) -> RawMatrix<T> {
        let ptr = if self.segment.is_empty() {
            std::ptr::NonNull::<T>::dangling().as_ptr()
        } else {
            self.segment.as_ptr().cast::<T>()
        };
        RawMatrix {
            ptr,
            nrows: self.nrows,
            ncols: self.ncols,
        }
    }

    /// Whole matrix, column-major. Only valid in a phase where no rank of
    /// the host writes to the segment.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the mapping is page aligned and `nrows * ncols` elements
        // long; every bit pattern is a valid `Scalar`.
        unsafe { std::slice::from_raw_parts(self.raw().ptr, self.nrows * self.ncols) }
    }

    pub fn col(&self, j: usize) -> &[T] {
        &self.as_slice()[j * self.nrows..(j + 1) * self.nrows]
    }

    pub fn as_mat_ref(&self) -> MatRef<'_, T> {
        MatRef::from_column_major_slice(self.as_slice(), self.nrows, self.ncols)
    }

    pub fn to_mat(&self) -> Mat<T> {
        let m = self.as_mat_ref();
        Mat::from_fn(self.nrows, self.ncols, |i, j| m[(i, j)])
    }
}

/// Raw column-major view of a shared matrix.
///
/// Holders must guarantee that concurrent writers touch disjoint elements
/// and that no reader overlaps a writer.
#[derive(Clone, Copy, Debug)]
pub struct RawMatrix<T> {
    ptr: *mut T,
    nrows: usize,
    ncols: usize,
}

// SAFETY: access discipline is delegated to the holder, see above.
unsafe impl<T: Send> Send for RawMatrix<T> {}
unsafe impl<T: Sync> Sync for RawMatrix<T> {}

impl<T: Scalar> RawMatrix<T> {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// # Safety
    /// `j` is in range and no one else accesses column `j` meanwhile.
    pub unsafe fn col_mut<'a>(&self, j: usize) -> &'a mut [T] {
        debug_assert!(j < self.ncols);
        unsafe { std::slice::from_raw_parts_mut(self.ptr.add(j * self.nrows), self.nrows) }
    }

    /// # Safety
    /// The columns in `cols` are in range and not accessed by anyone else
    /// meanwhile.
    pub unsafe fn cols_mut<'a>(&self, cols: std::ops::Range<usize>) -> &'a mut [T] {
        debug_assert!(cols.end <= self.ncols);
        unsafe {
            std::slice::from_raw_parts_mut(self.ptr.add(cols.start * self.nrows), cols.len() * self.nrows)
        }
    }

    /// # Safety
    /// `(i, j)` is in range and not written concurrently.
    pub unsafe fn get(&self, i: usize, j: usize) -> T {
        debug_assert!(i < self.nrows && j < self.ncols);
        unsafe { *self.ptr.add(j * self.nrows + i) }
    }

    /// # Safety
    /// `(i, j)` is in range and not accessed concurrently.
    pub unsafe fn set(&self, i: usize, j: usize, value: T) {
        debug_assert!(i < self.nrows && j < self.ncols);
        unsafe { *self.ptr.add(j * self.nrows + i) = value }
    }
}
