//! Generalized rotation scheme: iterated, relaxed plane rotations applied
//! concurrently.
//!
//! Each iteration sweeps a round-robin schedule over the columns, so the
//! pairs within a round are disjoint and can be rotated at the same time.
//! The rounds are cut into groups. For a group, every rank asks the inquiry
//! function for the rotations of its share of the group's pairs, relaxes the
//! angles, and the angles are exchanged; then the ranks of each host apply
//! the rotations round by round to the host's shared copy of the matrix.
//! After a full sweep the caller's predicate compares the matrix with the one
//! from the previous sweep.

use faer::{Mat, MatRef};
use tracing::{debug, info};

use crate::config::options::{ActuatorOptions, Sidedness, check_relaxation};
use crate::core::traits::{Scalar, as_bytes};
use crate::core::wrappers::rotate_pair;
use crate::error::{HlError, Result};
use crate::grs::rotation::{Dimension, IndexedVectorPair, MatrixIndexPair, RotationSpec};
use crate::matrix::dense::ColMajor;
use crate::parallel::copy::parallel_copy;
use crate::parallel::thread_pool::{in_parallel_region, parallel_chunks, parallel_ranges, with_max_threads};
use crate::parallel::{Comm, SharedMatrix};
use crate::utils::combinatorics::{Pairing, RoundRobin};
use crate::utils::partition::{group_boundaries, group_range};

/// Relaxation update `(iteration, previous relaxation, group) → relaxation`.
pub type RelaxFn<'a> = Box<dyn Fn(usize, f64, usize) -> f64 + 'a>;

/// Convergence predicate on `(previous, current)` iterates.
pub type ConvergenceFn<'a, T> = Box<dyn Fn(MatRef<'_, T>, MatRef<'_, T>) -> bool + 'a>;

/// How an [`Actuator::actuate`] call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    MaxIterationsReached,
}

#[derive(Clone, Debug)]
pub struct GrsResult<T> {
    /// The rotated matrix.
    pub transform: Mat<T>,
    pub num_iters: usize,
    pub has_converged: bool,
}

impl<T> GrsResult<T> {
    pub fn outcome(&self) -> Outcome {
        if self.has_converged {
            Outcome::Converged
        } else {
            Outcome::MaxIterationsReached
        }
    }
}

/// Empirical initial relaxation for one-sided rotation of `n` columns.
pub fn one_sided_relaxation(n: usize) -> f64 {
    (1.0 - 2.2919 * (n as f64).powf(-0.3382)).max(0.0)
}

/// Empirical initial relaxation for two-sided rotation of order `n`.
pub fn two_sided_relaxation(n: usize) -> f64 {
    (1.0 - 2.9267 * (n as f64).powf(-0.4284)).max(0.0)
}

pub struct Actuator<'a, C, T> {
    comm: &'a C,
    options: ActuatorOptions,
    relax_fn: RelaxFn<'a>,
    convergence_fn: ConvergenceFn<'a, T>,
}

impl<'a, C: Comm, T: Scalar> Actuator<'a, C, T> {
    pub fn new(
        comm: &'a C,
        options: ActuatorOptions,
        relax_fn: impl Fn(usize, f64, usize) -> f64 + 'a,
        convergence_fn: impl Fn(MatRef<'_, T>, MatRef<'_, T>) -> bool + 'a,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            comm,
            options,
            relax_fn: Box::new(relax_fn),
            convergence_fn: Box::new(convergence_fn),
        })
    }

    pub fn options(&self) -> &ActuatorOptions {
        &self.options
    }

    /// Rotates `input` until the convergence predicate holds on every rank or
    /// the iteration limit is reached. `inquiry` gives the unrelaxed rotation
    /// for a pair of columns of the current iterate. Collective over the
    /// actuator's process group, which must run the same number of processes
    /// on every host.
    pub fn actuate<F>(&self, input: MatRef<'_, T>, inquiry: F) -> Result<GrsResult<T>>
    where
        F: Fn(&IndexedVectorPair<'_, T>) -> RotationSpec + Sync,
    {
        assert!(
            !in_parallel_region(),
            "actuate must not be called from inside a parallel region"
        );
        let (nrows, ncols) = (input.nrows(), input.ncols());
        if nrows < 1 || ncols < 2 {
            return Err(HlError::Shape(format!(
                "rotations need at least one row and two columns, got {nrows}x{ncols}"
            )));
        }
        if self.options.sidedness == Sidedness::TwoSided && nrows != ncols {
            return Err(HlError::Shape(format!(
                "two-sided rotation needs a square matrix, got {nrows}x{ncols}"
            )));
        }
        with_max_threads(self.options.max_threads, || self.run(input, &inquiry))?
    }

    fn run<F>(&self, input: MatRef<'_, T>, inquiry: &F) -> Result<GrsResult<T>>
    where
        F: Fn(&IndexedVectorPair<'_, T>) -> RotationSpec + Sync,
    {
        let (nrows, ncols) = (input.nrows(), input.ncols());
        let prev = SharedMatrix::<C, T>::new(self.comm, "grs-previous", nrows, ncols)?;
        let curr = SharedMatrix::<C, T>::new(self.comm, "grs-current", nrows, ncols)?;
        if !curr.comms().topology().is_uniform() {
            return Err(HlError::Domain(
                "every host must run the same number of processes".into(),
            ));
        }
        let intra = curr.comms().intrahost();
        let seed = ColMajor::from_mat(input);
        // SAFETY: every rank passes the same input; both segments hold
        // `nrows * ncols` elements and are not otherwise in use yet.
        unsafe {
            parallel_copy(Some(intra), as_bytes(seed.as_slice()), prev.segment().as_ptr());
            parallel_copy(Some(intra), as_bytes(seed.as_slice()), curr.segment().as_ptr());
        }

        let schedule = RoundRobin::new(ncols)?;
        let per_round = schedule.pairs_per_round(true);
        let num_groups = self.options.num_groups;
        let group_bounds = group_boundaries(0, schedule.num_rounds(), num_groups);

        let mut relax = self.options.init_relax;
        let mut num_iters = 0;
        let mut converged = false;
        for iteration in 0..self.options.max_iterations {
            for group in 0..num_groups {
                let rounds = group_bounds[group]..group_bounds[group + 1];
                let batch: Vec<Pairing> = rounds
                    .clone()
                    .flat_map(|r| schedule.round(r).iter().copied())
                    .collect();
                let specs = self.relaxed_specs(&curr, &batch, relax, inquiry);
                for (k, round) in rounds.enumerate() {
                    let specs = &specs[2 * k * per_round..2 * (k + 1) * per_round];
                    rotate_round(&curr, schedule.round(round), specs, Dimension::Columns);
                    if self.options.sidedness == Sidedness::TwoSided {
                        rotate_round(&curr, schedule.round(round), specs, Dimension::Rows);
                    }
                }
                relax = (self.relax_fn)(iteration, relax, group);
                check_relaxation(relax)?;
            }

            let local = (self.convergence_fn)(prev.as_mat_ref(), curr.as_mat_ref());
            converged = self.comm.all_reduce_and(local);
            num_iters = iteration + 1;
            debug!(iteration, relax, converged, "finished rotation sweep");
            if converged {
                break;
            }
            // SAFETY: all ranks finished reading `prev` before the reduction.
            unsafe { parallel_copy(Some(intra), as_bytes(curr.as_slice()), prev.segment().as_ptr()) };
        }
        intra.barrier();

        info!(num_iters, converged, "rotation scheme finished");
        Ok(GrsResult {
            transform: curr.to_mat(),
            num_iters,
            has_converged: converged,
        })
    }

    /// Relaxed `(cos, sin)` of every pair in `batch`, interleaved. Ranks
    /// split the batch and exchange their shares.
    fn relaxed_specs<F>(&self, curr: &SharedMatrix<C, T>, batch: &[Pairing], relax: f64, inquiry: &F) -> Vec<f64>
    where
        F: Fn(&IndexedVectorPair<'_, T>) -> RotationSpec + Sync,
    {
        let (rank, size) = (self.comm.rank(), self.comm.size());
        let nrows = curr.nrows();
        let matrix = curr.as_slice();
        let col = |j: usize| &matrix[j * nrows..(j + 1) * nrows];

        let mut specs = vec![0.0; 2 * batch.len()];
        let mine = group_range(0, batch.len(), size, rank);
        let offset = mine.start;
        parallel_chunks(&mut specs[2 * mine.start..2 * mine.end], 2, |pairs, out| {
            for (p, cs) in pairs.zip(out.chunks_exact_mut(2)) {
                let spec = match batch[offset + p] {
                    (Some(a), Some(b)) => {
                        let (i, j) = (a.min(b), a.max(b));
                        let vectors = IndexedVectorPair {
                            indices: MatrixIndexPair::columns(i, j),
                            first: col(i),
                            second: col(j),
                        };
                        inquiry(&vectors).relaxed(relax)
                    }
                    _ => RotationSpec::identity(),
                };
                cs[0] = spec.cosine;
                cs[1] = spec.sine;
            }
        });
        for root in 0..size {
            let share = group_range(0, batch.len(), size, root);
            self.comm.broadcast(&mut specs[2 * share.start..2 * share.end], root);
        }
        specs
    }
}

/// Applies the rotations of one round to the shared matrix, split between
/// the ranks of the host and then between threads. Ends with an intrahost
/// barrier.
fn rotate_round<C: Comm, T: Scalar>(curr: &SharedMatrix<C, T>, pairs: &[Pairing], specs: &[f64], dimension: Dimension) {
    let intra = curr.comms().intrahost();
    let mine = group_range(0, pairs.len(), intra.size(), intra.rank());
    let raw = curr.raw();
    parallel_ranges(mine, |_, range| {
        for p in range {
            let (Some(a), Some(b)) = pairs[p] else {
                continue;
            };
            let (i, j) = (a.min(b), a.max(b));
            let (c, s) = (specs[2 * p], specs[2 * p + 1]);
            // SAFETY: the pairs of a round are disjoint, so every worker
            // owns its rows or columns exclusively until the barrier.
            unsafe {
                match dimension {
                    Dimension::Columns => rotate_pair(raw.col_mut(i), raw.col_mut(j), c, s),
                    Dimension::Rows => {
                        for k in 0..raw.ncols() {
                            let (x, y) = (raw.get(i, k), raw.get(j, k));
                            raw.set(i, k, x.scale(c) - y.scale(s));
                            raw.set(j, k, x.scale(s) + y.scale(c));
                        }
                    }
                }
            }
        }
    });
    intra.barrier();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::LocalComm;

    fn never_converges<T: Scalar>(_: MatRef<'_, T>, _: MatRef<'_, T>) -> bool {
        false
    }

    #[test]
    fn relaxation_initializers() {
        assert_eq!(one_sided_relaxation(2), 0.0);
        let r = one_sided_relaxation(1000);
        assert!(r > 0.5 && r < 1.0);
        let t = two_sided_relaxation(1000);
        assert!(t > r && t < 1.0);
    }

    #[test]
    fn shape_checks() {
        let comm = LocalComm::solo();
        let act = Actuator::<_, f64>::new(&comm, ActuatorOptions::default(), |_, r, _| r, never_converges).unwrap();
        let one_col = Mat::from_fn(3, 1, |_, _| 1.0);
        assert!(matches!(
            act.actuate(one_col.as_ref(), |_| RotationSpec::identity()),
            Err(HlError::Shape(_))
        ));

        let two_sided = ActuatorOptions::default().with_sidedness(Sidedness::TwoSided);
        let act = Actuator::<_, f64>::new(&comm, two_sided, |_, r, _| r, never_converges).unwrap();
        let tall = Mat::from_fn(3, 2, |_, _| 1.0);
        assert!(matches!(
            act.actuate(tall.as_ref(), |_| RotationSpec::identity()),
            Err(HlError::Shape(_))
        ));
    }

    #[test]
    fn rejects_invalid_options_and_relaxation() {
        let comm = LocalComm::solo();
        let bad = ActuatorOptions::default().with_num_groups(0);
        assert!(Actuator::<_, f64>::new(&comm, bad, |_, r, _| r, never_converges).is_err());

        let act = Actuator::<_, f64>::new(&comm, ActuatorOptions::default(), |_, _, _| 1.5, never_converges).unwrap();
        let m = Mat::from_fn(2, 2, |i, j| (i + j) as f64);
        assert!(matches!(
            act.actuate(m.as_ref(), |_| RotationSpec::identity()),
            Err(HlError::Domain(_))
        ));
    }

    #[test]
    fn quarter_turn_swaps_columns() {
        let comm = LocalComm::solo();
        let opts = ActuatorOptions::default().with_max_iterations(1);
        let act = Actuator::<_, f64>::new(&comm, opts, |_, r, _| r, never_converges).unwrap();
        let m = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let res = act
            .actuate(m.as_ref(), |_| RotationSpec::from_angle(std::f64::consts::FRAC_PI_2))
            .unwrap();
        assert_eq!(res.outcome(), Outcome::MaxIterationsReached);
        assert_eq!(res.num_iters, 1);
        // x0' = -x1, x1' = x0
        assert!((res.transform[(1, 0)] + 1.0).abs() < 1e-12);
        assert!((res.transform[(0, 1)] - 1.0).abs() < 1e-12);
    }
}
