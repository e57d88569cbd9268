//! Option structs for the iterative kernels.
//!
//! Every struct carries the defaults the kernels were tuned with and a
//! handful of `with_*` builders, so callers only spell out what they change.

use crate::error::{HlError, Result};

/// Whether a rotation acts on columns only or on rows and columns. With `G`
/// the Givens matrix of a pair (see [`crate::grs::givens_matrix`]):
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Sidedness {
    /// `X ← X·Gᵀ`.
    #[default]
    OneSidedRight,
    /// `X ← G·X·Gᵀ`; the matrix must be square.
    TwoSided,
}

/// Iterated Gram-Schmidt parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GramSchmidtOptions {
    /// Reorthogonalize while the projected norm falls to this fraction of the
    /// norm before projection, or below.
    pub reortho_thresh_factor: f64,
    /// Extra projection passes allowed per column.
    pub max_reorthos: usize,
    /// Norm below which an appended identity column counts as spent.
    pub zero_norm_abs_thresh: f64,
}

impl Default for GramSchmidtOptions {
    fn default() -> Self {
        Self {
            reortho_thresh_factor: 0.5,
            max_reorthos: 1,
            zero_norm_abs_thresh: 1e-5,
        }
    }
}

impl GramSchmidtOptions {
    pub fn with_reortho_thresh_factor(mut self, factor: f64) -> Self {
        self.reortho_thresh_factor = factor;
        self
    }

    pub fn with_max_reorthos(mut self, max_reorthos: usize) -> Self {
        self.max_reorthos = max_reorthos;
        self
    }

    pub fn with_zero_norm_abs_thresh(mut self, thresh: f64) -> Self {
        self.zero_norm_abs_thresh = thresh;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.reortho_thresh_factor > 0.0 && self.reortho_thresh_factor < 1.0) {
            return Err(HlError::Domain(format!(
                "reorthogonalization threshold factor {} is not in (0, 1)",
                self.reortho_thresh_factor
            )));
        }
        if !(self.zero_norm_abs_thresh > 0.0) {
            return Err(HlError::Domain(
                "zero-norm threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the relaxed rotation actuator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActuatorOptions {
    /// Upper bound on the number of threads the work of a round is split
    /// between while the actuator runs. No pool is created; `None` keeps the
    /// caller's limit.
    pub max_threads: Option<usize>,
    pub sidedness: Sidedness,
    /// Initial relaxation parameter, in `[0, 1)`.
    pub init_relax: f64,
    /// Number of groups the rounds of a sweep are split into. The relaxation
    /// parameter is updated after each group.
    pub num_groups: usize,
    pub max_iterations: usize,
}

impl Default for ActuatorOptions {
    fn default() -> Self {
        Self {
            max_threads: None,
            sidedness: Sidedness::OneSidedRight,
            init_relax: 0.0,
            num_groups: 1,
            max_iterations: 100,
        }
    }
}

impl ActuatorOptions {
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = Some(max_threads);
        self
    }

    pub fn with_sidedness(mut self, sidedness: Sidedness) -> Self {
        self.sidedness = sidedness;
        self
    }

    pub fn with_init_relax(mut self, init_relax: f64) -> Self {
        self.init_relax = init_relax;
        self
    }

    pub fn with_num_groups(mut self, num_groups: usize) -> Self {
        self.num_groups = num_groups;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == Some(0) {
            return Err(HlError::Domain("maximum thread count must be positive".into()));
        }
        check_relaxation(self.init_relax)?;
        if self.num_groups == 0 {
            return Err(HlError::Domain("number of rotation groups must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(HlError::Domain("maximum iteration count must be positive".into()));
        }
        Ok(())
    }
}

/// Relaxation parameters live in `[0, 1)`.
pub fn check_relaxation(relax: f64) -> Result<()> {
    if (0.0..1.0).contains(&relax) {
        Ok(())
    } else {
        Err(HlError::Domain(format!(
            "relaxation parameter {relax} is not in [0, 1)"
        )))
    }
}

/// Weighted orthogonalization parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedOrthoOptions {
    pub max_sweeps: usize,
    /// Threshold for negligible weights and rotation coefficients, and the
    /// convergence tolerance on successive iterates.
    pub zero_abs_thresh: f64,
}

impl Default for WeightedOrthoOptions {
    fn default() -> Self {
        Self {
            max_sweeps: 100,
            zero_abs_thresh: 1e-5,
        }
    }
}

impl WeightedOrthoOptions {
    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn with_zero_abs_thresh(mut self, thresh: f64) -> Self {
        self.zero_abs_thresh = thresh;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sweeps == 0 {
            return Err(HlError::Domain("maximum sweep count must be positive".into()));
        }
        if !(self.zero_abs_thresh > 0.0) {
            return Err(HlError::Domain("zero threshold must be positive".into()));
        }
        Ok(())
    }
}
