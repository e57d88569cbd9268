//! Round-robin tournament schedule of conflict-free index pairs.

use crate::error::{HlError, Result};

/// One pairing of a round. `None` stands for the idle competitor that appears
/// when the number of competitors is odd.
pub type Pairing = (Option<usize>, Option<usize>);

/// Every pairing of `n` competitors, grouped into rounds of disjoint pairs.
///
/// Competitor 0 stays fixed while the others circulate, the classic circle
/// method. With an odd count the idle slot takes part in the rotation so that
/// each competitor sits out exactly once.
#[derive(Clone, Debug)]
pub struct RoundRobin {
    num_competitors: usize,
    rounds: Vec<Vec<Pairing>>,
}

impl RoundRobin {
    pub fn new(num_competitors: usize) -> Result<Self> {
        if num_competitors == 0 {
            return Err(HlError::Domain(
                "round robin needs at least one competitor".into(),
            ));
        }
        let rows = num_competitors.div_ceil(2);
        let idle = 2 * rows - 1;
        let mut left: Vec<usize> = (0..rows).collect();
        let mut right: Vec<usize> = (rows..2 * rows).rev().collect();

        let label = |c: usize| (c != idle || num_competitors % 2 == 0).then_some(c);
        let snapshot = |left: &[usize], right: &[usize]| -> Vec<Pairing> {
            left.iter()
                .zip(right)
                .map(|(&a, &b)| (label(a), label(b)))
                .collect()
        };

        let mut rounds = vec![snapshot(&left, &right)];
        if rows > 1 {
            loop {
                let last = rows - 1;
                let runoff = (left[last], right[0]);
                left.copy_within(1..last, 2);
                right.copy_within(1.., 0);
                right[last] = runoff.0;
                left[1] = runoff.1;
                if left[1] == 1 {
                    break;
                }
                rounds.push(snapshot(&left, &right));
            }
        }
        Ok(Self {
            num_competitors,
            rounds,
        })
    }

    pub fn num_competitors(&self) -> usize {
        self.num_competitors
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Pairs in each round, optionally counting the pair with the idle slot.
    pub fn pairs_per_round(&self, include_idle: bool) -> usize {
        let rows = self.num_competitors.div_ceil(2);
        if include_idle || self.num_competitors % 2 == 0 {
            rows
        } else {
            rows - 1
        }
    }

    pub fn round(&self, index: usize) -> &[Pairing] {
        &self.rounds[index]
    }

    pub fn rounds(&self) -> &[Vec<Pairing>] {
        &self.rounds
    }
}
