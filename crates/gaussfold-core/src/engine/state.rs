use nalgebra::Point3;
use std::fmt;

/// Index of the first maximum, skipping NaN.
pub(crate) fn argmax(scores: impl IntoIterator<Item = (usize, f64)>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in scores {
        if s.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first minimum, skipping NaN.
pub(crate) fn argmin(scores: impl IntoIterator<Item = (usize, f64)>) -> Option<usize> {
    argmax(scores.into_iter().map(|(i, s)| (i, -s)))
}

/// Fixed-size set of candidates with their scores in parallel arrays.
#[derive(Debug, Clone)]
pub struct Population {
    members: Vec<Vec<Point3<f64>>>,
    scores: Vec<f64>,
}

impl Population {
    pub(crate) fn new(members: Vec<Vec<Point3<f64>>>, scores: Vec<f64>) -> Self {
        debug_assert_eq!(members.len(), scores.len());
        Self { members, scores }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn member(&self, index: usize) -> Option<&[Point3<f64>]> {
        self.members.get(index).map(Vec::as_slice)
    }

    pub fn best_index(&self) -> Option<usize> {
        argmax(self.scores.iter().copied().enumerate())
    }

    pub fn worst_index(&self) -> Option<usize> {
        argmin(self.scores.iter().copied().enumerate())
    }

    /// Best member among `indices`, ties going to the earliest listed.
    pub fn best_of(&self, indices: &[usize]) -> Option<usize> {
        argmax(indices.iter().map(|&i| (i, self.scores[i])))
    }

    /// Moves `coords` into slot `index`, dropping the previous occupant.
    pub(crate) fn replace(&mut self, index: usize, coords: Vec<Point3<f64>>, score: f64) {
        self.members[index] = coords;
        self.scores[index] = score;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    Stalled { best_iteration: usize },
    InvalidScore { iteration: usize },
    TimeLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxIterations => write!(f, "iteration limit reached"),
            Self::Stalled { best_iteration } => {
                write!(f, "no improvement since iteration {}", best_iteration)
            }
            Self::InvalidScore { iteration } => {
                write!(f, "invalid score at iteration {}", iteration)
            }
            Self::TimeLimit => write!(f, "time limit reached"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub coords: Vec<Point3<f64>>,
    pub best_score: f64,
    pub best_iteration: usize,
    /// Best score seen after each generation.
    pub history: Vec<f64>,
    pub stop_reason: StopReason,
    pub iterations: usize,
}
