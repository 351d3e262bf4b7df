//! Thin adapters over the `argmin` solvers used by the corrector, the
//! structural aligner and the local polish step.
//!
//! Each adapter counts objective evaluations and never returns a point worse
//! than the best one it evaluated, even when the solver itself bails out.

use argmin::core::{CostFunction, Error, Executor, Gradient, State};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::DVector;
use std::cell::{Cell, RefCell};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMinimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: DVector<f64>,
    pub value: f64,
    pub evaluations: usize,
}

#[inline]
fn finite_or_inf(v: f64) -> f64 {
    if v.is_nan() { f64::INFINITY } else { v }
}

struct ScalarProblem<'a, F> {
    f: &'a F,
    evaluations: &'a Cell<usize>,
}

impl<F: Fn(f64) -> f64> ScalarProblem<'_, F> {
    fn eval(&self, x: f64) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        finite_or_inf((self.f)(x))
    }
}

impl<F: Fn(f64) -> f64> CostFunction for ScalarProblem<'_, F> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, Error> {
        Ok(self.eval(*x))
    }
}

/// Golden-section search for the minimum of `f` on `[lower, upper]`.
///
/// The endpoints and the midpoint are evaluated too, so a minimum sitting on a
/// bound is found exactly.
pub fn minimize_scalar_bounded<F>(f: F, lower: f64, upper: f64, tolerance: f64) -> ScalarMinimum
where
    F: Fn(f64) -> f64,
{
    const MAX_ITERATIONS: u64 = 200;

    let (a, b) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };
    let mid = 0.5 * (a + b);
    let evaluations = Cell::new(0);
    let problem = || ScalarProblem {
        f: &f,
        evaluations: &evaluations,
    };

    let mut best = (a, problem().eval(a));
    for x in [b, mid] {
        let v = problem().eval(x);
        if v < best.1 {
            best = (x, v);
        }
    }

    if b > a {
        let solved = GoldenSectionSearch::new(a, b)
            .and_then(|solver| solver.with_tolerance(tolerance.max(f64::EPSILON)))
            .and_then(|solver| {
                Executor::new(problem(), solver)
                    .configure(|state| state.param(mid).max_iters(MAX_ITERATIONS))
                    .run()
            });
        match solved {
            Ok(res) => {
                if let Some(&x) = res.state().get_best_param() {
                    let v = problem().eval(x);
                    if v < best.1 {
                        best = (x, v);
                    }
                }
            }
            Err(e) => debug!("Golden-section search stopped early: {}", e),
        }
    }

    ScalarMinimum {
        x: best.0,
        value: best.1,
        evaluations: evaluations.get(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Standard deviation of the simplex values below which the search ends.
    pub sd_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            sd_tolerance: 1e-10,
        }
    }
}

fn clamp_into(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (v, &(lo, hi)) in x.iter_mut().zip(bounds.iter()) {
        *v = v.clamp(lo, hi);
    }
}

struct BoxProblem<'a, F> {
    f: &'a F,
    bounds: &'a [(f64, f64)],
    evaluations: &'a Cell<usize>,
}

impl<F: Fn(&DVector<f64>) -> f64> BoxProblem<'_, F> {
    fn project(&self, x: &[f64]) -> DVector<f64> {
        let mut projected = x.to_vec();
        clamp_into(&mut projected, self.bounds);
        DVector::from_vec(projected)
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        finite_or_inf((self.f)(x))
    }
}

impl<F: Fn(&DVector<f64>) -> f64> CostFunction for BoxProblem<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Vec<f64>) -> Result<f64, Error> {
        Ok(self.eval(&self.project(x)))
    }
}

/// Nelder–Mead simplex search restricted to a box. Trial points are projected
/// onto the bounds before evaluation, and so is the returned point.
pub fn nelder_mead_bounded<F>(
    f: F,
    x0: &DVector<f64>,
    steps: &[f64],
    bounds: &[(f64, f64)],
    options: &NelderMeadOptions,
) -> Minimum
where
    F: Fn(&DVector<f64>) -> f64,
{
    let evaluations = Cell::new(0);
    let problem = || BoxProblem {
        f: &f,
        bounds,
        evaluations: &evaluations,
    };

    let mut start = x0.as_slice().to_vec();
    clamp_into(&mut start, bounds);
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.clone());
    for i in 0..start.len() {
        let mut v = start.clone();
        let step = steps.get(i).copied().unwrap_or(1.0);
        v[i] += step;
        if bounds.get(i).is_some_and(|&(_, hi)| v[i] > hi) {
            v[i] = start[i] - step;
        }
        clamp_into(&mut v, bounds);
        simplex.push(v);
    }

    let start = DVector::from_vec(start);
    let mut best = (start.clone(), problem().eval(&start));

    let solved = NelderMead::new(simplex)
        .with_sd_tolerance(options.sd_tolerance)
        .and_then(|solver| {
            Executor::new(problem(), solver)
                .configure(|state| state.max_iters(options.max_iterations as u64))
                .run()
        });
    match solved {
        Ok(res) => {
            if let Some(x) = res.state().get_best_param() {
                let candidate = problem().project(x);
                let v = problem().eval(&candidate);
                if v < best.1 {
                    best = (candidate, v);
                }
            }
        }
        Err(e) => debug!("Nelder-Mead search stopped early: {}", e),
    }

    Minimum {
        x: best.0,
        value: best.1,
        evaluations: evaluations.get(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsOptions {
    pub memory: usize,
    pub max_iterations: usize,
    pub gradient_tolerance: f64,
    pub f_tolerance: f64,
}

impl Default for LbfgsOptions {
    fn default() -> Self {
        Self {
            memory: 10,
            max_iterations: 500,
            gradient_tolerance: 1e-5,
            f_tolerance: 1e-10,
        }
    }
}

type Evaluation = (Vec<f64>, f64, Vec<f64>);

struct SmoothProblem<'a, F> {
    f: &'a F,
    last: RefCell<Option<Evaluation>>,
    best: &'a RefCell<(Vec<f64>, f64)>,
    evaluations: &'a Cell<usize>,
}

impl<F> SmoothProblem<'_, F>
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    /// Value and gradient at `x`; cost and gradient requests for the same
    /// point share one evaluation.
    fn eval(&self, x: &[f64]) -> (f64, Vec<f64>) {
        if let Some((at, value, grad)) = self.last.borrow().as_ref() {
            if at.as_slice() == x {
                return (*value, grad.clone());
            }
        }
        self.evaluations.set(self.evaluations.get() + 1);
        let (value, grad) = (self.f)(&DVector::from_column_slice(x));
        let grad = grad.as_slice().to_vec();
        if value.is_finite() && value < self.best.borrow().1 {
            *self.best.borrow_mut() = (x.to_vec(), value);
        }
        *self.last.borrow_mut() = Some((x.to_vec(), value, grad.clone()));
        (value, grad)
    }
}

impl<F> CostFunction for SmoothProblem<'_, F>
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Vec<f64>) -> Result<f64, Error> {
        match self.eval(x) {
            (value, _) if value.is_finite() => Ok(value),
            (value, _) => Err(Error::msg(format!("objective is {} at a trial point", value))),
        }
    }
}

impl<F> Gradient for SmoothProblem<'_, F>
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Vec<f64>) -> Result<Vec<f64>, Error> {
        Ok(self.eval(x).1)
    }
}

/// Limited-memory BFGS with a More–Thuente line search.
///
/// `objective` returns the value and gradient at a point. The returned
/// minimum is the best point evaluated, so it is never worse than the start.
pub fn lbfgs<F>(objective: F, x0: DVector<f64>, options: &LbfgsOptions) -> Minimum
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    let x0 = x0.as_slice().to_vec();
    let evaluations = Cell::new(0);
    let best = RefCell::new((x0.clone(), f64::INFINITY));
    let problem = SmoothProblem {
        f: &objective,
        last: RefCell::new(None),
        best: &best,
        evaluations: &evaluations,
    };

    let (f0, _) = problem.eval(&x0);
    if !f0.is_finite() {
        return Minimum {
            x: DVector::from_vec(x0),
            value: f0,
            evaluations: evaluations.get(),
        };
    }

    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
    let solved = LBFGS::new(linesearch, options.memory)
        .with_tolerance_grad(options.gradient_tolerance)
        .and_then(|solver| solver.with_tolerance_cost(options.f_tolerance))
        .and_then(|solver| {
            Executor::new(problem, solver)
                .configure(|state| state.param(x0).max_iters(options.max_iterations as u64))
                .run()
        });
    if let Err(e) = solved {
        debug!("L-BFGS stopped early: {}", e);
    }

    let (x, value) = best.borrow().clone();
    Minimum {
        x: DVector::from_vec(x),
        value,
        evaluations: evaluations.get(),
    }
}
