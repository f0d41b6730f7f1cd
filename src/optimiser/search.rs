//! Search strategies over PV and storage capacity.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Error};
use crate::sim::kpi::TraceSummary;
use crate::sim::types::SystemSizing;

use super::criteria::Criterion;

/// Most steps a single range may span.
pub const MAX_RANGE_STEPS: f64 = 1e6;

/// Evenly spaced capacities `min, min + step, ...` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SizeRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// A range holding the single value `value`.
    pub fn fixed(value: f64) -> Self {
        Self::new(value, value, 1.0)
    }

    /// Every value in the range, in ascending order.
    pub fn values(&self) -> Vec<f64> {
        let steps = ((self.max - self.min) / self.step + 1e-9).floor().max(0.0) as usize;
        (0..=steps).map(|i| self.min + i as f64 * self.step).collect()
    }

    /// The range starting at `floor` instead, keeping the step and widening
    /// the upper bound if needed.
    pub fn starting_at(&self, floor: f64) -> Self {
        let min = self.min.max(floor);
        Self::new(min, self.max.max(min), self.step)
    }

    pub fn validate(&self, section: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if !self.min.is_finite() || self.min < 0.0 {
            errors.push(ConfigError::new(format!("{section}.min"), "must be >= 0"));
        }
        if !self.max.is_finite() || self.max < self.min {
            errors.push(ConfigError::new(
                format!("{section}.max"),
                format!("must be >= {section}.min"),
            ));
        }
        if !(self.step > 0.0) || !self.step.is_finite() {
            errors.push(ConfigError::new(format!("{section}.step"), "must be > 0"));
        } else if errors.is_empty() && (self.max - self.min) / self.step > MAX_RANGE_STEPS {
            errors.push(ConfigError::new(
                format!("{section}.step"),
                format!("range spans more than {MAX_RANGE_STEPS} steps"),
            ));
        }
        errors
    }
}

/// PV and storage ranges for one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSpace {
    pub pv: SizeRange,
    pub storage: SizeRange,
}

impl SearchSpace {
    pub fn minimum(&self) -> SystemSizing {
        SystemSizing::new(self.pv.min, self.storage.min)
    }
}

/// One evaluated sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Installed capacities that were simulated.
    pub sizing: SystemSizing,
    /// Degraded capacities at the end of the window.
    pub final_sizing: SystemSizing,
    pub summary: TraceSummary,
    /// Value of the threshold criterion.
    pub threshold_metric: f64,
    /// Value of the optimisation criterion.
    pub objective: f64,
    /// Whether the threshold is met.
    pub feasible: bool,
}

/// Runs candidate sizings for a search strategy.
pub trait Evaluate: Sync {
    /// Simulates `sizing` and scores it.
    fn evaluate(&self, sizing: &SystemSizing) -> Result<Candidate, Error>;

    /// Whether the search should stop starting new candidates.
    fn is_cancelled(&self) -> bool;

    /// Criterion used to rank feasible candidates.
    fn objective(&self) -> Criterion;

    /// Criterion the threshold applies to.
    fn threshold_criterion(&self) -> Criterion;
}

/// Candidates evaluated along one line of sizings.
#[derive(Debug, Clone, Default)]
pub struct LineResult {
    /// Evaluated candidates, in line order.
    pub candidates: Vec<Candidate>,
    /// Whether cancellation cut the line short.
    pub interrupted: bool,
}

impl LineResult {
    pub fn first_feasible(&self) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.feasible)
    }
}

/// Evaluates `sizings` in parallel chunks the size of the thread pool.
///
/// With `stop_at_feasible` set, no further chunk starts once a chunk contains
/// a feasible candidate. Cancellation is checked before every candidate.
pub fn evaluate_line(
    eval: &dyn Evaluate,
    sizings: &[SystemSizing],
    stop_at_feasible: bool,
) -> Result<LineResult, Error> {
    let chunk_size = rayon::current_num_threads().max(1);
    let mut line = LineResult::default();

    for chunk in sizings.chunks(chunk_size) {
        if eval.is_cancelled() {
            line.interrupted = true;
            break;
        }
        let results: Vec<Option<Candidate>> = chunk
            .par_iter()
            .map(|sizing| {
                if eval.is_cancelled() {
                    Ok(None)
                } else {
                    eval.evaluate(sizing).map(Some)
                }
            })
            .collect::<Result<_, Error>>()?;

        let skipped = results.iter().any(Option::is_none);
        line.candidates.extend(results.into_iter().flatten());
        if skipped {
            line.interrupted = true;
            break;
        }
        if stop_at_feasible && line.candidates.iter().any(|c| c.feasible) {
            break;
        }
    }
    Ok(line)
}

/// Result of one search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Best feasible candidate, or the closest to feasible if none is.
    pub best: Option<Candidate>,
    /// Number of candidates simulated.
    pub evaluated: usize,
    /// Whether cancellation stopped the search early.
    pub interrupted: bool,
}

/// Picks the best candidate: feasible ones ranked by objective, then by total
/// capacity; if none is feasible, the one closest to the threshold. Earlier
/// candidates win ties.
pub fn select_best(eval: &dyn Evaluate, candidates: &[Candidate]) -> Option<Candidate> {
    let objective = eval.objective().direction();
    let threshold = eval.threshold_criterion().direction();
    candidates.iter().copied().reduce(|best, c| {
        let better = match (c.feasible, best.feasible) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => {
                objective.is_better(c.objective, best.objective)
                    || (c.objective == best.objective
                        && c.sizing.total_capacity() < best.sizing.total_capacity())
            }
            (false, false) => {
                threshold.is_better(c.threshold_metric, best.threshold_metric)
                    || (c.threshold_metric == best.threshold_metric
                        && objective.is_better(c.objective, best.objective))
            }
        };
        if better { c } else { best }
    })
}

/// A way of walking the search space.
pub trait SearchStrategy: Send + Sync {
    fn search(&self, space: &SearchSpace, eval: &dyn Evaluate) -> Result<SearchOutcome, Error>;

    fn name(&self) -> &'static str;
}

/// Single-line search: storage first, then PV, then PV/storage trade-offs.
///
/// 1. Storage line at minimum PV, stopping at the first feasible storage size.
/// 2. PV line at maximum storage, stopping at the first feasible PV size (the anchor).
/// 3. For PV = anchor, anchor + step, ... (`trade_off_steps` extra steps), the
///    smallest feasible storage.
///
/// Feasible candidates from every line are ranked by the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateAscent {
    pub trade_off_steps: usize,
}

impl CoordinateAscent {
    fn storage_line(space: &SearchSpace, pv_kwp: f64) -> Vec<SystemSizing> {
        space
            .storage
            .values()
            .into_iter()
            .map(|s| SystemSizing::new(pv_kwp, s))
            .collect()
    }

    /// Evaluates the sizings of `line` not already in `seen`, stopping where a
    /// seen sizing is feasible.
    fn evaluate_unseen(
        eval: &dyn Evaluate,
        line: &[SystemSizing],
        seen: &[Candidate],
    ) -> Result<LineResult, Error> {
        let known = |s: &SystemSizing| seen.iter().find(|c| c.sizing == *s);
        let end = line
            .iter()
            .position(|s| known(s).is_some_and(|c| c.feasible))
            .unwrap_or(line.len());
        let unseen: Vec<SystemSizing> = line[..end]
            .iter()
            .filter(|s| known(s).is_none())
            .copied()
            .collect();
        evaluate_line(eval, &unseen, true)
    }

    /// First sizing along `line` whose evaluated candidate is feasible.
    fn first_feasible<'c>(line: &[SystemSizing], seen: &'c [Candidate]) -> Option<&'c Candidate> {
        line.iter()
            .find_map(|s| seen.iter().find(|c| c.sizing == *s && c.feasible))
    }
}

impl SearchStrategy for CoordinateAscent {
    fn search(&self, space: &SearchSpace, eval: &dyn Evaluate) -> Result<SearchOutcome, Error> {
        let mut all: Vec<Candidate> = Vec::new();
        let mut interrupted = false;

        let storage_line = evaluate_line(eval, &Self::storage_line(space, space.pv.min), true)?;
        interrupted |= storage_line.interrupted;
        all.extend(storage_line.candidates);

        if !interrupted {
            let pv_line: Vec<SystemSizing> = space
                .pv
                .values()
                .into_iter()
                .map(|p| SystemSizing::new(p, space.storage.max))
                .collect();
            let evaluated = Self::evaluate_unseen(eval, &pv_line, &all)?;
            interrupted |= evaluated.interrupted;
            all.extend(evaluated.candidates);
            let anchor = Self::first_feasible(&pv_line, &all).map(|c| c.sizing.pv_kwp);

            if let Some(anchor) = anchor {
                let trade_offs = space
                    .pv
                    .values()
                    .into_iter()
                    .filter(|p| *p >= anchor)
                    .take(self.trade_off_steps + 1);
                for pv_kwp in trade_offs {
                    if interrupted {
                        break;
                    }
                    let line_sizings = Self::storage_line(space, pv_kwp);
                    let line = Self::evaluate_unseen(eval, &line_sizings, &all)?;
                    interrupted |= line.interrupted;
                    all.extend(line.candidates);
                    debug!(
                        pv_kwp,
                        storage_kwh = Self::first_feasible(&line_sizings, &all)
                            .map(|c| c.sizing.storage_kwh),
                        "trade-off line evaluated"
                    );
                }
            }
        }

        Ok(SearchOutcome {
            best: select_best(eval, &all),
            evaluated: all.len(),
            interrupted,
        })
    }

    fn name(&self) -> &'static str {
        "coordinate_ascent"
    }
}

/// Evaluates every PV × storage combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundedGrid;

impl SearchStrategy for BoundedGrid {
    fn search(&self, space: &SearchSpace, eval: &dyn Evaluate) -> Result<SearchOutcome, Error> {
        let storage = space.storage.values();
        let grid: Vec<SystemSizing> = space
            .pv
            .values()
            .into_iter()
            .flat_map(|p| storage.iter().map(move |&s| SystemSizing::new(p, s)))
            .collect();
        let line = evaluate_line(eval, &grid, false)?;
        Ok(SearchOutcome {
            best: select_best(eval, &line.candidates),
            evaluated: line.candidates.len(),
            interrupted: line.interrupted,
        })
    }

    fn name(&self) -> &'static str {
        "bounded_grid"
    }
}

/// Configured choice of search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    CoordinateAscent { trade_off_steps: usize },
    BoundedGrid,
}

impl StrategyKind {
    pub const NAMES: [&'static str; 2] = ["coordinate_ascent", "bounded_grid"];

    /// Parses a strategy name from configuration.
    pub fn from_name(name: &str, trade_off_steps: usize) -> Option<Self> {
        match name {
            "coordinate_ascent" => Some(Self::CoordinateAscent { trade_off_steps }),
            "bounded_grid" => Some(Self::BoundedGrid),
            _ => None,
        }
    }

    pub fn build(self) -> Box<dyn SearchStrategy> {
        match self {
            Self::CoordinateAscent { trade_off_steps } => {
                Box::new(CoordinateAscent { trade_off_steps })
            }
            Self::BoundedGrid => Box::new(BoundedGrid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimiser::cancel::CancelFlag;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Feasible when `pv + 2 × storage >= need`; objective is total capacity.
    struct Linear {
        need: f64,
        calls: AtomicUsize,
        seen: Mutex<Vec<SystemSizing>>,
        cancel: CancelFlag,
        cancel_after: Option<usize>,
    }

    impl Linear {
        fn new(need: f64) -> Self {
            Self {
                need,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                cancel: CancelFlag::new(),
                cancel_after: None,
            }
        }
    }

    impl Evaluate for Linear {
        fn evaluate(&self, sizing: &SystemSizing) -> Result<Candidate, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(*sizing);
            if self.cancel_after.is_some_and(|limit| n >= limit) {
                self.cancel.cancel();
            }
            let supply = sizing.pv_kwp + 2.0 * sizing.storage_kwh;
            let metric = ((self.need - supply) / self.need).max(0.0);
            Ok(Candidate {
                sizing: *sizing,
                final_sizing: *sizing,
                summary: TraceSummary::default(),
                threshold_metric: metric,
                objective: sizing.total_capacity(),
                feasible: metric <= 0.0,
            })
        }

        fn is_cancelled(&self) -> bool {
            self.cancel.is_cancelled()
        }

        fn objective(&self) -> Criterion {
            Criterion::TotalCapacity
        }

        fn threshold_criterion(&self) -> Criterion {
            Criterion::Blackouts
        }
    }

    fn space() -> SearchSpace {
        SearchSpace {
            pv: SizeRange::new(0.0, 10.0, 1.0),
            storage: SizeRange::new(0.0, 10.0, 1.0),
        }
    }

    #[test]
    fn range_values_include_max() {
        assert_eq!(SizeRange::new(0.0, 1.0, 0.25).values().len(), 5);
        assert_eq!(SizeRange::new(1.0, 1.0, 0.5).values(), vec![1.0]);
        let v = SizeRange::new(0.0, 0.3, 0.1).values();
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn starting_at_raises_floor() {
        let r = SizeRange::new(0.0, 10.0, 2.0).starting_at(3.0);
        assert_eq!(r.values(), vec![3.0, 5.0, 7.0, 9.0]);
        let r = SizeRange::new(0.0, 2.0, 1.0).starting_at(5.0);
        assert_eq!(r.values(), vec![5.0]);
    }

    #[test]
    fn invalid_range_rejected() {
        let errors = SizeRange::new(2.0, 1.0, 0.0).validate("optimisation.pv");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn range_with_too_many_steps_rejected() {
        let errors = SizeRange::new(0.0, 1e300, 1e-300).validate("optimisation.storage");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "optimisation.storage.step");
        assert!(SizeRange::new(0.0, 1e6, 1.0).validate("optimisation.pv").is_empty());
    }

    #[test]
    fn coordinate_ascent_never_repeats_a_sizing() {
        // Everything feasible: the PV line and the first trade-off line
        // both revisit the minimum-PV storage line.
        let always = SearchSpace {
            pv: SizeRange::new(1.0, 10.0, 1.0),
            storage: SizeRange::new(0.0, 10.0, 1.0),
        };
        for (space, need) in [(always, 0.5), (space(), 20.0), (space(), 8.0)] {
            for trade_off_steps in [0, 2] {
                let eval = Linear::new(need);
                let out = CoordinateAscent { trade_off_steps }
                    .search(&space, &eval)
                    .unwrap();
                let seen = eval.seen.lock().unwrap();
                let distinct = seen
                    .iter()
                    .enumerate()
                    .filter(|(i, s)| !seen[..*i].contains(*s))
                    .count();
                assert_eq!(distinct, seen.len(), "repeated sizing in {seen:?}");
                assert_eq!(out.evaluated, seen.len());
                assert!(out.best.unwrap().feasible);
            }
        }
    }

    #[test]
    fn coordinate_ascent_finds_cheapest_feasible() {
        let eval = Linear::new(8.0);
        let strategy = CoordinateAscent { trade_off_steps: 3 };
        let out = strategy.search(&space(), &eval).unwrap();
        let best = out.best.unwrap();
        assert!(best.feasible);
        // Storage is worth twice as much, so PV 0 / storage 4 is cheapest.
        assert_eq!(best.sizing, SystemSizing::new(0.0, 4.0));
        assert!(!out.interrupted);
    }

    #[test]
    fn coordinate_ascent_evaluates_less_than_grid() {
        let eval = Linear::new(8.0);
        let ca = CoordinateAscent { trade_off_steps: 1 }
            .search(&space(), &eval)
            .unwrap();
        let grid = BoundedGrid.search(&space(), &Linear::new(8.0)).unwrap();
        assert_eq!(grid.evaluated, 121);
        assert!(ca.evaluated < grid.evaluated);
        assert_eq!(
            grid.best.unwrap().sizing.total_capacity(),
            ca.best.unwrap().sizing.total_capacity()
        );
    }

    #[test]
    fn unreachable_threshold_returns_closest() {
        let eval = Linear::new(1000.0);
        let out = CoordinateAscent { trade_off_steps: 2 }
            .search(&space(), &eval)
            .unwrap();
        let best = out.best.unwrap();
        assert!(!best.feasible);
        assert_eq!(best.sizing, SystemSizing::new(10.0, 10.0));
    }

    #[test]
    fn pre_cancelled_search_evaluates_nothing() {
        let eval = Linear::new(8.0);
        eval.cancel.cancel();
        let out = BoundedGrid.search(&space(), &eval).unwrap();
        assert!(out.best.is_none());
        assert_eq!(out.evaluated, 0);
        assert!(out.interrupted);
    }

    #[test]
    fn cancellation_keeps_results_so_far() {
        let mut eval = Linear::new(8.0);
        eval.cancel_after = Some(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let out = pool
            .install(|| BoundedGrid.search(&space(), &eval))
            .unwrap();
        assert!(out.interrupted);
        assert!(out.evaluated >= 1);
        assert!(out.evaluated < 121);
        assert!(out.best.is_some());
    }

    #[test]
    fn strategy_names_parse() {
        for name in StrategyKind::NAMES {
            let kind = StrategyKind::from_name(name, 2).unwrap();
            assert_eq!(kind.build().name(), name);
        }
        assert!(StrategyKind::from_name("binary", 0).is_none());
    }
}
