//! Multi-period capacity optimisation.
//!
//! Each iteration period searches for the smallest system that meets the
//! threshold, starting from the capacities left by the previous period.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::devices::BatteryState;
use crate::error::{ConfigError, Error};
use crate::sim::engine::Simulator;
use crate::sim::kpi::TraceSummary;
use crate::sim::types::{HOURS_PER_YEAR, SimulationTrace, SystemSizing};

pub mod cancel;
pub mod criteria;
pub mod search;

pub use cancel::CancelFlag;
pub use criteria::{Criterion, Direction, Threshold};
pub use search::{
    BoundedGrid, Candidate, CoordinateAscent, Evaluate, SearchOutcome, SearchSpace,
    SearchStrategy, SizeRange, StrategyKind,
};

/// How an iteration's starting capacities follow from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Start from the previous iteration's degraded capacities.
    #[default]
    CarryForward,
    /// Start from the previous iteration's installed capacities (equipment
    /// replaced at the end of each period).
    RefreshToInitial,
}

/// Typed optimisation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimisationSettings {
    /// First year of the first iteration.
    pub start_year: u32,
    /// Years per iteration period.
    pub iteration_length: u32,
    /// Number of iteration periods.
    pub iterations: u32,
    pub pv: SizeRange,
    pub storage: SizeRange,
    pub threshold: Threshold,
    pub objective: Criterion,
    pub strategy: StrategyKind,
    pub policy: SizingPolicy,
}

impl OptimisationSettings {
    /// Year after the last iteration ends.
    pub fn end_year(&self) -> u32 {
        self.start_year + self.iteration_length * self.iterations
    }

    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.iteration_length == 0 {
            errors.push(ConfigError::new(
                "optimisation.iteration_length",
                "must be >= 1",
            ));
        }
        if self.iterations == 0 {
            errors.push(ConfigError::new("optimisation.iterations", "must be >= 1"));
        }
        errors.extend(self.pv.validate("optimisation.pv"));
        errors.extend(self.storage.validate("optimisation.storage"));
        if !self.threshold.value.is_finite() {
            errors.push(ConfigError::new(
                "optimisation.threshold.value",
                "must be a finite number",
            ));
        }
        errors
    }
}

/// Outcome of one iteration period.
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    /// Zero-based iteration number.
    pub index: u32,
    pub start_year: u32,
    pub end_year: u32,
    /// Capacities installed for the period.
    pub initial_sizing: SystemSizing,
    /// Degraded capacities at the end of the period, with derived diesel.
    pub final_sizing: SystemSizing,
    pub summary: TraceSummary,
    /// Value of the threshold criterion for the chosen system.
    pub threshold_metric: f64,
    /// Value of the optimisation criterion for the chosen system.
    pub objective_value: f64,
    /// How far the chosen system misses the threshold, if it does.
    pub shortfall: Option<f64>,
    /// Number of candidate systems simulated.
    pub candidates_evaluated: usize,
    /// Whether cancellation cut this iteration's search short.
    pub interrupted: bool,
    /// Battery after the period's final hour.
    #[serde(skip)]
    pub final_battery: BatteryState,
    /// Hourly records of the chosen system.
    #[serde(skip)]
    pub trace: SimulationTrace,
}

impl IterationResult {
    pub fn meets_threshold(&self) -> bool {
        self.shortfall.is_none()
    }
}

/// Ordered iteration results of a whole optimisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimisationResult {
    pub iterations: Vec<IterationResult>,
    /// Whether the run was cancelled before every iteration completed.
    pub cancelled: bool,
}

/// Scores candidate sizings for one iteration window.
struct WindowEvaluator<'s, 'a> {
    simulator: &'s Simulator<'a>,
    start_year: u32,
    end_year: u32,
    initial_stored_kwh: Option<f64>,
    threshold: Threshold,
    objective: Criterion,
    cancel: &'s CancelFlag,
}

impl Evaluate for WindowEvaluator<'_, '_> {
    fn evaluate(&self, sizing: &SystemSizing) -> Result<Candidate, Error> {
        let outcome =
            self.simulator
                .run(sizing, self.start_year, self.end_year, self.initial_stored_kwh)?;
        let threshold_metric = self
            .threshold
            .criterion
            .evaluate(&outcome.summary, &outcome.initial_sizing);
        let objective = self
            .objective
            .evaluate(&outcome.summary, &outcome.initial_sizing);
        let feasible = self.threshold.is_met(threshold_metric);
        debug!(
            pv_kwp = sizing.pv_kwp,
            storage_kwh = sizing.storage_kwh,
            threshold_metric,
            objective,
            feasible,
            "candidate evaluated"
        );
        Ok(Candidate {
            sizing: outcome.initial_sizing,
            final_sizing: outcome.final_sizing,
            summary: outcome.summary,
            threshold_metric,
            objective,
            feasible,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn objective(&self) -> Criterion {
        self.objective
    }

    fn threshold_criterion(&self) -> Criterion {
        self.threshold.criterion
    }
}

/// Drives the search across successive iteration periods.
pub struct Optimiser<'a> {
    simulator: Simulator<'a>,
    settings: OptimisationSettings,
    strategy: Box<dyn SearchStrategy>,
    cancel: CancelFlag,
}

impl<'a> Optimiser<'a> {
    /// Creates an optimiser, checking settings and profile coverage up front.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings and
    /// [`Error::ProfileTooShort`] if the profiles end before the last iteration.
    pub fn new(
        simulator: Simulator<'a>,
        settings: OptimisationSettings,
        cancel: CancelFlag,
    ) -> Result<Self, Error> {
        Error::check(settings.validate())?;
        simulator
            .profiles()
            .ensure_covers(settings.end_year() as usize * HOURS_PER_YEAR)?;
        Ok(Self {
            simulator,
            strategy: settings.strategy.build(),
            settings,
            cancel,
        })
    }

    /// Replaces the search strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn SearchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn settings(&self) -> &OptimisationSettings {
        &self.settings
    }

    /// Runs every iteration period in order.
    ///
    /// An unreachable threshold never fails: the closest system found is kept
    /// and its shortfall recorded. After cancellation the iterations finished
    /// so far, plus the best result of the interrupted one, are returned.
    ///
    /// # Errors
    ///
    /// Only simulation setup errors propagate.
    pub fn run(&self) -> Result<OptimisationResult, Error> {
        let s = &self.settings;
        let mut result = OptimisationResult::default();
        let mut floor = SystemSizing::new(s.pv.min, s.storage.min);
        let mut carried_stored: Option<f64> = None;

        for index in 0..s.iterations {
            let start_year = s.start_year + index * s.iteration_length;
            let end_year = start_year + s.iteration_length;
            let space = SearchSpace {
                pv: s.pv.starting_at(floor.pv_kwp),
                storage: s.storage.starting_at(floor.storage_kwh),
            };
            let evaluator = WindowEvaluator {
                simulator: &self.simulator,
                start_year,
                end_year,
                initial_stored_kwh: carried_stored,
                threshold: s.threshold,
                objective: s.objective,
                cancel: &self.cancel,
            };

            info!(
                iteration = index,
                start_year,
                end_year,
                strategy = self.strategy.name(),
                min_pv_kwp = space.pv.min,
                min_storage_kwh = space.storage.min,
                "iteration search started"
            );
            let outcome = self.strategy.search(&space, &evaluator)?;
            let Some(best) = outcome.best else {
                warn!(iteration = index, "optimisation cancelled before any candidate ran");
                result.cancelled = true;
                break;
            };

            // Candidates keep only summaries; re-run the winner for its trace.
            let chosen = self
                .simulator
                .run(&best.sizing, start_year, end_year, carried_stored)?;
            let shortfall = s.threshold.shortfall(best.threshold_metric);
            if let Some(shortfall) = shortfall {
                warn!(
                    iteration = index,
                    criterion = %s.threshold.criterion,
                    metric = best.threshold_metric,
                    target = s.threshold.value,
                    shortfall,
                    "threshold not reached within size bounds"
                );
            }
            info!(
                iteration = index,
                pv_kwp = best.sizing.pv_kwp,
                storage_kwh = best.sizing.storage_kwh,
                diesel_kw = chosen.final_sizing.diesel_kw,
                objective = best.objective,
                candidates = outcome.evaluated,
                "iteration sizing chosen"
            );

            floor = match s.policy {
                SizingPolicy::CarryForward => chosen.final_sizing,
                SizingPolicy::RefreshToInitial => chosen.initial_sizing,
            };
            carried_stored = Some(chosen.final_battery.stored_kwh);

            result.iterations.push(IterationResult {
                index,
                start_year,
                end_year,
                initial_sizing: chosen.initial_sizing,
                final_sizing: chosen.final_sizing,
                summary: chosen.summary,
                threshold_metric: best.threshold_metric,
                objective_value: best.objective,
                shortfall,
                candidates_evaluated: outcome.evaluated,
                interrupted: outcome.interrupted,
                final_battery: chosen.final_battery,
                trace: chosen.trace,
            });

            if outcome.interrupted {
                warn!(iteration = index, "optimisation cancelled, keeping best so far");
                result.cancelled = true;
                break;
            }
        }
        Ok(result)
    }
}
