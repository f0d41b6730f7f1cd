use super::types::HOURS_PER_YEAR;

/// Position of one simulated hour within the investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourSlot {
    /// Hour index from the start of the investigation (profile index).
    pub hour: usize,
    /// Year index from the start of the investigation.
    pub year: u32,
    /// Whole years elapsed since the start of the simulated window.
    pub years_elapsed: u32,
}

/// A simulation clock that walks every hour of a `[start_year, end_year)` window.
///
/// # Examples
///
/// ```
/// use minigrid_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(1, 3);
/// assert_eq!(clock.len(), 2 * 8760);
/// let first = clock.tick().unwrap();
/// assert_eq!((first.hour, first.year, first.years_elapsed), (8760, 1, 0));
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    start_year: u32,
    /// Next hour to hand out, relative to the window start.
    current: usize,
    /// Total hours in the window.
    total: usize,
}

impl Clock {
    /// Creates a clock over `[start_year, end_year)`. An inverted window is empty.
    pub fn new(start_year: u32, end_year: u32) -> Self {
        let years = end_year.saturating_sub(start_year) as usize;
        Self {
            start_year,
            current: 0,
            total: years * HOURS_PER_YEAR,
        }
    }

    /// Total hours in the window.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Profile index one past the last hour of the window.
    pub fn end_hour(&self) -> usize {
        self.start_year as usize * HOURS_PER_YEAR + self.total
    }

    /// Advances the clock by one hour.
    ///
    /// Returns `None` once every hour of the window has been handed out.
    pub fn tick(&mut self) -> Option<HourSlot> {
        if self.current >= self.total {
            return None;
        }
        let offset = self.current;
        self.current += 1;
        let years_elapsed = (offset / HOURS_PER_YEAR) as u32;
        Some(HourSlot {
            hour: self.start_year as usize * HOURS_PER_YEAR + offset,
            year: self.start_year + years_elapsed,
            years_elapsed,
        })
    }
}

impl Iterator for Clock {
    type Item = HourSlot;

    fn next(&mut self) -> Option<HourSlot> {
        self.tick()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Clock {}
