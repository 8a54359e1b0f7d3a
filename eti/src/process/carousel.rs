use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// FIBs per CIF outside transmission mode 3.
pub const DEFAULT_FIB_COUNT: usize = 3;

/// Cells of the fill bar, each standing for two bytes.
pub const FILL_BAR_CELLS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigOccurrence {
    pub fig_type: u8,
    pub extension: u8,
    pub length: usize,
}

/// FIG occurrences per FIB, in the order they were seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carousel {
    fibs: Vec<Vec<FigOccurrence>>,
}

impl Default for Carousel {
    fn default() -> Self {
        Self {
            fibs: vec![Vec::new(); DEFAULT_FIB_COUNT],
        }
    }
}

impl Carousel {
    /// Appends an occurrence. FIB indices past the table grow it, which
    /// happens with the fourth FIB of mode 3.
    pub fn record(&mut self, fib: usize, occurrence: FigOccurrence) {
        if fib >= self.fibs.len() {
            self.fibs.resize_with(fib + 1, Vec::new);
        }
        self.fibs[fib].push(occurrence);
    }

    pub fn fibs(&self) -> &[Vec<FigOccurrence>] {
        &self.fibs
    }

    pub fn is_empty(&self) -> bool {
        self.fibs.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.fibs.clear();
        self.fibs.resize_with(DEFAULT_FIB_COUNT, Vec::new);
    }

    pub fn summarize(&self) -> CarouselSummary {
        let fibs = self
            .fibs
            .iter()
            .enumerate()
            .map(|(index, figs)| {
                let total_bytes = figs.iter().map(|f| f.length).sum();
                FibSummary {
                    index,
                    figs: figs.clone(),
                    total_bytes,
                    fill: fill_bar(total_bytes),
                }
            })
            .collect();

        CarouselSummary { fibs }
    }
}

fn fill_bar(total_bytes: usize) -> String {
    (0..FILL_BAR_CELLS)
        .map(|i| if 2 * i < total_bytes { '#' } else { '-' })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibSummary {
    pub index: usize,
    pub figs: Vec<FigOccurrence>,
    pub total_bytes: usize,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselSummary {
    pub fibs: Vec<FibSummary>,
}

impl Display for FibSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} ", self.index)?;
        for fig in &self.figs {
            write!(f, "{}/{:02} ({:2}) ", fig.fig_type, fig.extension, fig.length)?;
        }

        let width = 7 + 10 * self.figs.len();
        write!(f, " {:pad$}|{}| ]", "", self.fill, pad = 60usize.saturating_sub(width))
    }
}

impl Display for CarouselSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("FIC ")?;
        for fib in &self.fibs {
            write!(f, "{fib}   ")?;
        }
        Ok(())
    }
}

/// Per-FIB totals of one FIG type and extension over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigTotals {
    pub fig_type: u8,
    pub extension: u8,
    pub count: u64,
    pub bytes: u64,
}

/// Run-wide FIG statistics folded from the per-frame carousels.
///
/// Memory is bounded by the number of distinct FIG types, not by the
/// length of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarouselTally {
    frames: u64,
    fibs: Vec<BTreeMap<(u8, u8), FigTotals>>,
}

impl CarouselTally {
    pub fn add(&mut self, carousel: &Carousel) {
        self.frames += 1;
        if self.fibs.len() < carousel.fibs.len() {
            self.fibs.resize_with(carousel.fibs.len(), BTreeMap::new);
        }

        for (fib, occurrences) in carousel.fibs.iter().enumerate() {
            for occurrence in occurrences {
                let totals = self.fibs[fib]
                    .entry((occurrence.fig_type, occurrence.extension))
                    .or_insert(FigTotals {
                        fig_type: occurrence.fig_type,
                        extension: occurrence.extension,
                        count: 0,
                        bytes: 0,
                    });
                totals.count += 1;
                totals.bytes += occurrence.length as u64;
            }
        }
    }

    /// Frames folded in so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.fibs.iter().all(BTreeMap::is_empty)
    }

    pub fn summarize(&self) -> TallySummary {
        let fibs = self
            .fibs
            .iter()
            .enumerate()
            .map(|(index, figs)| {
                let bytes: u64 = figs.values().map(|f| f.bytes).sum();
                let mean_bytes = bytes.checked_div(self.frames).unwrap_or(0) as usize;
                FibTotals {
                    index,
                    figs: figs.values().copied().collect(),
                    mean_bytes,
                    fill: fill_bar(mean_bytes),
                }
            })
            .collect();

        TallySummary {
            frames: self.frames,
            fibs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibTotals {
    pub index: usize,
    /// Ordered by type, then extension.
    pub figs: Vec<FigTotals>,
    /// FIG bytes per frame, averaged over the run.
    pub mean_bytes: usize,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySummary {
    pub frames: u64,
    pub fibs: Vec<FibTotals>,
}

impl Display for FibTotals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} ", self.index)?;
        for fig in &self.figs {
            write!(f, "{}/{:02} x{} ", fig.fig_type, fig.extension, fig.count)?;
        }
        write!(f, "|{}| {:2} bytes/frame ]", self.fill, self.mean_bytes)
    }
}

impl Display for TallySummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FIC over {} frames", self.frames)?;
        for fib in &self.fibs {
            write!(f, "\n  {fib}")?;
        }
        Ok(())
    }
}
