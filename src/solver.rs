//! Constraint-directed backtracking search. Slots are chosen
//! most-constrained-first via `Grid::solving_priority`, words via
//! `Grid::find_best_option`; forward checking lives in the possibility
//! matrices, which the solver (and only the solver) refreshes after every
//! `bind`/`unbind`. When the search keeps failing in one branch it escalates
//! to multi-step, non-chronological backtracks.

use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::grid::{Grid, GridError};
use crate::lexicon::Lexicon;
use crate::types::{SlotId, WordId};
use crate::util::poisson_index;

pub const DEFAULT_MAX_FAILED_WORDS: u64 = 2000;

/// After this many consecutive backtracks the search is considered stuck in
/// a bad branch and jumps back several assignments at once.
const CONSECUTIVE_BACKTRACK_LIMIT: u32 = 10;
const MAX_BACKTRACK_STEPS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub assign: u64,
    pub backtrack: u64,
    pub failed: u64,
    /// Largest number of assignments undone by a single backtrack.
    pub deepest_backtrack: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SolveSuccess {
    pub statistics: Statistics,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum SolveFailure {
    /// The failure sentinel: no filling was found within the budget. The
    /// grid may be left in a mixed state; callers should reset it.
    #[error("failure budget exhausted after {} failed words", .0.failed)]
    BudgetExceeded(Statistics),

    #[error(transparent)]
    Invariant(#[from] GridError),
}

/// One solve attempt's bookkeeping: the slots still to fill, the assignment
/// stack, and the stuck-branch detector.
struct SearchState {
    remaining: Vec<SlotId>,
    stack: Vec<(SlotId, WordId)>,
    consecutive_backtracks: u32,
}

impl SearchState {
    fn new(grid: &Grid) -> SearchState {
        SearchState {
            remaining: (0..grid.slots().len()).collect(),
            stack: Vec::with_capacity(grid.slots().len()),
            consecutive_backtracks: 0,
        }
    }

    /// Undo up to `steps` assignments, blacklisting each undone word on its
    /// slot. Returns the slot to retry next, or `None` when the stack runs
    /// dry (unsolvable within this attempt).
    fn backtrack(
        &mut self,
        grid: &mut Grid,
        lexicon: &Lexicon,
        steps: usize,
        statistics: &mut Statistics,
    ) -> Option<SlotId> {
        let mut last = None;
        let mut depth = 0;
        for _ in 0..steps {
            let Some((slot, word)) = self.stack.pop() else {
                return None;
            };
            let affected = grid.unbind(slot);
            grid.slot_mut(slot).failed_words.push(word);
            refresh(grid, lexicon, &affected);
            self.remaining.push(slot);
            statistics.backtrack += 1;
            statistics.failed += 1;
            depth += 1;
            last = Some(slot);
        }
        statistics.deepest_backtrack = statistics.deepest_backtrack.max(depth);
        last
    }
}

/// Refresh the possibility matrices of the given slots, once each.
fn refresh(grid: &mut Grid, lexicon: &Lexicon, affected: &[SlotId]) {
    let mut seen: Vec<SlotId> = Vec::with_capacity(affected.len());
    for &slot in affected {
        if !seen.contains(&slot) {
            seen.push(slot);
            grid.update_possibilities(slot, lexicon);
        }
    }
}

pub struct Solver {
    pub max_failed_words: u64,
    /// Probability in `[0, 1]` of randomising slot selection; any positive
    /// value also randomises word picks. 0 makes the search deterministic.
    pub randomize: f64,
    rng: SmallRng,
}

impl Solver {
    #[must_use]
    pub fn new(max_failed_words: u64, randomize: f64, seed: u64) -> Solver {
        Solver {
            max_failed_words,
            randomize,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Fill the grid, or return the failure sentinel once the failure budget
    /// is spent. On success every slot is bound and every crossing agrees
    /// by construction.
    pub fn solve(
        &mut self,
        grid: &mut Grid,
        lexicon: &Lexicon,
    ) -> Result<SolveSuccess, SolveFailure> {
        let t0 = Instant::now();
        let mut statistics = Statistics::default();

        grid.reset();
        grid.build_possibility_matrices(lexicon);
        let mut state = SearchState::new(grid);
        let mut current: Option<SlotId> = None;

        // Seed: bind a best word into one slot before the priority loop.
        if !state.remaining.is_empty() {
            let index = if self.randomize > 0.0 {
                self.rng.gen_range(0..state.remaining.len())
            } else {
                0
            };
            let slot = state.remaining[index];
            if let Some(word) = grid.find_best_option(slot, lexicon, self.randomize, &mut self.rng)
            {
                let affected = grid.bind(slot, word, lexicon)?;
                refresh(grid, lexicon, &affected);
                state.remaining.remove(index);
                state.stack.push((slot, word));
                statistics.assign += 1;
            }
        }

        while current.is_some() || !state.remaining.is_empty() {
            if statistics.failed > self.max_failed_words {
                statistics.elapsed = t0.elapsed();
                return Err(SolveFailure::BudgetExceeded(statistics));
            }

            let slot = match current.take() {
                Some(slot) => slot,
                None => {
                    let slot = self.select_slot(grid, lexicon, &state.remaining);
                    grid.slot_mut(slot).reset_failed_words();
                    slot
                }
            };

            match grid.find_best_option(slot, lexicon, self.randomize, &mut self.rng) {
                Some(word) => {
                    let affected = grid.bind(slot, word, lexicon)?;
                    refresh(grid, lexicon, &affected);
                    state.stack.push((slot, word));
                    state.remaining.retain(|&s| s != slot);
                    statistics.assign += 1;
                    state.consecutive_backtracks = 0;
                    if statistics.assign % 100 == 0 {
                        debug!(
                            "assigned {}, remaining {}",
                            statistics.assign,
                            state.remaining.len()
                        );
                    }
                }
                None => {
                    state.consecutive_backtracks += 1;
                    let steps = if state.consecutive_backtracks > CONSECUTIVE_BACKTRACK_LIMIT {
                        state.consecutive_backtracks = 0;
                        MAX_BACKTRACK_STEPS.min(state.stack.len()).max(1)
                    } else {
                        1
                    };
                    match state.backtrack(grid, lexicon, steps, &mut statistics) {
                        Some(slot) => current = Some(slot),
                        None => {
                            statistics.elapsed = t0.elapsed();
                            return Err(SolveFailure::BudgetExceeded(statistics));
                        }
                    }
                }
            }
        }

        #[cfg(feature = "check_invariants")]
        assert!(
            grid.check_crossings(lexicon),
            "successful fill must agree at every crossing"
        );

        statistics.elapsed = t0.elapsed();
        let score = grid.evaluate_score(lexicon);
        debug!(
            "solved: score {score}, {} assigns, {} backtracks",
            statistics.assign, statistics.backtrack
        );
        Ok(SolveSuccess { statistics, score })
    }

    /// Run `solve` repeatedly with fresh randomisation, keep the
    /// best-scoring filling, and leave it applied to the grid.
    pub fn solve_best(
        &mut self,
        grid: &mut Grid,
        lexicon: &Lexicon,
        attempts: usize,
    ) -> Result<SolveSuccess, SolveFailure> {
        let mut best: Option<(SolveSuccess, Vec<Option<WordId>>)> = None;
        let mut last_failure = None;

        for attempt in 0..attempts.max(1) {
            match self.solve(grid, lexicon) {
                Ok(success) => {
                    debug!("attempt {attempt}: score {}", success.score);
                    let is_better = best
                        .as_ref()
                        .map_or(true, |(incumbent, _)| success.score > incumbent.score);
                    if is_better {
                        best = Some((success, grid.bindings()));
                    }
                }
                Err(failure) => {
                    debug!("attempt {attempt}: {failure}");
                    last_failure = Some(failure);
                }
            }
        }

        match best {
            Some((success, bindings)) => {
                grid.restore_bindings(&bindings);
                Ok(success)
            }
            None => Err(last_failure.expect("at least one attempt runs")),
        }
    }

    /// Most-constrained slot first (stable on slot id); with probability
    /// `randomize`, a Poisson-distributed rank is taken instead of the top.
    fn select_slot(&mut self, grid: &Grid, lexicon: &Lexicon, remaining: &[SlotId]) -> SlotId {
        debug_assert!(!remaining.is_empty());
        let mut order: Vec<SlotId> = remaining.to_vec();
        order.sort_by_key(|&slot| (grid.solving_priority(slot, lexicon), slot));

        let mut rank = 0;
        if self.randomize > 0.0 && self.rng.gen::<f64>() < self.randomize {
            rank = poisson_index(&mut self.rng, order.len());
        }
        order[rank]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::alphabet;
    use crate::lexicon::{Lexicon, WordEntry};

    fn english_lexicon(labels: &[(&str, f32)]) -> Lexicon {
        let entries = labels
            .iter()
            .enumerate()
            .map(|(i, &(label, score))| WordEntry::new(label, "", i as i64, Some(score)));
        Lexicon::build(alphabet("en").unwrap(), entries).unwrap()
    }

    #[test]
    fn test_multi_step_backtrack_unwinds_and_blacklists() {
        let lex = english_lexicon(&[("abc", 0.0), ("bcd", 0.0)]);
        let mut grid = Grid::from_grid("X_X\n___\nX_X").unwrap();
        grid.build_possibility_matrices(&lex);

        let mut state = SearchState::new(&grid);
        for slot in [0, 1] {
            let affected = grid.bind(slot, 0, &lex).unwrap();
            refresh(&mut grid, &lex, &affected);
            state.stack.push((slot, 0));
            state.remaining.retain(|&s| s != slot);
        }

        let mut statistics = Statistics::default();
        let next = state.backtrack(&mut grid, &lex, 2, &mut statistics);

        assert_eq!(next, Some(0), "deepest undone slot is retried next");
        assert!(grid.slot(0).occupied_by.is_none());
        assert!(grid.slot(1).occupied_by.is_none());
        assert_eq!(grid.slot(0).failed_words, vec![0]);
        assert_eq!(grid.slot(1).failed_words, vec![0]);
        assert_eq!(statistics.backtrack, 2);
        assert_eq!(statistics.failed, 2);
        assert_eq!(statistics.deepest_backtrack, 2);
        assert_eq!(state.remaining, vec![1, 0]);
    }

    #[test]
    fn test_backtrack_on_empty_stack_signals_unsolvable() {
        let lex = english_lexicon(&[("abc", 0.0)]);
        let mut grid = Grid::from_grid("___").unwrap();
        grid.build_possibility_matrices(&lex);

        let mut state = SearchState::new(&grid);
        let mut statistics = Statistics::default();
        assert_eq!(state.backtrack(&mut grid, &lex, 1, &mut statistics), None);
        assert_eq!(statistics.backtrack, 0);
    }

    #[test]
    fn test_escalated_steps_are_capped_by_stack_depth() {
        let lex = english_lexicon(&[("abc", 0.0), ("bcd", 0.0)]);
        let mut grid = Grid::from_grid("X_X\n___\nX_X").unwrap();
        grid.build_possibility_matrices(&lex);

        let mut state = SearchState::new(&grid);
        let affected = grid.bind(0, 0, &lex).unwrap();
        refresh(&mut grid, &lex, &affected);
        state.stack.push((0, 0));
        state.remaining.retain(|&s| s != 0);

        // Ask for more steps than the stack holds; only one can happen.
        let mut statistics = Statistics::default();
        let steps = MAX_BACKTRACK_STEPS.min(state.stack.len()).max(1);
        assert_eq!(steps, 1);
        let next = state.backtrack(&mut grid, &lex, steps, &mut statistics);
        assert_eq!(next, Some(0));
        assert_eq!(statistics.deepest_backtrack, 1);
    }
}
