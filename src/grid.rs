//! The puzzle itself: slots (maximal runs of open cells), crossings (shared
//! cells between perpendicular slots), and the grid arena that owns both.
//! Slots and crossings reference each other by index, so snapshotting a grid
//! is just cloning two vectors.
//!
//! The grid also owns each slot's possibility matrix, a dense
//! `|crossings| x |alphabet|` table where row `c`, column `k` counts the
//! words still bindable to the slot that would impose letter `k` at crossing
//! `c`. The solver decides when rows are refreshed; `bind`/`unbind` only
//! report which slots went stale.

use fancy_regex::Regex;
use float_ord::FloatOrd;
use lazy_static::lazy_static;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lexicon::Lexicon;
use crate::pattern::{LetterTuple, Mask};
use crate::types::{CrossingId, GlyphId, SlotId, WordId};
use crate::util::{percentile, poisson_index};
use crate::MAX_SLOT_LENGTH;

/// Candidate sets larger than this are pruned to the top viability
/// percentile before a word is picked.
const SHORTLIST_THRESHOLD: usize = 30;
const SHORTLIST_PERCENTILE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("slots {0} and {1} intersect in more than one cell")]
    NonEuclidean(String, String),

    #[error("slots {0} and {1} do not intersect")]
    Incoherent(String, String),

    #[error("crossing requires one horizontal and one vertical slot, got two {0} slots")]
    SameDirection(Direction),

    #[error("duplicate crossing at cell ({0}, {1})")]
    DuplicateCrossing(u16, u16),

    #[error("word of length {word_len} cannot fill slot {slot} of length {slot_len}")]
    LengthMismatch {
        slot: String,
        slot_len: usize,
        word_len: usize,
    },

    #[error("slot length {0} is outside the supported range [2, 32]")]
    BadSlotLength(usize),

    #[error("bitmap of {got} cells does not cover a {width}x{height} grid")]
    BitmapSize {
        width: usize,
        height: usize,
        got: usize,
    },
}

/// One entry of the grid. Cell coordinates are 1-based, `(x, y)`.
#[derive(Debug, Clone)]
pub struct Slot {
    pub id: SlotId,
    pub start: (u16, u16),
    pub length: usize,
    pub direction: Direction,
    /// Crossing ids in insertion order; this order also indexes the rows of
    /// the possibility matrix.
    pub crossings: Vec<CrossingId>,
    pub occupied_by: Option<WordId>,
    /// Words attempted and rolled back here since the last reset, in
    /// insertion order.
    pub failed_words: Vec<WordId>,
    /// Row-major `crossings.len() x |alphabet|`.
    possibility_matrix: Vec<u32>,
}

impl Slot {
    fn new(id: SlotId, start: (u16, u16), length: usize, direction: Direction) -> Slot {
        Slot {
            id,
            start,
            length,
            direction,
            crossings: Vec::new(),
            occupied_by: None,
            failed_words: Vec::new(),
            possibility_matrix: Vec::new(),
        }
    }

    /// The cells this slot passes through, in position order.
    pub fn cells(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        let (x0, y0) = self.start;
        (0..self.length as u16).map(move |i| match self.direction {
            Direction::Horizontal => (x0 + i, y0),
            Direction::Vertical => (x0, y0 + i),
        })
    }

    #[must_use]
    pub fn contains(&self, cell: (u16, u16)) -> bool {
        self.cell_index(cell).is_some()
    }

    /// 0-based position of `cell` within the slot, if the slot covers it.
    #[must_use]
    pub fn cell_index(&self, cell: (u16, u16)) -> Option<usize> {
        self.cells().position(|c| c == cell)
    }

    /// Stable identifier, e.g. `horizontal_1_3_5`.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.direction, self.start.0, self.start.1, self.length
        )
    }

    pub fn reset_failed_words(&mut self) {
        self.failed_words.clear();
    }

    /// The matrix row index of a crossing registered on this slot.
    #[must_use]
    pub fn row_of(&self, crossing: CrossingId) -> Option<usize> {
        self.crossings.iter().position(|&c| c == crossing)
    }

    fn possibility_row(&self, row: usize, width: usize) -> &[u32] {
        &self.possibility_matrix[row * width..(row + 1) * width]
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Slot) -> bool {
        self.start == other.start
            && self.length == other.length
            && self.direction == other.direction
    }
}

impl Eq for Slot {}

impl std::hash::Hash for Slot {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.start, self.length, self.direction).hash(state);
    }
}

/// The shared cell between a horizontal and a vertical slot. Identity is the
/// cell; a pair of slots can cross at most once.
#[derive(Debug, Clone)]
pub struct Crossing {
    pub id: CrossingId,
    pub horizontal: SlotId,
    pub vertical: SlotId,
    pub cell: (u16, u16),
    pub index_in_horizontal: usize,
    pub index_in_vertical: usize,
}

impl Crossing {
    /// The slot on the other side of the crossing.
    #[must_use]
    pub fn other(&self, slot: SlotId) -> SlotId {
        if slot == self.horizontal {
            self.vertical
        } else {
            debug_assert_eq!(slot, self.vertical);
            self.horizontal
        }
    }

    /// 0-based position of the shared cell within the given slot.
    #[must_use]
    pub fn index_in(&self, slot: SlotId) -> usize {
        if slot == self.horizontal {
            self.index_in_horizontal
        } else {
            debug_assert_eq!(slot, self.vertical);
            self.index_in_vertical
        }
    }
}

/// JSON form of a grid, as exchanged with the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridJson {
    pub width: usize,
    pub height: usize,
    pub word_spaces: Vec<WordSpaceJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordSpaceJson {
    pub start: (u16, u16),
    pub length: usize,
    pub direction: Direction,
    pub occupied_by: Option<Vec<String>>,
    pub meaning: Option<String>,
}

lazy_static! {
    static ref NON_GRID_CHARS: Regex =
        Regex::new(r"[^_X ]").expect("static pattern compiles");
}

#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    slots: Vec<Slot>,
    crossings: Vec<Crossing>,
}

impl Grid {
    /// Parse a grid template: one line per row, `_` or space for an open
    /// cell, `X` for a blocked one. Any other character is stripped first;
    /// short rows are padded with blocked cells on the right.
    pub fn from_grid(source: &str) -> Result<Grid, GridError> {
        let rows: Vec<Vec<bool>> = source
            .lines()
            .map(|line| {
                NON_GRID_CHARS
                    .replace_all(line, "")
                    .chars()
                    .map(|ch| ch != 'X')
                    .collect()
            })
            .collect();
        Grid::from_cells(&rows)
    }

    /// Parse the envelope form: a row-major bitmap of `width * height`
    /// cells with the same per-character rules as the template form.
    pub fn from_bitmap(width: usize, height: usize, bitmap: &str) -> Result<Grid, GridError> {
        let cells: Vec<bool> = bitmap
            .chars()
            .filter(|ch| matches!(ch, '_' | 'X' | ' '))
            .map(|ch| ch != 'X')
            .collect();
        if cells.len() != width * height {
            return Err(GridError::BitmapSize {
                width,
                height,
                got: cells.len(),
            });
        }
        let rows: Vec<Vec<bool>> = cells.chunks(width.max(1)).map(<[bool]>::to_vec).collect();
        Grid::from_cells(&rows)
    }

    /// Rebuild the structural grid described by a JSON document, ignoring
    /// any filling it carries.
    pub fn from_json(doc: &GridJson) -> Result<Grid, GridError> {
        let specs: Vec<((u16, u16), usize, Direction)> = doc
            .word_spaces
            .iter()
            .map(|ws| (ws.start, ws.length, ws.direction))
            .collect();
        Grid::assemble(doc.width, doc.height, &specs)
    }

    /// `true` = open cell. Extracts every maximal horizontal and vertical
    /// run of length >= 2, horizontals first in reading order, then wires up
    /// the crossings.
    fn from_cells(rows: &[Vec<bool>]) -> Result<Grid, GridError> {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let open = |x: usize, y: usize| rows[y].get(x).copied().unwrap_or(false);

        let mut specs: Vec<((u16, u16), usize, Direction)> = Vec::new();
        for y in 0..height {
            let mut run = 0;
            for x in 0..=width {
                if x < width && open(x, y) {
                    run += 1;
                } else {
                    if run >= 2 {
                        let x0 = (x - run + 1) as u16;
                        specs.push(((x0, y as u16 + 1), run, Direction::Horizontal));
                    }
                    run = 0;
                }
            }
        }
        for x in 0..width {
            let mut run = 0;
            for y in 0..=height {
                if y < height && open(x, y) {
                    run += 1;
                } else {
                    if run >= 2 {
                        let y0 = (y - run + 1) as u16;
                        specs.push(((x as u16 + 1, y0), run, Direction::Vertical));
                    }
                    run = 0;
                }
            }
        }

        Grid::assemble(width, height, &specs)
    }

    /// Build a grid from explicit slot descriptions and derive the
    /// crossings between every intersecting horizontal/vertical pair.
    fn assemble(
        width: usize,
        height: usize,
        specs: &[((u16, u16), usize, Direction)],
    ) -> Result<Grid, GridError> {
        let mut grid = Grid {
            width,
            height,
            slots: Vec::with_capacity(specs.len()),
            crossings: Vec::new(),
        };
        for &(start, length, direction) in specs {
            if length < 2 || length > MAX_SLOT_LENGTH {
                return Err(GridError::BadSlotLength(length));
            }
            let id = grid.slots.len();
            grid.slots.push(Slot::new(id, start, length, direction));
        }

        let horizontals: Vec<SlotId> = grid.ids_of(Direction::Horizontal);
        let verticals: Vec<SlotId> = grid.ids_of(Direction::Vertical);
        for &h in &horizontals {
            for &v in &verticals {
                let shared = grid.shared_cells(h, v);
                match shared.len() {
                    0 => {}
                    1 => {
                        grid.add_crossing(h, v)?;
                    }
                    _ => {
                        return Err(GridError::NonEuclidean(
                            grid.slots[h].key(),
                            grid.slots[v].key(),
                        ))
                    }
                }
            }
        }
        Ok(grid)
    }

    fn ids_of(&self, direction: Direction) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|slot| slot.direction == direction)
            .map(|slot| slot.id)
            .collect()
    }

    fn shared_cells(&self, a: SlotId, b: SlotId) -> Vec<(u16, u16)> {
        self.slots[a]
            .cells()
            .filter(|&cell| self.slots[b].contains(cell))
            .collect()
    }

    /// Create the crossing between two slots and register it on both sides.
    pub fn add_crossing(&mut self, a: SlotId, b: SlotId) -> Result<CrossingId, GridError> {
        let (h, v) = match (self.slots[a].direction, self.slots[b].direction) {
            (Direction::Horizontal, Direction::Vertical) => (a, b),
            (Direction::Vertical, Direction::Horizontal) => (b, a),
            (direction, _) => return Err(GridError::SameDirection(direction)),
        };

        let shared = self.shared_cells(h, v);
        let cell = match shared.len() {
            0 => {
                return Err(GridError::Incoherent(
                    self.slots[h].key(),
                    self.slots[v].key(),
                ))
            }
            1 => shared[0],
            _ => {
                return Err(GridError::NonEuclidean(
                    self.slots[h].key(),
                    self.slots[v].key(),
                ))
            }
        };
        for &side in &[h, v] {
            let duplicate = self.slots[side]
                .crossings
                .iter()
                .any(|&c| self.crossings[c].cell == cell);
            if duplicate {
                return Err(GridError::DuplicateCrossing(cell.0, cell.1));
            }
        }

        let id = self.crossings.len();
        self.crossings.push(Crossing {
            id,
            horizontal: h,
            vertical: v,
            cell,
            index_in_horizontal: self.slots[h]
                .cell_index(cell)
                .expect("shared cell lies on the horizontal slot"),
            index_in_vertical: self.slots[v]
                .cell_index(cell)
                .expect("shared cell lies on the vertical slot"),
        });
        self.slots[h].crossings.push(id);
        self.slots[v].crossings.push(id);
        Ok(id)
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id]
    }

    #[must_use]
    pub fn crossings(&self) -> &[Crossing] {
        &self.crossings
    }

    #[must_use]
    pub fn crossing(&self, id: CrossingId) -> &Crossing {
        &self.crossings[id]
    }

    /// Clear every slot's binding and failed-word set. Topology and
    /// matrices' storage stay.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.occupied_by = None;
            slot.failed_words.clear();
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.slots.iter().all(|slot| slot.occupied_by.is_some())
    }

    /// Sum of bound words' scores, skipping unscored (NaN) words.
    #[must_use]
    pub fn evaluate_score(&self, lexicon: &Lexicon) -> f64 {
        self.slots
            .iter()
            .filter_map(|slot| slot.occupied_by)
            .map(|word| lexicon.word(word).score)
            .filter(|score| !score.is_nan())
            .map(f64::from)
            .sum()
    }

    /// The letter forced at a crossing's cell by whichever side is bound.
    #[must_use]
    pub fn bound_value(&self, crossing: CrossingId, lexicon: &Lexicon) -> Option<GlyphId> {
        let c = &self.crossings[crossing];
        if let Some(word) = self.slots[c.horizontal].occupied_by {
            return Some(lexicon.glyph_at(word, c.index_in_horizontal));
        }
        if let Some(word) = self.slots[c.vertical].occupied_by {
            return Some(lexicon.glyph_at(word, c.index_in_vertical));
        }
        None
    }

    fn is_unbound(&self, crossing: CrossingId) -> bool {
        let c = &self.crossings[crossing];
        self.slots[c.horizontal].occupied_by.is_none()
            && self.slots[c.vertical].occupied_by.is_none()
    }

    #[must_use]
    pub fn is_fully_bound(&self, crossing: CrossingId) -> bool {
        let c = &self.crossings[crossing];
        self.slots[c.horizontal].occupied_by.is_some()
            && self.slots[c.vertical].occupied_by.is_some()
    }

    #[must_use]
    pub fn is_half_bound(&self, crossing: CrossingId) -> bool {
        !self.is_unbound(crossing) && !self.is_fully_bound(crossing)
    }

    /// The pattern already forced on a slot by the words bound at its
    /// crossings: mask positions ascending, letters in the same order.
    #[must_use]
    pub fn mask_current(&self, slot: SlotId, lexicon: &Lexicon) -> (Mask, LetterTuple) {
        let length = self.slots[slot].length;
        let mut fixed: Vec<Option<GlyphId>> = vec![None; length];
        for &crossing in &self.slots[slot].crossings {
            if let Some(glyph) = self.bound_value(crossing, lexicon) {
                fixed[self.crossings[crossing].index_in(slot)] = Some(glyph);
            }
        }

        let mut mask = Mask::empty(length);
        let mut letters = LetterTuple::new();
        for (pos, glyph) in fixed.iter().enumerate() {
            if let Some(glyph) = glyph {
                mask.set(pos);
                letters.push(*glyph);
            }
        }
        (mask, letters)
    }

    /// Word ids currently fillable into the slot: matching the forced
    /// pattern and not on the slot's failed list. Ascending by id.
    #[must_use]
    pub fn bindable(&self, slot: SlotId, lexicon: &Lexicon) -> Vec<WordId> {
        let (mask, letters) = self.mask_current(slot, lexicon);
        lexicon
            .matching_excluding(mask, &letters, &self.slots[slot].failed_words)
            .unwrap_or_default()
    }

    /// Allocate every slot's possibility matrix and fill it in.
    pub fn build_possibility_matrices(&mut self, lexicon: &Lexicon) {
        let width = lexicon.alphabet().len();
        for slot in &mut self.slots {
            slot.possibility_matrix = vec![0; slot.crossings.len() * width];
        }
        for slot in 0..self.slots.len() {
            self.update_possibilities(slot, lexicon);
        }
    }

    /// Recompute the slot's matrix rows from its current pattern and failed
    /// list. A bound slot imposes letters at every crossing, so it has
    /// nothing to recompute.
    pub fn update_possibilities(&mut self, slot: SlotId, lexicon: &Lexicon) {
        if self.slots[slot].occupied_by.is_some() {
            return;
        }
        let candidates = self.bindable(slot, lexicon);
        let width = lexicon.alphabet().len();

        let rows: Vec<Vec<u32>> = self.slots[slot]
            .crossings
            .iter()
            .map(|&crossing| {
                lexicon.letter_histogram(&candidates, self.crossings[crossing].index_in(slot))
            })
            .collect();

        let matrix = &mut self.slots[slot].possibility_matrix;
        for (row, histogram) in rows.into_iter().enumerate() {
            matrix[row * width..(row + 1) * width].copy_from_slice(&histogram);
        }
    }

    /// Most-constrained-variable heuristic on bottleneck crossings: the
    /// minimum over unbound crossings of the best letter support the
    /// neighbour can still offer there. 0 means "must fill now".
    #[must_use]
    pub fn solving_priority(&self, slot: SlotId, lexicon: &Lexicon) -> u32 {
        let width = lexicon.alphabet().len();
        self.slots[slot]
            .crossings
            .iter()
            .filter(|&&crossing| self.is_unbound(crossing))
            .map(|&crossing| {
                let neighbour = self.crossings[crossing].other(slot);
                let row = self.slots[neighbour]
                    .row_of(crossing)
                    .expect("crossing is registered on both slots");
                self.slots[neighbour]
                    .possibility_row(row, width)
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(0)
            })
            .min()
            .unwrap_or(0)
    }

    /// Pick the best word for a slot, or `None` if every candidate would
    /// wipe out a neighbour. Candidates are scored by summing, over each
    /// not-fully-bound crossing, the neighbour's remaining support for the
    /// letter the candidate would impose there; any zero support rejects the
    /// candidate outright. Large candidate sets are pruned to the top
    /// viability percentile, ties break on word score, then on word id.
    pub fn find_best_option<R: Rng>(
        &self,
        slot: SlotId,
        lexicon: &Lexicon,
        randomize: f64,
        rng: &mut R,
    ) -> Option<WordId> {
        let width = lexicon.alphabet().len();
        let candidates = self.bindable(slot, lexicon);
        if candidates.is_empty() {
            return None;
        }

        // (position in this slot, neighbour's matrix row) per open crossing.
        let contributions: Vec<(usize, &[u32])> = self.slots[slot]
            .crossings
            .iter()
            .filter(|&&crossing| !self.is_fully_bound(crossing))
            .map(|&crossing| {
                let neighbour = self.crossings[crossing].other(slot);
                let row = self.slots[neighbour]
                    .row_of(crossing)
                    .expect("crossing is registered on both slots");
                (
                    self.crossings[crossing].index_in(slot),
                    self.slots[neighbour].possibility_row(row, width),
                )
            })
            .collect();

        let mut viable: Vec<(WordId, u64)> = Vec::with_capacity(candidates.len());
        'words: for word in candidates {
            let mut viability: u64 = 0;
            for &(position, row) in &contributions {
                let support = row[usize::from(lexicon.glyph_at(word, position))];
                if support == 0 {
                    continue 'words;
                }
                viability += u64::from(support);
            }
            viable.push((word, viability));
        }
        if viable.is_empty() {
            return None;
        }

        if viable.len() > SHORTLIST_THRESHOLD {
            let mut scores: Vec<u64> = viable.iter().map(|&(_, v)| v).collect();
            scores.sort_unstable();
            let cutoff = percentile(&scores, SHORTLIST_PERCENTILE);
            viable.retain(|&(_, v)| v >= cutoff);
        }

        viable.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| {
                    FloatOrd(lexicon.word(b.0).score_or_zero())
                        .cmp(&FloatOrd(lexicon.word(a.0).score_or_zero()))
                })
                .then_with(|| a.0.cmp(&b.0))
        });

        let pick = if randomize > 0.0 {
            poisson_index(rng, viable.len())
        } else {
            0
        };
        Some(viable[pick].0)
    }

    /// Bind a word to a slot. Returns the neighbours reachable through
    /// crossings that were unbound until now; their matrices are stale and
    /// the caller must refresh them.
    pub fn bind(
        &mut self,
        slot: SlotId,
        word: WordId,
        lexicon: &Lexicon,
    ) -> Result<Vec<SlotId>, GridError> {
        let word_len = lexicon.word(word).len();
        if word_len != self.slots[slot].length {
            return Err(GridError::LengthMismatch {
                slot: self.slots[slot].key(),
                slot_len: self.slots[slot].length,
                word_len,
            });
        }
        let affected: Vec<SlotId> = self.slots[slot]
            .crossings
            .iter()
            .filter(|&&crossing| self.is_unbound(crossing))
            .map(|&crossing| self.crossings[crossing].other(slot))
            .collect();
        self.slots[slot].occupied_by = Some(word);
        Ok(affected)
    }

    /// Remove a slot's binding. Returns the slot itself plus every
    /// previously fed neighbour, all of which are now stale.
    pub fn unbind(&mut self, slot: SlotId) -> Vec<SlotId> {
        self.slots[slot].occupied_by = None;
        let mut affected = vec![slot];
        affected.extend(
            self.slots[slot]
                .crossings
                .iter()
                .filter(|&&crossing| self.is_unbound(crossing))
                .map(|&crossing| self.crossings[crossing].other(slot)),
        );
        affected
    }

    /// The grapheme written at a cell, if some bound slot covers it.
    #[must_use]
    pub fn char_at<'a>(&self, x: u16, y: u16, lexicon: &'a Lexicon) -> Option<&'a str> {
        self.slots.iter().find_map(|slot| {
            let word = slot.occupied_by?;
            let index = slot.cell_index((x, y))?;
            Some(lexicon.alphabet().grapheme(lexicon.glyph_at(word, index)))
        })
    }

    /// Do all fully bound crossings agree on their shared letter?
    #[must_use]
    pub fn check_crossings(&self, lexicon: &Lexicon) -> bool {
        self.crossings.iter().all(|c| {
            match (
                self.slots[c.horizontal].occupied_by,
                self.slots[c.vertical].occupied_by,
            ) {
                (Some(h), Some(v)) => {
                    lexicon.glyph_at(h, c.index_in_horizontal)
                        == lexicon.glyph_at(v, c.index_in_vertical)
                }
                _ => true,
            }
        })
    }

    /// Current bindings, indexed by slot id; a cheap snapshot.
    #[must_use]
    pub fn bindings(&self) -> Vec<Option<WordId>> {
        self.slots.iter().map(|slot| slot.occupied_by).collect()
    }

    pub fn restore_bindings(&mut self, bindings: &[Option<WordId>]) {
        debug_assert_eq!(bindings.len(), self.slots.len());
        for (slot, &binding) in self.slots.iter_mut().zip(bindings) {
            slot.occupied_by = binding;
        }
    }

    /// Text picture of the grid: `#` blocked, `_` open and unfilled,
    /// otherwise the bound grapheme.
    #[must_use]
    pub fn render(&self, lexicon: &Lexicon) -> String {
        let mut cells: Vec<Vec<&str>> = vec![vec!["#"; self.width]; self.height];
        for slot in &self.slots {
            for (x, y) in slot.cells() {
                cells[usize::from(y) - 1][usize::from(x) - 1] = "_";
            }
        }
        for slot in &self.slots {
            let Some(word) = slot.occupied_by else {
                continue;
            };
            for (index, (x, y)) in slot.cells().enumerate() {
                cells[usize::from(y) - 1][usize::from(x) - 1] =
                    lexicon.alphabet().grapheme(lexicon.glyph_at(word, index));
            }
        }
        let mut out = String::new();
        for row in cells {
            out.extend(row);
            out.push('\n');
        }
        out
    }

    /// The JSON form of §external interfaces: structure always, filling and
    /// clue text only when `export_occupied_by` is set or the slot is bound.
    #[must_use]
    pub fn to_json(&self, lexicon: &Lexicon, export_occupied_by: bool) -> GridJson {
        GridJson {
            width: self.width,
            height: self.height,
            word_spaces: self
                .slots
                .iter()
                .map(|slot| WordSpaceJson {
                    start: slot.start,
                    length: slot.length,
                    direction: slot.direction,
                    occupied_by: slot.occupied_by.filter(|_| export_occupied_by).map(|word| {
                        lexicon.graphemes_of(word)
                    }),
                    meaning: slot
                        .occupied_by
                        .map(|word| lexicon.word(word).description.clone()),
                })
                .collect(),
        }
    }
}
