//! The indexed dictionary the solver queries while filling a grid. Words are
//! stored as grapheme-index arrays; per-(length, position, letter) posting
//! lists make partial-pattern lookups cheap, and a bounded LRU memoises the
//! hot `matching` query.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::warn;
use lru::LruCache;
use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::alphabet::Alphabet;
use crate::pattern::{LetterTuple, Mask};
use crate::types::{GlyphId, GlyphSeq, WordId};
use crate::util::intersect_sorted;
use crate::MAX_SLOT_LENGTH;

/// Capacity of the `matching` memo. Bounded so long-running workers cannot
/// grow the cache without limit.
pub const MATCH_CACHE_CAPACITY: usize = 16384;

/// One row of the tabular word source.
#[derive(Debug, Clone, Deserialize)]
pub struct WordEntry {
    pub word_label_text: String,
    pub word_description_text: String,
    pub word_concept_id: i64,
    #[serde(default)]
    pub score: Option<f32>,
}

impl WordEntry {
    pub fn new(label: &str, description: &str, concept_id: i64, score: Option<f32>) -> WordEntry {
        WordEntry {
            word_label_text: label.to_string(),
            word_description_text: description.to_string(),
            word_concept_id: concept_id,
            score,
        }
    }
}

/// An indexed word. Immutable once the lexicon is built, except for the
/// score column which `Lexicon::use_score_vector` rebinds between solves.
#[derive(Debug, Clone)]
pub struct Word {
    pub glyphs: GlyphSeq,
    pub description: String,
    pub concept_id: i64,
    /// NaN when the word is unscored; treated as 0 wherever scores are
    /// compared or summed.
    pub score: f32,
}

impl Word {
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    #[must_use]
    pub fn score_or_zero(&self) -> f32 {
        if self.score.is_nan() {
            0.0
        } else {
            self.score
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexiconError {
    #[error("no words of length {0} in the lexicon")]
    NoLengthBucket(usize),

    #[error("lexicon contains no usable words")]
    Empty,
}

type MatchKey = (Mask, LetterTuple);

/// Immutable after construction. Two query families drive the solver:
/// `matching` ("which words fit this partial pattern?") and
/// `letter_histogram` ("how are letters distributed at a position across
/// these candidates?").
pub struct Lexicon {
    alphabet: Arc<Alphabet>,
    words: Vec<Word>,
    /// Indexed by word length; each bucket is ascending by `WordId`.
    buckets: Vec<Arc<Vec<WordId>>>,
    /// `postings[len][pos][glyph]` lists the words of length `len` whose
    /// `pos`-th grapheme is `glyph`, ascending by `WordId`.
    postings: Vec<Vec<Vec<Vec<WordId>>>>,
    match_cache: Mutex<LruCache<MatchKey, Arc<Vec<WordId>>>>,
}

impl Lexicon {
    /// Build the index in a single pass over the source table. Rows whose
    /// label cannot be split in the given alphabet, or whose grapheme length
    /// falls outside `[2, MAX_SLOT_LENGTH]`, are skipped with a warning.
    pub fn build<I>(alphabet: Arc<Alphabet>, entries: I) -> Result<Lexicon, LexiconError>
    where
        I: IntoIterator<Item = WordEntry>,
    {
        let mut words = Vec::new();
        for entry in entries {
            let glyphs = match alphabet.split(&entry.word_label_text) {
                Ok(glyphs) => glyphs,
                Err(err) => {
                    warn!("skipping word {:?}: {err}", entry.word_label_text);
                    continue;
                }
            };
            if glyphs.len() < 2 || glyphs.len() > MAX_SLOT_LENGTH {
                warn!(
                    "skipping word {:?}: unusable length {}",
                    entry.word_label_text,
                    glyphs.len()
                );
                continue;
            }
            words.push(Word {
                glyphs,
                description: entry.word_description_text,
                concept_id: entry.word_concept_id,
                score: entry.score.unwrap_or(f32::NAN),
            });
        }
        if words.is_empty() {
            return Err(LexiconError::Empty);
        }

        let max_len = words.iter().map(Word::len).max().unwrap_or(0);
        let mut buckets: Vec<Vec<WordId>> = vec![Vec::new(); max_len + 1];
        let mut postings: Vec<Vec<Vec<Vec<WordId>>>> = (0..=max_len)
            .map(|len| vec![vec![Vec::new(); alphabet.len()]; len])
            .collect();

        for (id, word) in words.iter().enumerate() {
            buckets[word.len()].push(id);
            for (pos, &glyph) in word.glyphs.iter().enumerate() {
                postings[word.len()][pos][usize::from(glyph)].push(id);
            }
        }

        Ok(Lexicon {
            alphabet,
            words,
            buckets: buckets.into_iter().map(Arc::new).collect(),
            postings,
            match_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MATCH_CACHE_CAPACITY).expect("cache capacity is nonzero"),
            )),
        })
    }

    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    #[must_use]
    pub fn alphabet_arc(&self) -> Arc<Alphabet> {
        self.alphabet.clone()
    }

    /// Number of indexed words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[must_use]
    pub fn word(&self, id: WordId) -> &Word {
        &self.words[id]
    }

    #[must_use]
    pub fn has_length(&self, len: usize) -> bool {
        len < self.buckets.len() && !self.buckets[len].is_empty()
    }

    /// All word ids of length `mask.len()` whose grapheme at each set
    /// position of `mask` equals the corresponding entry of `letters`
    /// (position order). Results are ascending by id and memoised.
    pub fn matching(
        &self,
        mask: Mask,
        letters: &LetterTuple,
    ) -> Result<Arc<Vec<WordId>>, LexiconError> {
        debug_assert_eq!(mask.bind_count(), letters.len());
        let len = mask.len();
        if !self.has_length(len) {
            return Err(LexiconError::NoLengthBucket(len));
        }
        if mask.bind_count() == 0 {
            return Ok(self.buckets[len].clone());
        }

        let key = (mask, letters.clone());
        {
            let mut cache = self.match_cache.lock().expect("match cache lock poisoned");
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        // Intersect posting lists, smallest first, to prune early.
        let mut lists: SmallVec<[&[WordId]; 8]> = mask
            .positions()
            .zip(letters.iter())
            .map(|(pos, glyph)| self.postings[len][pos][usize::from(glyph)].as_slice())
            .collect();
        lists.sort_by_key(|list| list.len());

        let mut result = lists[0].to_vec();
        for &list in &lists[1..] {
            if result.is_empty() {
                break;
            }
            result = intersect_sorted(&result, list);
        }

        let result = Arc::new(result);
        self.match_cache
            .lock()
            .expect("match cache lock poisoned")
            .put(key, result.clone());
        Ok(result)
    }

    /// `matching`, minus the `excluded` ids. Ascending by id.
    pub fn matching_excluding(
        &self,
        mask: Mask,
        letters: &LetterTuple,
        excluded: &[WordId],
    ) -> Result<Vec<WordId>, LexiconError> {
        let base = self.matching(mask, letters)?;
        if excluded.is_empty() {
            return Ok(base.as_ref().clone());
        }
        Ok(base
            .iter()
            .copied()
            .filter(|id| !excluded.contains(id))
            .collect())
    }

    /// For each grapheme of the alphabet, how many of `candidates` carry it
    /// at `position`. A single bincount pass; not memoised.
    #[must_use]
    pub fn letter_histogram(&self, candidates: &[WordId], position: usize) -> Vec<u32> {
        let mut counts = vec![0u32; self.alphabet.len()];
        for &id in candidates {
            counts[usize::from(self.words[id].glyphs[position])] += 1;
        }
        counts
    }

    /// Replace the score column without rebuilding any index, joining on
    /// `word_concept_id`; concepts absent from the map become unscored.
    /// The `&mut` receiver keeps this exclusive with any in-flight solve.
    pub fn use_score_vector(&mut self, score_by_concept_id: &HashMap<i64, f32>) {
        for word in &mut self.words {
            word.score = score_by_concept_id
                .get(&word.concept_id)
                .copied()
                .unwrap_or(f32::NAN);
        }
    }

    /// Render a word back to its display string.
    #[must_use]
    pub fn render(&self, id: WordId) -> String {
        self.alphabet.render(&self.words[id].glyphs)
    }

    /// The word's graphemes as owned strings, for the JSON export.
    #[must_use]
    pub fn graphemes_of(&self, id: WordId) -> Vec<String> {
        self.words[id]
            .glyphs
            .iter()
            .map(|&g| self.alphabet.grapheme(g).to_string())
            .collect()
    }

    pub(crate) fn glyph_at(&self, id: WordId, position: usize) -> GlyphId {
        self.words[id].glyphs[position]
    }
}

impl std::fmt::Debug for Lexicon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexicon")
            .field("locale", &self.alphabet.locale())
            .field("words", &self.words.len())
            .finish()
    }
}
