//! Ordered grapheme sets for a natural-language locale, and the greedy
//! longest-match splitter that turns a string into alphabet atoms. Some
//! locales (Czech most prominently) treat multi-codepoint clusters such as
//! "ch" as a single letter, so a word's length is its grapheme count, not
//! its `char` count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use smallvec::SmallVec;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::types::{GlyphId, GlyphSeq};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlphabetError {
    #[error("unknown letter at \"{rest}\" while splitting \"{word}\"")]
    UnknownLetter { word: String, rest: String },

    #[error("no alphabet table for locale \"{0}\"")]
    UnknownLocale(String),

    #[error("alphabet holds at most {max} graphemes, got {got}")]
    TooManyGraphemes { max: usize, got: usize },

    #[error("duplicate grapheme \"{0}\" in alphabet")]
    DuplicateGrapheme(String),
}

/// The ordered set of graphemes for one locale. Each grapheme has a stable
/// 0-based index in `[0, len)`; all letter arithmetic elsewhere in the crate
/// runs on these indices.
#[derive(Debug)]
pub struct Alphabet {
    locale: String,
    graphemes: Vec<String>,
    ids_by_grapheme: HashMap<String, GlyphId>,
    /// Longest grapheme in the set, measured in `char`s.
    longest_grapheme: usize,
}

impl Alphabet {
    pub fn from_graphemes<I, S>(locale: &str, graphemes: I) -> Result<Alphabet, AlphabetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let graphemes: Vec<String> = graphemes.into_iter().map(Into::into).collect();
        if graphemes.len() > usize::from(GlyphId::MAX) + 1 {
            return Err(AlphabetError::TooManyGraphemes {
                max: usize::from(GlyphId::MAX) + 1,
                got: graphemes.len(),
            });
        }

        let mut ids_by_grapheme = HashMap::with_capacity(graphemes.len());
        let mut longest_grapheme = 0;
        for (id, grapheme) in graphemes.iter().enumerate() {
            if ids_by_grapheme
                .insert(grapheme.clone(), id as GlyphId)
                .is_some()
            {
                return Err(AlphabetError::DuplicateGrapheme(grapheme.clone()));
            }
            longest_grapheme = longest_grapheme.max(grapheme.chars().count());
        }

        Ok(Alphabet {
            locale: locale.to_string(),
            graphemes,
            ids_by_grapheme,
            longest_grapheme,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graphemes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphemes.is_empty()
    }

    /// The grapheme with the given index. Panics on an id from a different
    /// alphabet.
    #[must_use]
    pub fn grapheme(&self, id: GlyphId) -> &str {
        &self.graphemes[usize::from(id)]
    }

    #[must_use]
    pub fn glyph_id(&self, grapheme: &str) -> Option<GlyphId> {
        self.ids_by_grapheme.get(grapheme).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GlyphId, &str)> {
        self.graphemes
            .iter()
            .enumerate()
            .map(|(id, g)| (id as GlyphId, g.as_str()))
    }

    /// Split a word into grapheme indices: NFC-normalise, lowercase, then
    /// repeatedly take the longest grapheme that prefixes the remainder.
    pub fn split(&self, word: &str) -> Result<GlyphSeq, AlphabetError> {
        let normalized: String = word.nfc().collect::<String>().to_lowercase();
        let mut glyphs = GlyphSeq::new();
        let mut rest = normalized.as_str();

        while !rest.is_empty() {
            // Byte boundaries of the first `longest_grapheme` chars.
            let mut bounds: SmallVec<[usize; 4]> = SmallVec::new();
            for (idx, ch) in rest.char_indices().take(self.longest_grapheme) {
                bounds.push(idx + ch.len_utf8());
            }

            let matched = bounds.iter().rev().find_map(|&end| {
                self.ids_by_grapheme.get(&rest[..end]).map(|&id| (id, end))
            });
            match matched {
                Some((id, end)) => {
                    glyphs.push(id);
                    rest = &rest[end..];
                }
                None => {
                    return Err(AlphabetError::UnknownLetter {
                        word: word.to_string(),
                        rest: rest.to_string(),
                    })
                }
            }
        }
        Ok(glyphs)
    }

    /// Join a glyph sequence back into a display string.
    #[must_use]
    pub fn render(&self, glyphs: &[GlyphId]) -> String {
        glyphs.iter().map(|&g| self.grapheme(g)).collect()
    }
}

const ENGLISH: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
];

// Czech exemplar set; "ch" sorts between "h" and "i" and is one letter.
const CZECH: &[&str] = &[
    "a", "á", "b", "c", "č", "d", "ď", "e", "é", "ě", "f", "g", "h", "ch", "i", "í", "j", "k",
    "l", "m", "n", "ň", "o", "ó", "p", "q", "r", "ř", "s", "š", "t", "ť", "u", "ú", "ů", "v", "w",
    "x", "y", "ý", "z", "ž",
];

fn builtin_graphemes(locale: &str) -> Option<&'static [&'static str]> {
    match locale {
        "en" => Some(ENGLISH),
        "cs" => Some(CZECH),
        _ => None,
    }
}

lazy_static! {
    static ref REGISTRY: Mutex<HashMap<String, Arc<Alphabet>>> = Mutex::new(HashMap::new());
}

/// The memoised alphabet for an ISO 639-1 locale code. Repeated calls for
/// the same locale return the same shared table.
pub fn alphabet(locale: &str) -> Result<Arc<Alphabet>, AlphabetError> {
    let mut registry = REGISTRY.lock().expect("alphabet registry lock poisoned");
    if let Some(existing) = registry.get(locale) {
        return Ok(existing.clone());
    }
    let graphemes = builtin_graphemes(locale)
        .ok_or_else(|| AlphabetError::UnknownLocale(locale.to_string()))?;
    let built = Arc::new(Alphabet::from_graphemes(locale, graphemes.iter().copied())?);
    registry.insert(locale.to_string(), built.clone());
    Ok(built)
}
