use smallvec::SmallVec;

/// The index of a word within a `Lexicon`. Identities are lexicon-scoped:
/// a word's id is its position in the lexicon's word table.
pub type WordId = usize;

/// The index of a slot within a `Grid`.
pub type SlotId = usize;

/// The index of a crossing within a `Grid`.
pub type CrossingId = usize;

/// The index of a grapheme within an `Alphabet`.
pub type GlyphId = u8;

/// Inline storage for a word's grapheme indices.
pub type GlyphSeq = SmallVec<[GlyphId; 16]>;
