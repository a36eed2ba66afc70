#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::comparison_chain)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_on_vec_items)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod alphabet;
pub mod grid;
pub mod lexicon;
pub mod pattern;
pub mod solver;
pub mod types;
pub mod util;

/// The maximum supported length for a single slot; also the bit width of
/// `pattern::Mask`.
pub const MAX_SLOT_LENGTH: usize = 32;
