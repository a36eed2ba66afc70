use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gridfill_core::alphabet::alphabet;
use gridfill_core::grid::Grid;
use gridfill_core::lexicon::{Lexicon, WordEntry};
use gridfill_core::solver::{Solver, DEFAULT_MAX_FAILED_WORDS};

#[derive(Parser)]
#[command(
    name = "gridfill_core",
    about = "Fill a crossword grid from a scored word table"
)]
struct Args {
    /// Path to the grid template: one row per line, `_` or space for an
    /// open cell, `X` for a blocked one
    grid_path: PathBuf,

    /// CSV word table with `word_label_text`, `word_description_text`,
    /// `word_concept_id` and optional `score` columns
    #[arg(long)]
    words: PathBuf,

    /// ISO 639-1 locale of the word table
    #[arg(long, default_value = "en")]
    locale: String,

    /// Failure budget per solve attempt
    #[arg(long, default_value_t = DEFAULT_MAX_FAILED_WORDS)]
    max_failed_words: u64,

    /// Probability of randomised slot selection; 0 makes the search
    /// deterministic
    #[arg(long, default_value_t = 0.5)]
    randomize: f64,

    /// RNG seed, for reproducible attempts
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of attempts; the best-scoring filling wins
    #[arg(long, default_value_t = 1)]
    attempts: usize,

    /// Emit the result as JSON instead of a rendered grid
    #[arg(long)]
    json: bool,
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let alphabet = alphabet(&args.locale)?;

    let mut reader = csv::Reader::from_path(&args.words)?;
    let entries: Vec<WordEntry> = reader.deserialize().collect::<Result<_, _>>()?;
    let lexicon = Lexicon::build(alphabet, entries)?;

    let grid_source = std::fs::read_to_string(&args.grid_path)?;
    let mut grid = Grid::from_grid(&grid_source)?;

    let mut solver = Solver::new(args.max_failed_words, args.randomize, args.seed);
    let success = solver.solve_best(&mut grid, &lexicon, args.attempts)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&grid.to_json(&lexicon, true))?
        );
    } else {
        print!("{}", grid.render(&lexicon));
    }
    eprintln!(
        "score {:.1}; {} assigned, {} backtracked, {} failed in {:.2?}",
        success.score,
        success.statistics.assign,
        success.statistics.backtrack,
        success.statistics.failed,
        success.statistics.elapsed
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
