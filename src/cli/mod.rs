//! Command-line entry point: parses argv and dispatches to the selected
//! service cycle or the migration runner (spec.md §6.5).

mod cli;
mod migrate_cmd;
mod run_cmd;

pub use cli::handle_cli;
