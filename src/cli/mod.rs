//! Command-line surface over the job service

pub mod commands;
pub mod progress;
pub mod ui;
pub mod util;

pub use progress::{ProgressFollower, render_bar, render_line};
pub use ui::Output;
pub use util::{
    CommandContext, expand_documents, is_initialized, parse_job_id, require_initialized,
};
