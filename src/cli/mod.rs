mod args;
pub mod get;
pub mod put;

pub use args::{parse_get_args, parse_put_args, GetArgs, PutArgs, ReportPlan};
