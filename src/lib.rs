pub mod cli;
pub mod config;
pub mod review;
pub mod rule;
pub mod types;
pub mod util;

pub use review::aggregate;
pub use review::autofix::{collect_fixes, estimate_confidence};
pub use review::dedup::deduplicate;
pub use review::parser::parse;
pub use review::priority::prioritize;
pub use review::score::{deduction_score, weighted_score};
pub use review::verdict::resolve_verdict;
