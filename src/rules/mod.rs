pub mod defaults;
pub mod linter;
pub mod parser;
pub mod types;

pub use parser::{parse_rules_file, parse_rules_str};
pub use types::*;
