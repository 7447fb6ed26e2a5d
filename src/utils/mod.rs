pub mod paths;

pub use paths::{normalize_path, PathMatcher};
