mod executor;

pub use executor::{GitExecutor, GitOutput};
