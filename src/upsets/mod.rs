pub mod aggregator;
pub mod classifier;

pub use aggregator::{recent, stats, UpsetStats};
pub use classifier::{classify, ClassifyError, LeagueConfig};
