pub mod config;
pub mod engine;
pub mod extrema;
pub mod matchers;

pub use config::{DetectorConfig, PatternFileConfig};
pub use engine::scan;
pub use extrema::{extract, SwingKind, SwingPoint};
pub use matchers::PatternFamily;
