pub mod alerts;
pub mod binance;
pub mod scheduler;

pub use alerts::{AlertKey, AlertRecord, AlertStore};
pub use binance::BinanceData;
pub use scheduler::{ScanScheduler, UnitState};
