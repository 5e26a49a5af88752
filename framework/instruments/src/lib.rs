mod collector;
mod report;
mod sums;

pub use collector::CollectorClient;
pub use report::SummaryReport;
pub use sums::MeasurementSums;
