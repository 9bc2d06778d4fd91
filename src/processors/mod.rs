pub mod column_rms;
pub mod gain;
pub mod log_sink;
pub mod passthrough;

pub use column_rms::ColumnRms;
pub use gain::Gain;
pub use log_sink::LogListener;
pub use passthrough::Passthrough;
