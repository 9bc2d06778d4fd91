pub mod manual;
pub mod sine;

pub use manual::ManualSource;
pub use sine::SineSource;
