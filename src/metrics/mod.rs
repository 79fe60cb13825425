// Metrics module: readings, records and dimension fanout
pub mod builder;
pub mod fanout;
pub mod record;

// Re-export key types for convenience
pub use builder::MetricBuilder;
pub use fanout::{fanout, DimensionRule, FanoutMode, FanoutPolicy, InstanceContext};
pub use record::{Dimensions, MetricRecord, MountContext, Reading};
