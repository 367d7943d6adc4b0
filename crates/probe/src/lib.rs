pub mod error;
pub mod probe;

pub use crate::probe::SpatialProbe;
#[cfg(feature = "mock")]
pub use crate::probe::MockProbe;
use std::sync::Arc;

pub type ProbeHandle = Arc<dyn SpatialProbe + Send + Sync>;
