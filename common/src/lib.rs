pub mod error;
pub mod settings;

pub use error::{ConsensusError, Result};
pub use settings::*;
