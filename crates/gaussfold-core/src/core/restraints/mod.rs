pub mod builder;
pub mod kind;
pub mod model;
pub mod table;

pub use builder::{ModelBuilder, ModelConfig};
pub use kind::{Restraint, RestraintKind};
pub use model::{ModelError, RestraintModel};
pub use table::{GaussianParams, RestraintTable, RestraintTableError};
