pub mod error;
pub mod pipeline;
pub mod stage;

pub use error::StageError;
pub use pipeline::Pipeline;
pub use stage::{ConditionalStage, FieldEquals, Predicate, Stage};
