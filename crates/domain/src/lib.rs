pub mod entities;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use pipeflow_errors::{PipeflowError, PipeflowResult};
pub use repositories::*;
pub use value_objects::*;
