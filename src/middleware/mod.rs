pub mod caller;
pub mod validation;

pub use caller::{AdminCaller, Caller};
pub use validation::ValidatedJson;
