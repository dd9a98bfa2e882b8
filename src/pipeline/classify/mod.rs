pub mod types;
pub mod prompt;
pub mod validation;
pub mod responsiveness;
pub mod exemption;

pub use types::*;
pub use prompt::*;
pub use validation::*;
pub use responsiveness::*;
pub use exemption::*;
