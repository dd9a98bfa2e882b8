pub mod email;
pub mod enums;
pub mod request;

pub use email::*;
pub use enums::*;
pub use request::*;
