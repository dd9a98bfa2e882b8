pub mod classify;
pub mod processor;
pub mod query;

pub use processor::*;
