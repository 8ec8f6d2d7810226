pub mod deserialise;
pub mod types;

pub use types::*;
