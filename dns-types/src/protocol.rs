pub mod deserialise;
pub mod serialise;
pub mod types;

pub use types::*;
