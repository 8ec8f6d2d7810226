#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod compose;
pub mod resolve;

pub use compose::compose_response;
pub use resolve::{resolve, ResolveResult};
