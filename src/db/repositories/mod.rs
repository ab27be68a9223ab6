pub mod ballot_repository;
pub mod poll_repository;
pub mod roster_repository;
pub mod template_repository;

pub use ballot_repository::*;
pub use poll_repository::*;
pub use roster_repository::*;
pub use template_repository::*;
