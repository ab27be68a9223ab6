#[macro_use]
extern crate tracing;

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod notifier;
pub mod polls;
pub mod startup;
