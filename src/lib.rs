// Library crate exposing modules for the binary, integration tests and benches

pub mod codec;
pub mod config;
pub mod model;
pub mod repair;
pub mod repository;
pub mod util;
