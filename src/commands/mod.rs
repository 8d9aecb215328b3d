pub mod config;
pub mod emit;
