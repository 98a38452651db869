pub mod cli;
pub mod config;
pub mod server;
pub mod simulation;
pub mod weather;
pub mod zone;
