pub mod backend;
pub mod config;
pub mod errors;
pub mod extract;
pub mod publish;
pub mod roles;
pub mod selection;
pub mod session;
pub mod telemetry;
pub mod termination;
pub mod transcript;
pub mod ui;
