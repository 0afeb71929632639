pub mod actions;
pub mod agent;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod os;
pub mod probes;
pub mod scripts;
