pub mod activity;
pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod experiment;
pub mod orchestrator;
pub mod report;
