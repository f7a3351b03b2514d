//! Deployment pipeline

pub mod apply;
pub mod cleanup;
pub mod fetch;
pub mod fsm;
pub mod orchestrator;
pub mod unpack;
