//! Persistent settings, agent state and deployment history

pub mod history;
pub mod layout;
pub mod settings;
pub mod state;
