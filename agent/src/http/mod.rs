//! HTTP client for the GitHub API

pub mod client;
pub mod github;
