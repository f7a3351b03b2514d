//! Build metadata and small encoders

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// What was built, and when
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

impl VersionInfo {
    /// `gitdeploy/{version}`, sent with every outbound request
    pub fn user_agent(&self) -> String {
        format!("gitdeploy/{}", self.version)
    }
}

/// Metadata stamped in by `build.rs`
pub fn version_info() -> VersionInfo {
    let stamped = |value: Option<&str>| value.unwrap_or("unknown").to_string();

    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: stamped(option_env!("GIT_HASH")),
        build_time: stamped(option_env!("BUILD_TIME")),
    }
}

/// Lowercase hex, two digits per byte
pub fn hex_encode(data: impl AsRef<[u8]>) -> String {
    let data = data.as_ref();
    data.iter()
        .fold(String::with_capacity(data.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
