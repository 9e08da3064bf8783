use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque identifier for the owner of a recording session.
///
/// One logical session exists per owner; every window/process acting on behalf
/// of the same owner shares it through the remote mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session is in its recording lifecycle.
///
/// The canonical path is `Idle → Ready → ShouldStart → Starting → Recording →
/// ShouldStop → Saving → Ready`, with `Error` reachable from anywhere and
/// recoverable back to `Idle`. The path is advisory: external transitions
/// overwrite the local status unconditionally so that a cross-window stop
/// signal always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    Idle,
    Ready,
    ShouldStart,
    ShouldStop,
    Starting,
    Recording,
    Saving,
    Error,
    /// Fallback for status strings written by a newer client.
    #[serde(other)]
    Unknown,
}

impl RecorderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderStatus::Idle => "idle",
            RecorderStatus::Ready => "ready",
            RecorderStatus::ShouldStart => "shouldStart",
            RecorderStatus::ShouldStop => "shouldStop",
            RecorderStatus::Starting => "starting",
            RecorderStatus::Recording => "recording",
            RecorderStatus::Saving => "saving",
            RecorderStatus::Error => "error",
            RecorderStatus::Unknown => "unknown",
        }
    }

    /// Intent states are requests for a coordinating process to act on, not
    /// states the hardware is actually in.
    pub fn is_intent(&self) -> bool {
        matches!(
            self,
            RecorderStatus::ShouldStart | RecorderStatus::ShouldStop
        )
    }
}

impl Default for RecorderStatus {
    fn default() -> Self {
        RecorderStatus::Idle
    }
}

impl fmt::Display for RecorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecorderStatus {
    type Err = std::convert::Infallible;

    /// Unrecognized strings decode to [`RecorderStatus::Unknown`] rather than
    /// failing, so a stale client never chokes on a newer peer's writes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "idle" => RecorderStatus::Idle,
            "ready" => RecorderStatus::Ready,
            "shouldStart" => RecorderStatus::ShouldStart,
            "shouldStop" => RecorderStatus::ShouldStop,
            "starting" => RecorderStatus::Starting,
            "recording" => RecorderStatus::Recording,
            "saving" => RecorderStatus::Saving,
            "error" => RecorderStatus::Error,
            _ => RecorderStatus::Unknown,
        })
    }
}

/// The merge-written per-owner document exchanged with the remote mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument {
    pub recorder_status: RecorderStatus,
    /// Milliseconds since the Unix epoch, strictly monotonic per writer.
    pub last_updated: u64,
}
