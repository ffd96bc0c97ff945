//! Build results and result gating

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownBuildResult;

/// Terminal result of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildResult {
    Success,
    Failure,
    Aborted,
    Unstable,
}

impl BuildResult {
    pub const ALL: [BuildResult; 4] = [Self::Success, Self::Failure, Self::Aborted, Self::Unstable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::Unstable => "UNSTABLE",
        }
    }

    /// Build log line written when this result suppresses the notification
    pub fn skip_message(&self) -> &'static str {
        match self {
            Self::Success => "Skipping spark notifications because job was successful",
            Self::Failure => "Skipping spark notifications because job failed",
            Self::Aborted => "Skipping spark notifications because job was aborted",
            Self::Unstable => "Skipping spark notifications because job is unstable",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildResult {
    type Err = UnknownBuildResult;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBuildResult(s.to_string()))
    }
}

/// Which build results suppress a post-build notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SkipOn {
    #[serde(default)]
    pub on_success: bool,
    #[serde(default)]
    pub on_failure: bool,
    #[serde(default)]
    pub on_aborted: bool,
    #[serde(default)]
    pub on_unstable: bool,
}

impl SkipOn {
    pub fn skips(&self, result: BuildResult) -> bool {
        match result {
            BuildResult::Success => self.on_success,
            BuildResult::Failure => self.on_failure,
            BuildResult::Aborted => self.on_aborted,
            BuildResult::Unstable => self.on_unstable,
        }
    }
}

/// Result gating applied by post-build notifications.
///
/// `result` is `None` when the host could not report one; nothing is
/// skipped in that case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultGate {
    pub result: Option<BuildResult>,
    pub skip: SkipOn,
}

impl ResultGate {
    pub fn new(result: Option<BuildResult>, skip: SkipOn) -> Self {
        Self { result, skip }
    }

    /// The result that suppresses notification, if any
    pub fn skipped_by(&self) -> Option<BuildResult> {
        self.result.filter(|r| self.skip.skips(*r))
    }
}
