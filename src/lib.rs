//! spark-notify - Spark notifications for builds
//!
//! A library for posting build status messages to Spark spaces with:
//! - `${env.NAME}` and `${NAME}` interpolation from the build environment
//! - Bearer tokens resolved from a pluggable credential store
//! - Per-space delivery where one failing space never stops the rest
//! - Result gating for post-build notifications
//! - Opt-in step failure for pipeline notifications

pub mod config;
pub mod credentials;
pub mod error;
pub mod interpolate;
pub mod log;
pub mod notifications;
pub mod runner;
pub mod step;

pub use config::Config;
pub use credentials::{resolve_token, Credential, CredentialStore, Token};
pub use error::{CredentialError, DispatchError, MessageError, StepFailure};
pub use interpolate::{interpolate, interpolate_opt, Environment};
pub use log::{BuildLog, ConsoleLog, MemoryLog};
pub use notifications::{Dispatcher, Message, MessageFormat, SparkClient, Target};
pub use runner::{DispatchOutcome, InvocationReport, NotifyRequest, Outcome, Runner, Skip};
pub use step::{BuildResult, ResultGate, SkipOn};
