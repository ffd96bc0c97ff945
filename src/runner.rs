//! Notification runner
//!
//! One invocation walks the configured spaces in order and posts the message
//! to each. The three hook points (build step, post-build step, pipeline
//! step) share one invocation routine and differ only in result gating and in
//! whether a notification error fails the step.

use reqwest::StatusCode;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::credentials::{resolve_token, CredentialStore};
use crate::error::{CredentialError, DispatchError, StepFailure};
use crate::interpolate::Environment;
use crate::log::BuildLog;
use crate::notifications::{Dispatcher, Message, MessageFormat, Target};
use crate::step::{BuildResult, ResultGate};

const BUILD_RESULT_PLACEHOLDER: &str = "${BUILD_RESULT}";

const MSG_DISABLED: &str = "Spark Notifier Plugin Disabled!";
const MSG_NO_MESSAGE: &str = "Skipping spark notifications because no message was defined";
const MSG_NO_SPACES: &str = "Skipping spark notifications because no spaces were defined";
const MSG_NO_RESULT: &str = "Could not get result";
const MSG_SENT: &str = "Message sent";
const MSG_INTERMITTENT: &str =
    "Could not send message because spark server did not provide a response; this is likely intermittent";
const MSG_UNKNOWN: &str = "Could not send message because of an unknown issue; please file an issue";

/// What to send and where, as configured for a step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyRequest {
    pub disable: bool,
    pub message: String,
    /// Text when unset
    pub format: Option<MessageFormat>,
    pub targets: Vec<Target>,
    pub credentials_id: Option<String>,
}

/// Why an invocation did not send anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Disabled,
    NoMessage,
    NoTargets,
    Result(BuildResult),
}

/// How delivery to one target ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    NonSuccessStatus(StatusCode),
    Credential(CredentialError),
    Transport,
    Unexpected(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Build log line describing this outcome
    pub fn describe(&self) -> String {
        match self {
            Self::Sent => MSG_SENT.to_string(),
            Self::NonSuccessStatus(status) => {
                format!("Could not send message; response code: {}", status.as_u16())
            }
            Self::Credential(err) => err.to_string(),
            Self::Transport => MSG_INTERMITTENT.to_string(),
            Self::Unexpected(_) => MSG_UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub target_id: String,
    pub outcome: Outcome,
}

/// Summary of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationReport {
    pub skipped: Option<Skip>,
    pub outcomes: Vec<DispatchOutcome>,
}

impl InvocationReport {
    fn skipped(skip: Skip) -> Self {
        Self {
            skipped: Some(skip),
            outcomes: Vec::new(),
        }
    }

    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

/// Step-specific behavior of an invocation
#[derive(Debug, Clone, Copy, Default)]
struct Policy {
    gate: Option<ResultGate>,
    fail_on_error: bool,
}

/// Runs notification steps against a dispatcher and a credential store
pub struct Runner<'a> {
    dispatcher: &'a dyn Dispatcher,
    credentials: &'a dyn CredentialStore,
}

impl<'a> Runner<'a> {
    pub fn new(dispatcher: &'a dyn Dispatcher, credentials: &'a dyn CredentialStore) -> Self {
        Self {
            dispatcher,
            credentials,
        }
    }

    /// Notify from a build step. Notification problems are only logged.
    pub async fn build_step(
        &self,
        request: &NotifyRequest,
        env: Option<&Environment>,
        log: &mut dyn BuildLog,
    ) -> InvocationReport {
        self.invoke("build", request, Policy::default(), env, log)
            .await
            .unwrap_or_default()
    }

    /// Notify once the build has a result. Notification problems are only
    /// logged.
    pub async fn post_build(
        &self,
        request: &NotifyRequest,
        gate: ResultGate,
        env: Option<&Environment>,
        log: &mut dyn BuildLog,
    ) -> InvocationReport {
        let policy = Policy {
            gate: Some(gate),
            fail_on_error: false,
        };
        self.invoke("post-build", request, policy, env, log)
            .await
            .unwrap_or_default()
    }

    /// Notify from a pipeline step.
    ///
    /// With `fail_on_error` the first failing target aborts the step and
    /// the remaining targets are not attempted.
    pub async fn pipeline_step(
        &self,
        request: &NotifyRequest,
        fail_on_error: bool,
        env: Option<&Environment>,
        log: &mut dyn BuildLog,
    ) -> Result<InvocationReport, StepFailure> {
        let policy = Policy {
            gate: None,
            fail_on_error,
        };
        self.invoke("pipeline", request, policy, env, log).await
    }

    async fn invoke(
        &self,
        step: &'static str,
        request: &NotifyRequest,
        policy: Policy,
        env: Option<&Environment>,
        log: &mut dyn BuildLog,
    ) -> Result<InvocationReport, StepFailure> {
        let span = info_span!("notify", step = step, invocation_id = %Uuid::new_v4());
        self.run_steps(request, policy, env, log).instrument(span).await
    }

    async fn run_steps(
        &self,
        request: &NotifyRequest,
        policy: Policy,
        env: Option<&Environment>,
        log: &mut dyn BuildLog,
    ) -> Result<InvocationReport, StepFailure> {
        if request.disable {
            log.skip(MSG_DISABLED);
            return Ok(InvocationReport::skipped(Skip::Disabled));
        }

        if !Message::is_message_valid(&request.message) {
            log.skip(MSG_NO_MESSAGE);
            return Ok(InvocationReport::skipped(Skip::NoMessage));
        }

        let mut message = request.message.clone();

        if let Some(gate) = policy.gate {
            match gate.result {
                Some(result) => {
                    message = message.replace(BUILD_RESULT_PLACEHOLDER, result.as_str());
                }
                None => log.progress(MSG_NO_RESULT),
            }

            if let Some(result) = gate.skipped_by() {
                log.skip(result.skip_message());
                return Ok(InvocationReport::skipped(Skip::Result(result)));
            }
        }

        let format = request.format.unwrap_or_default();

        if request.targets.is_empty() {
            log.skip(MSG_NO_SPACES);
            return Ok(InvocationReport::skipped(Skip::NoTargets));
        }

        let token = resolve_token(self.credentials, request.credentials_id.as_deref());
        if let Err(ref err) = token {
            warn!(error = %err, "Could not resolve spark token");
        }

        let mut report = InvocationReport::default();

        for target in &request.targets {
            log.progress(&format!("Sending message to spark space: {}", target.id));

            let outcome = match token {
                Ok(ref token) => {
                    let sent = self
                        .dispatcher
                        .send(target, &message, format, token, env)
                        .await;
                    classify(sent)
                }
                Err(ref err) => Outcome::Credential(err.clone()),
            };

            let line = outcome.describe();
            if outcome.is_success() {
                log.success(&line);
            } else if policy.fail_on_error {
                return Err(StepFailure::Aborted(line));
            } else {
                log.failure(&line);
            }

            report.outcomes.push(DispatchOutcome {
                target_id: target.id.clone(),
                outcome,
            });
        }

        Ok(report)
    }
}

fn classify(sent: Result<StatusCode, DispatchError>) -> Outcome {
    match sent {
        Ok(status) if status == StatusCode::OK => Outcome::Sent,
        Ok(status) => Outcome::NonSuccessStatus(status),
        Err(DispatchError::Transport(err)) => {
            warn!(error = %err, "Spark server did not respond");
            Outcome::Transport
        }
        Err(err) => {
            warn!(error = %err, "Spark message failed");
            Outcome::Unexpected(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, Token};
    use crate::log::MemoryLog;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Reply {
        Status(u16),
        Unexpected,
    }

    /// Records every call and answers from a script, one reply per call
    struct FakeDispatcher {
        replies: Mutex<Vec<Reply>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeDispatcher {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatcher for FakeDispatcher {
        async fn send(
            &self,
            target: &Target,
            message: &str,
            _format: MessageFormat,
            _token: &Token,
            env: Option<&Environment>,
        ) -> Result<StatusCode, DispatchError> {
            let body = crate::interpolate::interpolate_opt(message, env);
            self.calls.lock().unwrap().push((target.id.clone(), body));

            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.is_empty() {
                Reply::Status(200)
            } else {
                replies.remove(0)
            };

            match reply {
                Reply::Status(code) => Ok(StatusCode::from_u16(code).unwrap()),
                Reply::Unexpected => Err(DispatchError::Unexpected("boom".to_string())),
            }
        }
    }

    /// Transport errors need a real reqwest error, so this one talks to a
    /// port nobody listens on for the targets it is told to fail.
    struct FlakyDispatcher {
        fail_ids: Vec<String>,
        inner: FakeDispatcher,
        client: reqwest::Client,
    }

    #[async_trait]
    impl Dispatcher for FlakyDispatcher {
        async fn send(
            &self,
            target: &Target,
            message: &str,
            format: MessageFormat,
            token: &Token,
            env: Option<&Environment>,
        ) -> Result<StatusCode, DispatchError> {
            if self.fail_ids.contains(&target.id) {
                self.inner
                    .calls
                    .lock()
                    .unwrap()
                    .push((target.id.clone(), message.to_string()));
                let err = self
                    .client
                    .post("http://127.0.0.1:9/v1/messages")
                    .send()
                    .await
                    .unwrap_err();
                return Err(DispatchError::from(err));
            }
            self.inner.send(target, message, format, token, env).await
        }
    }

    fn store() -> HashMap<String, Credential> {
        let mut store = HashMap::new();
        store.insert("spark".to_string(), Credential::SecretText("tok".to_string()));
        store
    }

    fn request(message: &str, ids: &[&str]) -> NotifyRequest {
        NotifyRequest {
            disable: false,
            message: message.to_string(),
            format: None,
            targets: ids.iter().map(|id| Target::new(*id)).collect(),
            credentials_id: Some("spark".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sends_to_every_target_in_order() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let report = runner
            .build_step(&request("hello", &["a", "b"]), None, &mut log)
            .await;

        let ids: Vec<_> = dispatcher.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(report.sent(), 2);
        assert_eq!(
            log.lines(),
            &[
                "Sending message to spark space: a",
                "Message sent",
                "Sending message to spark space: b",
                "Message sent",
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let mut req = request("hello", &["a"]);
        req.disable = true;

        let report = runner.build_step(&req, None, &mut log).await;

        assert_eq!(report.skipped, Some(Skip::Disabled));
        assert!(dispatcher.calls().is_empty());
        assert_eq!(log.lines(), &["Spark Notifier Plugin Disabled!"]);
    }

    #[tokio::test]
    async fn test_blank_message_sends_nothing() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let report = runner
            .pipeline_step(&request("   ", &["a"]), true, None, &mut log)
            .await
            .unwrap();

        assert_eq!(report.skipped, Some(Skip::NoMessage));
        assert!(dispatcher.calls().is_empty());
        assert!(log.contains("no message was defined"));
    }

    #[tokio::test]
    async fn test_empty_target_list_never_dispatches() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let report = runner
            .pipeline_step(&request("hello", &[]), true, None, &mut log)
            .await
            .unwrap();

        assert_eq!(report.skipped, Some(Skip::NoTargets));
        assert!(dispatcher.calls().is_empty());
        assert!(log.contains("no spaces were defined"));
    }

    #[tokio::test]
    async fn test_post_build_skip_on_success() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let gate = ResultGate::new(
            Some(BuildResult::Success),
            crate::step::SkipOn {
                on_success: true,
                ..Default::default()
            },
        );

        let report = runner
            .post_build(&request("Build finished: ${BUILD_RESULT}", &["a"]), gate, None, &mut log)
            .await;

        assert_eq!(report.skipped, Some(Skip::Result(BuildResult::Success)));
        assert!(dispatcher.calls().is_empty());
        assert!(log.contains("because job was successful"));
    }

    #[tokio::test]
    async fn test_post_build_substitutes_result() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let gate = ResultGate::new(Some(BuildResult::Failure), Default::default());
        let env = Environment::new();

        let report = runner
            .post_build(
                &request("Build finished: ${BUILD_RESULT}", &["a"]),
                gate,
                Some(&env),
                &mut log,
            )
            .await;

        assert_eq!(report.sent(), 1);
        assert_eq!(
            dispatcher.calls(),
            vec![("a".to_string(), "Build finished: FAILURE".to_string())]
        );
    }

    #[tokio::test]
    async fn test_post_build_without_result_still_sends() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let skip_all = crate::step::SkipOn {
            on_success: true,
            on_failure: true,
            on_aborted: true,
            on_unstable: true,
        };

        let report = runner
            .post_build(&request("done", &["a"]), ResultGate::new(None, skip_all), None, &mut log)
            .await;

        assert_eq!(report.sent(), 1);
        assert!(log.contains(MSG_NO_RESULT));
    }

    #[tokio::test]
    async fn test_pipeline_fail_on_error_stops_at_first_bad_status() {
        let dispatcher = FakeDispatcher::new(vec![Reply::Status(401), Reply::Status(200)]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let err = runner
            .pipeline_step(&request("hello", &["a", "b"]), true, None, &mut log)
            .await
            .unwrap_err();

        assert_eq!(dispatcher.calls().len(), 1);
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_pipeline_without_fail_on_error_continues() {
        let dispatcher = FakeDispatcher::new(vec![Reply::Unexpected, Reply::Status(200)]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let report = runner
            .pipeline_step(&request("hello", &["a", "b"]), false, None, &mut log)
            .await
            .unwrap();

        assert_eq!(report.sent(), 1);
        assert_eq!(report.failed(), 1);
        assert!(log.contains(MSG_UNKNOWN));
    }

    #[tokio::test]
    async fn test_build_step_survives_transport_fault() {
        let dispatcher = FlakyDispatcher {
            fail_ids: vec!["a".to_string()],
            inner: FakeDispatcher::new(vec![]),
            client: reqwest::Client::new(),
        };
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();

        let report = runner
            .build_step(&request("hello", &["a", "b"]), None, &mut log)
            .await;

        assert_eq!(dispatcher.inner.calls().len(), 2);
        assert_eq!(report.outcomes[0].outcome, Outcome::Transport);
        assert_eq!(report.outcomes[1].outcome, Outcome::Sent);
        assert!(log.contains("likely intermittent"));
        assert!(log.contains(MSG_SENT));
    }

    #[tokio::test]
    async fn test_missing_credentials_never_dispatch() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let mut req = request("hello", &["a", "b"]);
        req.credentials_id = None;

        let report = runner.build_step(&req, None, &mut log).await;

        assert!(dispatcher.calls().is_empty());
        assert_eq!(report.failed(), 2);
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Credential(CredentialError::Missing)
        );
        assert!(log.contains("No credentials found"));
    }

    #[tokio::test]
    async fn test_pipeline_credential_error_is_fatal_when_opted_in() {
        let dispatcher = FakeDispatcher::new(vec![]);
        let store = store();
        let runner = Runner::new(&dispatcher, &store);
        let mut log = MemoryLog::new();
        let mut req = request("hello", &["a"]);
        req.credentials_id = Some("unknown".to_string());

        let err = runner
            .pipeline_step(&req, true, None, &mut log)
            .await
            .unwrap_err();

        assert_eq!(err, StepFailure::Aborted("No credentials found".to_string()));
        assert!(dispatcher.calls().is_empty());
    }
}
