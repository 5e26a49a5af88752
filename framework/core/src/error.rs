/// Raised when the scenario tree or the invocation is misconfigured.
///
/// Covers unknown phase names, unsupported file kinds and unregistered suite, runner, group or
/// scenario names. These are detected at discovery or startup and are never retried.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ConfigurationError {
    msg: String,
}

impl ConfigurationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Raised when running a scenario against the system under test fails.
///
/// The client exiting with a non-zero code, a client timeout and a malformed result record all
/// end up here. The failing scenario is abandoned, but a driver running several scenarios may
/// decide to continue with the next one.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ExecutionError {
    msg: String,
}

impl ExecutionError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Raised when the remote collector rejects a submission or answers with an empty body.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct SubmissionError {
    msg: String,
}

impl SubmissionError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
