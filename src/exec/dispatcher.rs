use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::exec::judge::{Judge, SubmissionStatus};
use crate::exec::languages::language_id;

/// Poll schedule: 7 attempts, 2 seconds apart, roughly a 14 second ceiling.
pub const POLL_ATTEMPTS: usize = 7;
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Terminal failures of a run request. Compile- and run-time errors are not
/// failures of the dispatch itself; they arrive as a classified outcome.
/// The display strings are the exact texts delivered to the requester.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("Unsupported language.")]
    UnsupportedLanguage,
    #[error("An error occurred during code submission.")]
    SubmissionFailed,
    #[error("Failed to retrieve execution result.")]
    PollFailed,
    #[error("Execution timed out.")]
    TimedOut,
}

/// A resolved execution: standard output, classified error text if the run
/// went wrong, and the judge's status label.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: Option<String>,
    pub status: String,
}

/// Submits a run request to the judge collaborator and polls for completion
/// under a bounded retry policy. One call produces exactly one outcome:
/// `Ok` with the judge's verdict, or `Err` with a dispatch failure.
pub struct ExecutionDispatcher {
    judge: Arc<dyn Judge>,
}

impl ExecutionDispatcher {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub async fn run(
        &self,
        language: &str,
        source: &str,
        stdin: Option<&str>,
    ) -> Result<ExecOutcome, ExecError> {
        let Some(language_id) = language_id(language) else {
            return Err(ExecError::UnsupportedLanguage);
        };

        let ticket = self
            .judge
            .submit(language_id, source, stdin)
            .await
            .map_err(|e| {
                error!("Judge submission failed: {}", e);
                ExecError::SubmissionFailed
            })?;
        let Some(token) = ticket.token else {
            return Err(ExecError::SubmissionFailed);
        };

        for _ in 0..POLL_ATTEMPTS {
            tokio::time::sleep(POLL_INTERVAL).await;

            // One transport failure ends the request; the timeout path is the
            // only retry mechanism.
            let result = self.judge.poll(&token).await.map_err(|e| {
                error!(token, "Judge poll failed: {}", e);
                ExecError::PollFailed
            })?;

            let status_id = result.status.as_ref().map(|s| s.id).unwrap_or(0);
            if status_id <= 2 {
                // In queue or processing
                continue;
            }
            return Ok(resolve(result, status_id));
        }

        Err(ExecError::TimedOut)
    }
}

/// Map a terminal poll result to the outcome delivered to the requester.
/// Status 3 is a clean accept; anything above carries a classified error.
fn resolve(result: SubmissionStatus, status_id: i32) -> ExecOutcome {
    let stderr = (status_id > 3).then(|| classify_failure(&result, status_id));
    let status = result
        .status
        .and_then(|s| s.description)
        .unwrap_or_else(|| "Error".to_string());
    ExecOutcome {
        stdout: result.stdout.unwrap_or_default(),
        stderr,
        status,
    }
}

/// Human-readable explanation of a failed run: compile output first, then the
/// runtime error stream, then known judge status ids, then the judge's own
/// description.
fn classify_failure(result: &SubmissionStatus, status_id: i32) -> String {
    if let Some(compile_output) = result
        .compile_output
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        return format!("Compilation Error:\n{compile_output}");
    }
    if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
        return format!("Runtime Error:\n{stderr}");
    }
    match status_id {
        5 => "Error: Time Limit Exceeded.\nYour program took too long to execute. This can be caused by an infinite loop or an inefficient algorithm.".to_string(),
        6 => "Error: Compilation Failed.\nPlease check for syntax errors.".to_string(),
        7 => "Error: Runtime Error (Segmentation Fault).\nYour program tried to access a memory location it wasn't allowed to.".to_string(),
        11 => "Error: Runtime Error (Non-Zero Exit Code).\nYour program exited with an error status, often due to an unhandled exception.".to_string(),
        _ => {
            let description = result
                .status
                .as_ref()
                .and_then(|s| s.description.as_deref())
                .unwrap_or("Unknown Error");
            format!("An error occurred: {description}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::judge::{JudgeError, StatusInfo, SubmissionTicket};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Judge double that replays a scripted sequence of poll results.
    struct ScriptedJudge {
        submit_result: Mutex<Option<Result<SubmissionTicket, JudgeError>>>,
        polls: Mutex<VecDeque<Result<SubmissionStatus, JudgeError>>>,
        submit_calls: AtomicUsize,
        poll_calls: AtomicUsize,
    }

    impl ScriptedJudge {
        fn new(
            submit: Result<SubmissionTicket, JudgeError>,
            polls: Vec<Result<SubmissionStatus, JudgeError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                submit_result: Mutex::new(Some(submit)),
                polls: Mutex::new(polls.into()),
                submit_calls: AtomicUsize::new(0),
                poll_calls: AtomicUsize::new(0),
            })
        }

        fn accepted_ticket() -> Result<SubmissionTicket, JudgeError> {
            Ok(SubmissionTicket {
                token: Some("tok-1".to_string()),
            })
        }
    }

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn submit(
            &self,
            _language_id: u32,
            _source: &str,
            _stdin: Option<&str>,
        ) -> Result<SubmissionTicket, JudgeError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            self.submit_result.lock().unwrap().take().unwrap()
        }

        async fn poll(&self, _token: &str) -> Result<SubmissionStatus, JudgeError> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status(1, "In Queue")))
        }
    }

    fn status(id: i32, description: &str) -> SubmissionStatus {
        SubmissionStatus {
            status: Some(StatusInfo {
                id,
                description: Some(description.to_string()),
            }),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_language_makes_no_judge_call() {
        let judge = ScriptedJudge::new(ScriptedJudge::accepted_ticket(), vec![]);
        let dispatcher = ExecutionDispatcher::new(judge.clone());

        let err = dispatcher.run("ruby", "puts 1", None).await.unwrap_err();
        assert_eq!(err, ExecError::UnsupportedLanguage);
        assert_eq!(judge.submit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_token_is_a_submission_failure() {
        let judge = ScriptedJudge::new(Ok(SubmissionTicket { token: None }), vec![]);
        let dispatcher = ExecutionDispatcher::new(judge.clone());

        let err = dispatcher.run("python", "print(1)", None).await.unwrap_err();
        assert_eq!(err, ExecError::SubmissionFailed);
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_run_delivers_stdout_without_stderr() {
        let mut accepted = status(3, "Accepted");
        accepted.stdout = Some("hello\n".to_string());
        let judge = ScriptedJudge::new(
            ScriptedJudge::accepted_ticket(),
            vec![Ok(status(2, "Processing")), Ok(accepted)],
        );
        let dispatcher = ExecutionDispatcher::new(judge.clone());

        let outcome = dispatcher.run("python", "print('hello')", None).await.unwrap();
        assert_eq!(outcome.stdout, "hello\n");
        assert!(outcome.stderr.is_none());
        assert_eq!(outcome.status, "Accepted");
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn compile_output_classifies_as_compilation_error() {
        let mut failed = status(6, "Compilation Error");
        failed.compile_output = Some("main.c:1: error".to_string());
        let judge = ScriptedJudge::new(ScriptedJudge::accepted_ticket(), vec![Ok(failed)]);
        let dispatcher = ExecutionDispatcher::new(judge);

        let outcome = dispatcher.run("c", "int main(", None).await.unwrap();
        assert_eq!(
            outcome.stderr.as_deref(),
            Some("Compilation Error:\nmain.c:1: error")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stderr_stream_classifies_as_runtime_error() {
        let mut failed = status(11, "Runtime Error (NZEC)");
        failed.stderr = Some("Traceback".to_string());
        let judge = ScriptedJudge::new(ScriptedJudge::accepted_ticket(), vec![Ok(failed)]);
        let dispatcher = ExecutionDispatcher::new(judge);

        let outcome = dispatcher.run("python", "raise", None).await.unwrap();
        assert_eq!(outcome.stderr.as_deref(), Some("Runtime Error:\nTraceback"));
        assert_eq!(outcome.status, "Runtime Error (NZEC)");
    }

    #[tokio::test(start_paused = true)]
    async fn bare_status_ids_map_to_fixed_explanations() {
        let judge = ScriptedJudge::new(
            ScriptedJudge::accepted_ticket(),
            vec![Ok(status(5, "Time Limit Exceeded"))],
        );
        let dispatcher = ExecutionDispatcher::new(judge);

        let outcome = dispatcher.run("python", "while True: pass", None).await.unwrap();
        assert!(outcome
            .stderr
            .as_deref()
            .unwrap()
            .starts_with("Error: Time Limit Exceeded."));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_terminal_status_falls_back_to_description() {
        let judge = ScriptedJudge::new(
            ScriptedJudge::accepted_ticket(),
            vec![Ok(status(13, "Internal Error"))],
        );
        let dispatcher = ExecutionDispatcher::new(judge);

        let outcome = dispatcher.run("python", "print(1)", None).await.unwrap();
        assert_eq!(
            outcome.stderr.as_deref(),
            Some("An error occurred: Internal Error")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_ends_the_loop_without_retry() {
        let judge = ScriptedJudge::new(
            ScriptedJudge::accepted_ticket(),
            vec![
                Ok(status(1, "In Queue")),
                Err(JudgeError::Transport("connection reset".to_string())),
                Ok(status(3, "Accepted")),
            ],
        );
        let dispatcher = ExecutionDispatcher::new(judge.clone());

        let err = dispatcher.run("python", "print(1)", None).await.unwrap_err();
        assert_eq!(err, ExecError::PollFailed);
        // No further attempts after the failed one
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_polls_time_out_after_the_full_schedule() {
        let polls = (0..POLL_ATTEMPTS).map(|_| Ok(status(1, "In Queue"))).collect();
        let judge = ScriptedJudge::new(ScriptedJudge::accepted_ticket(), polls);
        let dispatcher = ExecutionDispatcher::new(judge.clone());

        let started = tokio::time::Instant::now();
        let err = dispatcher.run("python", "print(1)", None).await.unwrap_err();
        assert_eq!(err, ExecError::TimedOut);
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), POLL_ATTEMPTS);
        assert_eq!(started.elapsed(), POLL_INTERVAL * POLL_ATTEMPTS as u32);
    }
}
