//! InvokeTask - one chaincode invocation
//!
//! # フロー
//! 1. expand argument templates (once per task)
//! 2. call the channel client with the consistency filter as endorsement handler
//! 3. classify the response / error into `InvocationError`
//! 4. let `RetryHandle` resubmit retryable errors
//! 5. record the terminal outcome and fire the completion callback exactly once
//!
//! A task is shared (`Arc`) between the coordinator and the worker running it,
//! so its mutable state sits behind a mutex that is never held across `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::expander::ArgExpander;
use super::filter::ResponseConsistencyFilter;
use super::pool::Job;
use super::retry::RetryHandle;
use crate::domain::{
    ErrorDetail, InvocationError, InvokeMode, RetryPolicy, TaskId, TaskOutcome, TaskSpec,
    TxValidationCode,
};
use crate::ports::{
    ChannelClient, ClientError, EndorsementHandler, ExecuteOptions, Printer, Request, Response,
};

/// Called once with the task id and the final error (`None` on success).
pub type CompletionCallback = Box<dyn FnOnce(TaskId, Option<&InvocationError>) + Send>;

#[derive(Debug, Default)]
struct TaskProgress {
    outcome: TaskOutcome,
    attempt: u32,
    last_error: Option<InvocationError>,
    tx_id: Option<String>,
}

impl TaskProgress {
    fn advance(&mut self, next: TaskOutcome) {
        debug_assert!(
            self.outcome.can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.outcome
        );
        self.outcome = next;
    }
}

pub struct InvokeTask {
    id: TaskId,
    spec: TaskSpec,
    client: Arc<dyn ChannelClient>,
    expander: ArgExpander,
    printer: Arc<dyn Printer>,
    handler: Arc<dyn EndorsementHandler>,
    progress: Mutex<TaskProgress>,
    callback: Mutex<Option<CompletionCallback>>,
}

impl InvokeTask {
    pub fn new(
        id: TaskId,
        spec: TaskSpec,
        client: Arc<dyn ChannelClient>,
        expander: ArgExpander,
        printer: Arc<dyn Printer>,
    ) -> Self {
        Self {
            id,
            spec,
            client,
            expander,
            printer,
            handler: Arc::new(ResponseConsistencyFilter::new()),
            progress: Mutex::new(TaskProgress::default()),
            callback: Mutex::new(None),
        }
    }

    /// Replace the endorsement handler (defaults to `ResponseConsistencyFilter`).
    pub fn with_handler(mut self, handler: Arc<dyn EndorsementHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Attach the completion callback. Replaces a callback that has not fired yet.
    pub fn set_callback(&self, callback: CompletionCallback) {
        *lock(&self.callback) = Some(callback);
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Submissions performed so far (0 before the first `invoke`).
    pub fn attempts(&self) -> u32 {
        lock(&self.progress).attempt
    }

    /// Final error if the task failed, otherwise the last intermediate error (if any).
    pub fn last_error(&self) -> Option<InvocationError> {
        lock(&self.progress).last_error.clone()
    }

    /// Transaction id of the first proposal that got one.
    pub fn tx_id(&self) -> Option<String> {
        lock(&self.progress).tx_id.clone()
    }

    pub fn outcome(&self) -> TaskOutcome {
        lock(&self.progress).outcome
    }

    fn retry_policy(&self) -> RetryPolicy {
        match self.spec.mode {
            InvokeMode::Invoke => self.spec.retry.into(),
            InvokeMode::Query => RetryPolicy::new(1, Duration::ZERO),
        }
    }

    /// Run the invocation, including resubmissions, to a terminal outcome.
    ///
    /// Calling this again on a finished task returns the recorded result
    /// without touching the network or the callback.
    pub async fn invoke(&self) -> Result<(), InvocationError> {
        {
            let mut progress = lock(&self.progress);
            match progress.outcome {
                TaskOutcome::Pending => {}
                TaskOutcome::Succeeded => return Ok(()),
                TaskOutcome::Running | TaskOutcome::Failed => {
                    return Err(progress.last_error.clone().unwrap_or_else(|| {
                        InvocationError::persistent(format!("task {} is already running", self.id))
                    }));
                }
            }
            progress.advance(TaskOutcome::Running);
            progress.attempt = 1;
        }

        let request = Request {
            chaincode_id: self.spec.chaincode_id.clone(),
            function: self.spec.arg_set.func.clone(),
            args: self
                .expander
                .expand_all(&self.spec.arg_set.args)
                .into_iter()
                .map(String::into_bytes)
                .collect(),
        };
        let options = ExecuteOptions::new(self.spec.timeout)
            .with_targets(self.spec.targets.clone())
            .with_handler(Arc::clone(&self.handler));

        let result = RetryHandle::new(self.retry_policy())
            .run(
                || self.attempt_once(&request, &options),
                |next_attempt, error| {
                    let mut progress = lock(&self.progress);
                    progress.attempt = next_attempt;
                    progress.last_error = Some(error.clone());
                },
            )
            .await;

        let error = {
            let mut progress = lock(&self.progress);
            match &result {
                Ok(_) => progress.advance(TaskOutcome::Succeeded),
                Err(error) => {
                    progress.advance(TaskOutcome::Failed);
                    progress.last_error = Some(error.clone());
                }
            }
            debug!(
                task_id = %self.id,
                attempts = progress.attempt,
                outcome = ?progress.outcome,
                "task finished"
            );
            result.err()
        };

        let callback = lock(&self.callback).take();
        if let Some(callback) = callback {
            callback(self.id, error.as_ref());
        }

        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn attempt_once(
        &self,
        request: &Request,
        options: &ExecuteOptions,
    ) -> Result<Response, InvocationError> {
        debug!(task_id = %self.id, attempt = self.attempts(), function = %request.function, "submitting");

        let result = match self.spec.mode {
            InvokeMode::Invoke => self.client.execute(request, options).await,
            InvokeMode::Query => self.client.query(request, options).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                if let ClientError::CommitTimeout { tx_id } = &error {
                    self.record_tx_id(tx_id);
                }
                return Err(classify_client_error(error));
            }
        };

        self.record_tx_id(&response.tx_id);
        if self.spec.verbose {
            self.printer
                .print_response(self.id, &response, self.spec.payload_only);
        }

        match (self.spec.mode, response.validation_code) {
            (InvokeMode::Query, _) | (InvokeMode::Invoke, Some(TxValidationCode::Valid)) => {
                Ok(response)
            }
            (InvokeMode::Invoke, Some(code)) => {
                let detail = ErrorDetail::new(format!("transaction invalidated with code {code}"))
                    .with_tx_id(response.tx_id.clone());
                if code.is_transient() {
                    Err(InvocationError::Transient(detail))
                } else {
                    Err(InvocationError::Persistent(detail))
                }
            }
            (InvokeMode::Invoke, None) => Err(InvocationError::Persistent(
                ErrorDetail::new("commit status missing from response")
                    .with_tx_id(response.tx_id.clone()),
            )),
        }
    }

    fn record_tx_id(&self, tx_id: &str) {
        if tx_id.is_empty() {
            return;
        }
        let mut progress = lock(&self.progress);
        if progress.tx_id.is_none() {
            progress.tx_id = Some(tx_id.to_string());
        }
    }
}

#[async_trait]
impl Job for InvokeTask {
    fn label(&self) -> String {
        self.id.to_string()
    }

    async fn run(&self) {
        // The outcome is reported through the completion callback.
        let _ = self.invoke().await;
    }
}

/// Map a client failure onto the invocation error taxonomy.
pub fn classify_client_error(error: ClientError) -> InvocationError {
    match error {
        ClientError::Endorsement(inner) => inner,
        ClientError::CommitTimeout { ref tx_id } => InvocationError::TimeoutOnCommit(
            ErrorDetail::new("no commit event within the call deadline").with_tx_id(tx_id.clone()),
        ),
        ClientError::Transport(_) => {
            InvocationError::Transient(ErrorDetail::new("transport failure").with_cause(error))
        }
        ClientError::Proposal(_) => {
            InvocationError::Transient(ErrorDetail::new("proposal failed").with_cause(error))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArgSet, ErrorKind, RetryBudget, Summary};
    use crate::impls::SeededRandom;
    use crate::ports::{Peer, ProposalResponse};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back one scripted result per call and records the requests it saw.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<Response, ClientError>>>,
        requests: Mutex<Vec<Request>>,
        queries: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<Response, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
                queries: AtomicUsize::new(0),
            })
        }

        fn next(&self, request: &Request) -> Result<Response, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("script exhausted".into())))
        }
    }

    #[async_trait]
    impl ChannelClient for ScriptedClient {
        async fn execute(
            &self,
            request: &Request,
            _options: &ExecuteOptions,
        ) -> Result<Response, ClientError> {
            self.next(request)
        }

        async fn query(
            &self,
            request: &Request,
            _options: &ExecuteOptions,
        ) -> Result<Response, ClientError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.next(request)
        }

        fn peers(&self) -> Vec<Peer> {
            vec![Peer::new("grpcs://peer0.org1:7051", "Org1MSP")]
        }
    }

    #[derive(Default)]
    struct CapturingPrinter {
        responses: Mutex<Vec<(TaskId, String, bool)>>,
    }

    impl Printer for CapturingPrinter {
        fn print_line(&self, _line: &str) {}

        fn print_response(&self, task_id: TaskId, response: &Response, payload_only: bool) {
            self.responses
                .lock()
                .unwrap()
                .push((task_id, response.tx_id.clone(), payload_only));
        }

        fn print_summary(&self, _summary: &Summary) {}
    }

    fn committed(tx_id: &str, code: TxValidationCode) -> Result<Response, ClientError> {
        Ok(Response {
            tx_id: tx_id.to_string(),
            responses: vec![ProposalResponse::ok("grpcs://peer0.org1:7051", "")],
            validation_code: Some(code),
        })
    }

    fn task_with(
        client: Arc<ScriptedClient>,
        spec: TaskSpec,
        printer: Arc<CapturingPrinter>,
    ) -> InvokeTask {
        InvokeTask::new(
            TaskId::new(1),
            spec,
            client,
            ArgExpander::new(Arc::new(SeededRandom::new(1))),
            printer,
        )
    }

    fn spec(max_attempts: u32) -> TaskSpec {
        TaskSpec::new("mycc", ArgSet::new("put", ["k", "v"]))
            .with_retry(RetryBudget::new(max_attempts, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn valid_commit_succeeds_on_first_attempt() {
        let client = ScriptedClient::new(vec![committed("tx1", TxValidationCode::Valid)]);
        let task = task_with(client.clone(), spec(1), Arc::default());
        assert_eq!(task.attempts(), 0);

        task.invoke().await.unwrap();

        assert_eq!(task.outcome(), TaskOutcome::Succeeded);
        assert_eq!(task.attempts(), 1);
        assert!(task.last_error().is_none());
        assert_eq!(task.tx_id().as_deref(), Some("tx1"));
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].function, "put");
        assert_eq!(requests[0].args, vec![b"k".to_vec(), b"v".to_vec()]);
    }

    #[tokio::test]
    async fn mvcc_conflict_is_retried_and_kept_as_last_error() {
        let client = ScriptedClient::new(vec![
            committed("tx1", TxValidationCode::MvccReadConflict),
            committed("tx2", TxValidationCode::Valid),
        ]);
        let task = task_with(client, spec(3), Arc::default());

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        task.set_callback(Box::new(move |id, err| {
            sink.lock().unwrap().push((id, err.map(|e| e.to_string())));
        }));

        task.invoke().await.unwrap();

        assert_eq!(task.attempts(), 2);
        let last = task.last_error().unwrap();
        assert_eq!(last.kind(), ErrorKind::Transient);
        assert!(last.to_string().contains("MVCC_READ_CONFLICT"));
        // tx id of the first proposal is kept
        assert_eq!(task.tx_id().as_deref(), Some("tx1"));
        assert_eq!(*fired.lock().unwrap(), vec![(TaskId::new(1), None)]);
    }

    #[tokio::test]
    async fn non_transient_code_fails_without_retry() {
        let client = ScriptedClient::new(vec![
            committed("tx1", TxValidationCode::EndorsementPolicyFailure),
            committed("tx2", TxValidationCode::Valid),
        ]);
        let task = task_with(client, spec(5), Arc::default());

        let err = task.invoke().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistent);
        assert_eq!(task.attempts(), 1);
        assert_eq!(task.outcome(), TaskOutcome::Failed);
        assert_eq!(task.last_error().unwrap().to_string(), err.to_string());
    }

    #[tokio::test]
    async fn single_attempt_does_not_retry_transient_errors() {
        let client = ScriptedClient::new(vec![
            Err(ClientError::Transport("connection refused".into())),
            committed("tx2", TxValidationCode::Valid),
        ]);
        let task = task_with(client, spec(1), Arc::default());

        let err = task.invoke().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(task.attempts(), 1);
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn commit_timeout_is_classified_and_retried() {
        let client = ScriptedClient::new(vec![
            Err(ClientError::CommitTimeout { tx_id: "tx1".into() }),
            Err(ClientError::CommitTimeout { tx_id: "tx2".into() }),
        ]);
        let task = task_with(client, spec(2), Arc::default());

        let err = task.invoke().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TimeoutOnCommit);
        assert_eq!(task.attempts(), 2);
        assert_eq!(task.tx_id().as_deref(), Some("tx1"));
    }

    #[tokio::test]
    async fn endorsement_rejection_passes_through_unchanged() {
        let rejected = InvocationError::transient("endorsement payload mismatch between a and b");
        let client = ScriptedClient::new(vec![Err(ClientError::Endorsement(rejected.clone()))]);
        let task = task_with(client, spec(1), Arc::default());

        let err = task.invoke().await.unwrap_err();
        assert_eq!(err.to_string(), rejected.to_string());
    }

    #[tokio::test]
    async fn verbose_task_prints_every_response() {
        let client = ScriptedClient::new(vec![
            committed("tx1", TxValidationCode::MvccReadConflict),
            committed("tx2", TxValidationCode::Valid),
        ]);
        let printer = Arc::new(CapturingPrinter::default());
        let mut spec = spec(3);
        spec.verbose = true;
        spec.payload_only = true;
        let task = task_with(client, spec, Arc::clone(&printer));

        task.invoke().await.unwrap();

        let printed = printer.responses.lock().unwrap();
        assert_eq!(
            *printed,
            vec![
                (TaskId::new(1), "tx1".to_string(), true),
                (TaskId::new(1), "tx2".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn quiet_task_prints_nothing() {
        let client = ScriptedClient::new(vec![committed("tx1", TxValidationCode::Valid)]);
        let printer = Arc::new(CapturingPrinter::default());
        let task = task_with(client, spec(1), Arc::clone(&printer));
        task.invoke().await.unwrap();
        assert!(printer.responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_mode_uses_query_and_never_retries() {
        let client = ScriptedClient::new(vec![
            Err(ClientError::Proposal("endorser timeout".into())),
            committed("tx2", TxValidationCode::Valid),
        ]);
        let task = task_with(
            client.clone(),
            spec(5).with_mode(InvokeMode::Query),
            Arc::default(),
        );

        assert!(task.invoke().await.is_err());
        assert_eq!(task.attempts(), 1);
        assert_eq!(client.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_task_is_not_invoked_twice() {
        let client = ScriptedClient::new(vec![committed("tx1", TxValidationCode::Valid)]);
        let task = task_with(client.clone(), spec(1), Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        task.set_callback(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        task.invoke().await.unwrap();
        task.invoke().await.unwrap();

        assert_eq!(client.requests.lock().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(task.attempts(), 1);
    }

    #[tokio::test]
    async fn templates_are_expanded_before_submission() {
        let client = ScriptedClient::new(vec![committed("tx1", TxValidationCode::Valid)]);
        let spec = TaskSpec::new("mycc", ArgSet::new("put", ["key_$pad(2,ab)", "v"]));
        let task = task_with(client.clone(), spec, Arc::default());

        task.invoke().await.unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].args[0], b"key_abab".to_vec());
    }
}
