use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::fallback::conversation::Turn;
use crate::fallback::rate_limit::{Sleeper, ThreadSleeper, retry_delay};
use crate::fallback::service::{CompletionService, ServiceError};
use crate::fallback::think::strip_think_markup;

/// Successful completion and the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub text: String,
    pub model_used: String,
}

#[derive(Debug)]
pub enum DispatchError {
    /// Every candidate failed. `last_error` is `None` only when no candidate
    /// was supplied.
    AllCandidatesExhausted { last_error: Option<ServiceError> },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllCandidatesExhausted { last_error: None } => {
                write!(f, "All configured model quotas are exhausted: no candidate models given.")
            }
            Self::AllCandidatesExhausted {
                last_error: Some(err),
            } => write!(
                f,
                "All configured model quotas are exhausted. Last error: {err}"
            ),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AllCandidatesExhausted { last_error } => last_error
                .as_ref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
        }
    }
}

/// Hooks for progress the caller may want to surface.
pub trait DispatchObserver: Send + Sync {
    /// About to sleep `delay` before retrying `model`.
    fn rate_limited(&self, _model: &str, _delay: Duration) {}
    /// `model` is out of quota for this call and is being skipped.
    fn quota_exhausted(&self, _model: &str) {}
    /// `model` failed for a reason other than rate limiting.
    fn candidate_failed(&self, _model: &str, _error: &ServiceError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}

/// Tries candidate models in order until one answers.
pub struct Dispatcher<S> {
    service: S,
    sleeper: Box<dyn Sleeper>,
    observer: Box<dyn DispatchObserver>,
    /// Cap on consecutive delayed retries per candidate. Unbounded when `None`.
    rate_limit_retries: Option<u32>,
}

impl<S: CompletionService> Dispatcher<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            sleeper: Box::new(ThreadSleeper),
            observer: Box::new(NoopObserver),
            rate_limit_retries: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_observer(mut self, observer: impl DispatchObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Moves on from a candidate after `retries` delayed retries instead of
    /// waiting on it for as long as the service keeps advertising a delay.
    pub fn with_rate_limit_retries(mut self, retries: u32) -> Self {
        self.rate_limit_retries = Some(retries);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Sends `conversation` to each candidate in turn.
    ///
    /// A rate limit with an advertised delay sleeps `min(delay, max_wait)` and
    /// retries the same candidate; one without a delay skips the candidate.
    /// Any other error skips the candidate. The reply has its think markup
    /// stripped before it is returned.
    pub fn dispatch<C: AsRef<str>>(
        &self,
        conversation: &[Turn],
        candidates: &[C],
        max_wait: Duration,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut last_error = None;

        for candidate in candidates {
            let model = candidate.as_ref();
            let mut retries = 0;

            loop {
                debug!(model, turns = conversation.len(), retries, "requesting completion");

                let err = match self.service.complete(model, conversation, max_wait) {
                    Ok(raw) => {
                        let text = strip_think_markup(&raw);
                        info!(model, "completion succeeded");
                        return Ok(DispatchOutcome {
                            text,
                            model_used: model.to_string(),
                        });
                    }
                    Err(err) => err,
                };

                if let ServiceError::RateLimited { retry_after } = &err {
                    match retry_delay(*retry_after, max_wait) {
                        Some(delay) if self.rate_limit_retries.is_none_or(|cap| retries < cap) => {
                            info!(model, delay_ms = delay.as_millis() as u64, "rate limited, retrying");
                            self.observer.rate_limited(model, delay);
                            self.sleeper.sleep(delay);
                            retries += 1;
                            continue;
                        }
                        _ => {
                            info!(model, "quota exhausted, switching model");
                            self.observer.quota_exhausted(model);
                        }
                    }
                } else {
                    info!(model, error = %err, "model failed, switching");
                    self.observer.candidate_failed(model, &err);
                }

                last_error = Some(err);
                break;
            }
        }

        Err(DispatchError::AllCandidatesExhausted { last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    type Script = HashMap<String, VecDeque<Result<String, ServiceError>>>;

    /// Replays scripted replies per model and records every call.
    #[derive(Default)]
    struct FakeService {
        script: Mutex<Script>,
        calls: Mutex<Vec<String>>,
        timeouts: Mutex<Vec<Duration>>,
    }

    impl FakeService {
        fn reply(self, model: &str, result: Result<&str, ServiceError>) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(model.to_string())
                .or_default()
                .push_back(result.map(str::to_string));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    impl CompletionService for FakeService {
        fn complete(
            &self,
            model: &str,
            _conversation: &[Turn],
            timeout: Duration,
        ) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.timeouts.lock().unwrap().push(timeout);
            self.script
                .lock()
                .unwrap()
                .get_mut(model)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(ServiceError::other(format!("{model} not scripted"))))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.0.lock().unwrap().push(delay);
        }
    }

    #[derive(Clone, Default)]
    struct RecordingObserver(Arc<Mutex<Vec<String>>>);

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl DispatchObserver for RecordingObserver {
        fn rate_limited(&self, model: &str, delay: Duration) {
            self.0
                .lock()
                .unwrap()
                .push(format!("rate_limited {model} {}s", delay.as_secs()));
        }

        fn quota_exhausted(&self, model: &str) {
            self.0.lock().unwrap().push(format!("quota_exhausted {model}"));
        }

        fn candidate_failed(&self, model: &str, error: &ServiceError) {
            self.0.lock().unwrap().push(format!("failed {model}: {error}"));
        }
    }

    const MAX_WAIT: Duration = Duration::from_secs(45);

    fn conversation() -> Vec<Turn> {
        vec![Turn::user("hello")]
    }

    fn rate_limited(secs: Option<u64>) -> ServiceError {
        ServiceError::RateLimited {
            retry_after: secs.map(Duration::from_secs),
        }
    }

    #[test]
    fn first_success_returns_without_touching_later_models() {
        let service = FakeService::default().reply("a", Ok("hi"));
        let dispatcher = Dispatcher::new(&service);

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b", "c"], MAX_WAIT)
            .expect("first model should answer");

        assert_eq!(outcome.model_used, "a");
        assert_eq!(outcome.text, "hi");
        assert_eq!(service.calls(), ["a"]);
    }

    #[test]
    fn service_error_advances_to_next_model() {
        let service = FakeService::default()
            .reply("a", Err(ServiceError::other("boom")))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service);

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(outcome.model_used, "b");
        assert_eq!(service.calls(), ["a", "b"]);
    }

    #[test]
    fn rate_limit_with_delay_sleeps_and_retries_same_model() {
        let sleeper = RecordingSleeper::default();
        let service = FakeService::default()
            .reply("a", Err(rate_limited(Some(5))))
            .reply("a", Ok("after wait"));
        let dispatcher = Dispatcher::new(&service).with_sleeper(sleeper.clone());

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("retry should succeed");

        assert_eq!(outcome.model_used, "a");
        assert_eq!(service.calls(), ["a", "a"]);
        assert_eq!(*sleeper.0.lock().unwrap(), [Duration::from_secs(5)]);
    }

    #[test]
    fn service_error_notifies_observer() {
        let observer = RecordingObserver::default();
        let service = FakeService::default()
            .reply("a", Err(ServiceError::other("boom")))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service).with_observer(observer.clone());

        dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(observer.events(), ["failed a: boom"]);
    }

    #[test]
    fn every_attempt_is_bounded_by_max_wait() {
        let service = FakeService::default()
            .reply("a", Err(rate_limited(Some(1))))
            .reply("a", Err(ServiceError::other("down")))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service).with_sleeper(RecordingSleeper::default());
        let max_wait = Duration::from_secs(7);

        dispatcher
            .dispatch(&conversation(), &["a", "b"], max_wait)
            .expect("second model should answer");

        assert_eq!(service.timeouts(), [max_wait; 3]);
    }

    #[test]
    fn repeated_delayed_rate_limits_stay_on_same_model_by_default() {
        let sleeper = RecordingSleeper::default();
        let observer = RecordingObserver::default();
        let mut service = FakeService::default();
        for _ in 0..5 {
            service = service.reply("a", Err(rate_limited(Some(5))));
        }
        let service = service.reply("a", Ok("finally")).reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service)
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone());

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("first model should answer after waiting");

        assert_eq!(outcome.model_used, "a");
        assert_eq!(outcome.text, "finally");
        assert_eq!(service.calls(), ["a"; 6]);
        assert_eq!(*sleeper.0.lock().unwrap(), [Duration::from_secs(5); 5]);
        assert_eq!(observer.events(), ["rate_limited a 5s"; 5]);
    }

    #[test]
    fn rate_limit_delay_is_capped_by_max_wait() {
        let sleeper = RecordingSleeper::default();
        let service = FakeService::default()
            .reply("a", Err(rate_limited(Some(600))))
            .reply("a", Ok("ok"));
        let dispatcher = Dispatcher::new(&service).with_sleeper(sleeper.clone());

        dispatcher
            .dispatch(&conversation(), &["a"], Duration::from_secs(2))
            .expect("retry should succeed");

        assert_eq!(*sleeper.0.lock().unwrap(), [Duration::from_secs(2)]);
    }

    #[test]
    fn rate_limit_without_delay_advances_without_sleeping() {
        let sleeper = RecordingSleeper::default();
        let observer = RecordingObserver::default();
        let service = FakeService::default()
            .reply("a", Err(rate_limited(None)))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service)
            .with_sleeper(sleeper.clone())
            .with_observer(observer.clone());

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(outcome.model_used, "b");
        assert!(sleeper.0.lock().unwrap().is_empty());
        assert_eq!(observer.events(), ["quota_exhausted a"]);
    }

    #[test]
    fn zero_retry_after_is_treated_as_no_retry() {
        let sleeper = RecordingSleeper::default();
        let service = FakeService::default()
            .reply("a", Err(ServiceError::RateLimited {
                retry_after: Some(Duration::ZERO),
            }))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service).with_sleeper(sleeper.clone());

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(outcome.model_used, "b");
        assert_eq!(service.calls(), ["a", "b"]);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[test]
    fn opt_in_retry_cap_moves_on_from_rate_limited_model() {
        let sleeper = RecordingSleeper::default();
        let service = FakeService::default()
            .reply("a", Err(rate_limited(Some(1))))
            .reply("a", Err(rate_limited(Some(1))))
            .reply("a", Err(rate_limited(Some(1))))
            .reply("b", Ok("from b"));
        let dispatcher = Dispatcher::new(&service)
            .with_sleeper(sleeper.clone())
            .with_rate_limit_retries(2);

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(outcome.model_used, "b");
        assert_eq!(service.calls(), ["a", "a", "a", "b"]);
        assert_eq!(sleeper.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn exhausting_all_models_wraps_last_error() {
        let service = FakeService::default()
            .reply("a", Err(ServiceError::other("first")))
            .reply("b", Err(rate_limited(None)))
            .reply("c", Err(ServiceError::other("third")));
        let dispatcher = Dispatcher::new(&service);

        let err = dispatcher
            .dispatch(&conversation(), &["a", "b", "c"], MAX_WAIT)
            .expect_err("every model fails");

        match err {
            DispatchError::AllCandidatesExhausted {
                last_error: Some(ServiceError::Other { detail }),
            } => assert_eq!(detail, "third"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(service.calls(), ["a", "b", "c"]);
    }

    #[test]
    fn empty_candidate_list_fails_without_calls() {
        let service = FakeService::default();
        let dispatcher = Dispatcher::new(&service);
        let candidates: [&str; 0] = [];

        let err = dispatcher
            .dispatch(&conversation(), &candidates, MAX_WAIT)
            .expect_err("nothing to try");

        assert!(matches!(
            err,
            DispatchError::AllCandidatesExhausted { last_error: None }
        ));
        assert!(service.calls().is_empty());
    }

    #[test]
    fn think_markup_is_stripped_from_fallback_reply() {
        let service = FakeService::default()
            .reply("a", Err(ServiceError::other("down")))
            .reply("b", Ok("<think>reasoning</think>Hello"));
        let dispatcher = Dispatcher::new(&service);

        let outcome = dispatcher
            .dispatch(&conversation(), &["a", "b"], MAX_WAIT)
            .expect("second model should answer");

        assert_eq!(outcome.text, "Hello");
    }

    #[test]
    fn exhausted_error_exposes_source() {
        use std::error::Error;

        let service = FakeService::default().reply("a", Err(ServiceError::other("nope")));
        let err = Dispatcher::new(&service)
            .dispatch(&conversation(), &["a"], MAX_WAIT)
            .expect_err("only model fails");

        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("nope"));
        assert!(err.to_string().contains("Last error: nope"));
    }
}
