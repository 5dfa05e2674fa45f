use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::SoftAssertError;
use crate::logging::{Logger, MessageType};

#[derive(Debug, Default)]
struct SoftAssertState {
    total: usize,
    passed: usize,
    failures: Vec<String>,
}

/// Collects assertion outcomes without stopping the test
///
/// Each check is logged; the test is failed at teardown when any check failed.
pub struct SoftAssert {
    logger: Arc<dyn Logger>,
    state: Mutex<SoftAssertState>,
}

impl SoftAssert {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            state: Mutex::new(SoftAssertState::default()),
        }
    }

    /// Check that two values are equal
    pub fn are_equal<T: PartialEq + Debug>(&self, expected: T, actual: T, name: &str) -> bool {
        if expected == actual {
            self.record(name, Ok(()))
        } else {
            self.record(name, Err(format!("expected {:?} but was {:?}", expected, actual)))
        }
    }

    pub fn is_true(&self, condition: bool, name: &str) -> bool {
        let outcome = if condition {
            Ok(())
        } else {
            Err("expected true but was false".to_string())
        };
        self.record(name, outcome)
    }

    pub fn is_false(&self, condition: bool, name: &str) -> bool {
        let outcome = if condition {
            Err("expected false but was true".to_string())
        } else {
            Ok(())
        };
        self.record(name, outcome)
    }

    /// Run an arbitrary check; an `Err` message marks it failed
    pub fn assert<F>(&self, name: &str, check: F) -> bool
    where
        F: FnOnce() -> Result<(), String>,
    {
        self.record(name, check())
    }

    pub fn did_soft_asserts_fail(&self) -> bool {
        !self.state.lock().failures.is_empty()
    }

    pub fn number_of_asserts(&self) -> usize {
        self.state.lock().total
    }

    pub fn number_of_passed_asserts(&self) -> usize {
        self.state.lock().passed
    }

    pub fn number_of_failed_asserts(&self) -> usize {
        self.state.lock().failures.len()
    }

    pub fn failures(&self) -> Vec<String> {
        self.state.lock().failures.clone()
    }

    /// Error out if any soft assert failed
    pub fn fail_test_if_assert_failed(&self) -> Result<(), SoftAssertError> {
        let state = self.state.lock();
        if state.failures.is_empty() {
            return Ok(());
        }

        Err(SoftAssertError::Failed {
            failures: state.failures.clone(),
        })
    }

    fn record(&self, name: &str, outcome: Result<(), String>) -> bool {
        let (message_type, message, passed) = match outcome {
            Ok(()) => (MessageType::Success, format!("Soft assert '{}' passed", name), true),
            Err(reason) => {
                let message = format!("Soft assert '{}' failed: {}", name, reason);
                (MessageType::Warning, message, false)
            }
        };

        {
            let mut state = self.state.lock();
            state.total += 1;
            if passed {
                state.passed += 1;
            } else {
                state.failures.push(message.clone());
            }
        }

        if let Err(e) = self.logger.log_message(message_type, &message) {
            log::warn!("Failed to log soft assert result: {}", e);
        }
        passed
    }
}
