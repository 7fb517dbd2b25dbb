//! Failure classification.
//!
//! Decides whether an error returned by a protected operation counts toward
//! the failure threshold. The default counts every error; callers that want
//! e.g. validation errors from a dependency to pass through untouched inject
//! their own predicate.
//!
//! Deadline overruns are always counted and never reach the classifier.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync;

/// Predicate deciding which operation errors are countable failures.
#[derive(Clone)]
pub struct FailureClassifier {
    predicate: Option<Arc<Predicate>>,
}

impl FailureClassifier {
    /// Count every error as a failure.
    pub fn count_all() -> Self {
        Self { predicate: None }
    }

    /// Count only the errors for which `predicate` returns true.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Count only errors of concrete type `E` (checked by downcast).
    pub fn only<E: StdError + 'static>() -> Self {
        Self::new(|err| err.is::<E>())
    }

    /// Count everything except errors of concrete type `E`.
    pub fn except<E: StdError + 'static>() -> Self {
        Self::new(|err| !err.is::<E>())
    }

    pub fn is_countable(&self, err: &(dyn StdError + 'static)) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(err),
            None => true,
        }
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::count_all()
    }
}

impl fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.predicate {
            Some(_) => f.write_str("FailureClassifier(custom)"),
            None => f.write_str("FailureClassifier(count_all)"),
        }
    }
}
