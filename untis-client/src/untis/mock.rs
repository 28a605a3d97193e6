//! In-memory WebUntis source for testing without a server.
//!
//! Serves canned JSON as if it came from the service, counts how often each
//! operation is called and can be told to fail the next call of an
//! operation. Every call yields to the scheduler once, so concurrent callers
//! interleave the way they would around real I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;

use crate::domain::{ResourceType, TimetableFor, User};

use super::error::{BAD_CREDENTIALS_CODE, UntisError};
use super::source::UntisSource;

/// Operations of [`UntisSource`], for call counting and failure scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authenticate,
    Logout,
    Resources(ResourceType),
    PeriodGrid,
    Timetable,
    Students,
}

/// Mock source that serves canned payloads.
#[derive(Debug, Default)]
pub struct MockSource {
    username: String,
    password: String,
    resources: HashMap<ResourceType, Vec<Value>>,
    periods: Vec<Value>,
    timetables: HashMap<TimetableFor, Value>,
    students: Vec<Value>,
    calls: Mutex<HashMap<Operation, usize>>,
    failures: Mutex<HashMap<Operation, VecDeque<UntisError>>>,
    holds: Mutex<HashMap<Operation, Arc<Notify>>>,
}

impl MockSource {
    /// A source that accepts exactly these credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Serve these records for a reference collection.
    pub fn with_resources(mut self, kind: ResourceType, records: Vec<Value>) -> Self {
        self.resources.insert(kind, records);
        self
    }

    pub fn with_period_grid(mut self, rows: Vec<Value>) -> Self {
        self.periods = rows;
        self
    }

    /// Serve this payload for any week of `target`'s timetable.
    pub fn with_timetable(mut self, target: TimetableFor, payload: Value) -> Self {
        self.timetables.insert(target, payload);
        self
    }

    pub fn with_students(mut self, records: Vec<Value>) -> Self {
        self.students = records;
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: UntisError) {
        lock(&self.failures)
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Make the next call of `operation` wait until the returned handle is
    /// notified.
    pub fn hold_next(&self, operation: Operation) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        lock(&self.holds).insert(operation, release.clone());
        release
    }

    /// How often `operation` has been called.
    pub fn calls(&self, operation: Operation) -> usize {
        lock(&self.calls).get(&operation).copied().unwrap_or(0)
    }

    async fn enter(&self, operation: Operation) -> Result<(), UntisError> {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
        tokio::task::yield_now().await;

        let hold = lock(&self.holds).remove(&operation);
        if let Some(release) = hold {
            release.notified().await;
        }

        let scripted = lock(&self.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UntisSource for MockSource {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, UntisError> {
        self.enter(Operation::Authenticate).await?;

        if username != self.username || password != self.password {
            return Err(UntisError::Remote {
                method: "authenticate".to_string(),
                code: BAD_CREDENTIALS_CODE,
                message: "bad credentials".to_string(),
            });
        }

        Ok(User {
            username: username.to_string(),
            session_id: "MOCKSESSION".to_string(),
            person_type: Some(ResourceType::Teacher),
            person_id: 1,
            class_id: None,
        })
    }

    async fn logout(&self) -> Result<(), UntisError> {
        self.enter(Operation::Logout).await
    }

    async fn fetch_resource_list(&self, kind: ResourceType) -> Result<Vec<Value>, UntisError> {
        self.enter(Operation::Resources(kind)).await?;
        Ok(self.resources.get(&kind).cloned().unwrap_or_default())
    }

    async fn fetch_period_grid(&self) -> Result<Vec<Value>, UntisError> {
        self.enter(Operation::PeriodGrid).await?;
        Ok(self.periods.clone())
    }

    async fn fetch_weekly_timetable(
        &self,
        target: TimetableFor,
        _date: NaiveDate,
    ) -> Result<Value, UntisError> {
        self.enter(Operation::Timetable).await?;
        self.timetables
            .get(&target)
            .cloned()
            .ok_or_else(|| UntisError::Transport {
                method: "timetable/weekly/data".to_string(),
                status: Some(404),
                message: format!("no mock timetable for {target}"),
            })
    }

    async fn fetch_students(&self, class_id: Option<i64>) -> Result<Vec<Value>, UntisError> {
        self.enter(Operation::Students).await?;
        Ok(self
            .students
            .iter()
            .filter(|s| match class_id {
                Some(id) => s.get("klasseId").and_then(Value::as_i64) == Some(id),
                None => true,
            })
            .cloned()
            .collect())
    }
}
