//! Coaching Tool Collaborators
//!
//! The side-effecting operations the coach can perform for a user. They are
//! the only code that writes session records: assigning exercises, counting
//! reminders, and storing completion feedback.

use crate::error::ToolError;
use crate::policy::MAX_REMINDERS;
use crate::session::{SessionStore, validate_user_id};
use async_trait::async_trait;
use chrono::Utc;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::info;

/// Side-effecting operations on a user's coaching session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoachingTools: Send + Sync {
    /// Assigns a new exercise to the user and returns a confirmation.
    async fn send_exercise(&self, user_id: &str) -> Result<String, ToolError>;

    /// Sends a reminder about the current exercise and counts it.
    async fn send_reminder(&self, user_id: &str) -> Result<String, ToolError>;

    /// Stores the user's completion feedback for the current exercise.
    async fn record_feedback(&self, user_id: &str, feedback: &str) -> Result<String, ToolError>;
}

/// The pool of exercises the coach assigns from.
#[derive(Debug, Clone)]
pub struct ExerciseCatalog {
    exercises: Vec<String>,
}

impl Default for ExerciseCatalog {
    fn default() -> Self {
        Self::new(
            [
                "20 pushups",
                "30 bodyweight squats",
                "a 60-second plank",
                "20 walking lunges",
                "30 jumping jacks",
                "15 glute bridges",
                "10 burpees",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl ExerciseCatalog {
    /// Creates a catalog. An empty list falls back to the default catalog.
    pub fn new(exercises: Vec<String>) -> Self {
        if exercises.is_empty() {
            return Self::default();
        }
        Self { exercises }
    }

    pub fn exercises(&self) -> &[String] {
        &self.exercises
    }

    /// Picks an exercise at random, avoiding `previous` when there is a choice.
    pub fn pick(&self, previous: Option<&str>) -> String {
        let candidates: Vec<&String> = self
            .exercises
            .iter()
            .filter(|e| Some(e.as_str()) != previous)
            .collect();
        let pool: Vec<&String> = if candidates.is_empty() {
            self.exercises.iter().collect()
        } else {
            candidates
        };
        pool.choose(&mut rand::rng())
            .map(|e| (*e).clone())
            .unwrap_or_default()
    }
}

/// `CoachingTools` that record their effects in a `SessionStore`.
///
/// Messages are not delivered anywhere; the returned strings are what a
/// messaging integration would send.
pub struct StoreTools {
    store: Arc<dyn SessionStore>,
    catalog: ExerciseCatalog,
}

impl StoreTools {
    pub fn new(store: Arc<dyn SessionStore>, catalog: ExerciseCatalog) -> Self {
        Self { store, catalog }
    }
}

#[async_trait]
impl CoachingTools for StoreTools {
    async fn send_exercise(&self, user_id: &str) -> Result<String, ToolError> {
        validate_user_id(user_id)?;
        let mut record = self.store.get(user_id).await?;
        let exercise = self.catalog.pick(record.last_exercise.as_deref());

        // A new assignment starts a fresh reminder cycle.
        record.last_exercise = Some(exercise.clone());
        record.feedback = None;
        record.reminders_sent = 0;
        record.scheduled_time = Some(Utc::now());
        self.store.put(record).await?;

        info!(user_id = %user_id, exercise = %exercise, "Assigned new exercise");
        Ok(format!(
            "Today's exercise for {}: {}. Let me know how it went once you're done!",
            user_id, exercise
        ))
    }

    async fn send_reminder(&self, user_id: &str) -> Result<String, ToolError> {
        validate_user_id(user_id)?;
        let mut record = self.store.get(user_id).await?;
        let exercise = record
            .last_exercise
            .clone()
            .ok_or_else(|| ToolError::NoExercise(user_id.to_string()))?;
        if record.reminders_sent >= MAX_REMINDERS {
            return Err(ToolError::ReminderLimit {
                user_id: user_id.to_string(),
                limit: MAX_REMINDERS,
            });
        }

        record.reminders_sent += 1;
        let sent = record.reminders_sent;
        self.store.put(record).await?;

        info!(user_id = %user_id, reminders_sent = sent, "Sent reminder");
        Ok(format!(
            "Reminder {}/{} for {}: don't forget to complete {}!",
            sent, MAX_REMINDERS, user_id, exercise
        ))
    }

    async fn record_feedback(&self, user_id: &str, feedback: &str) -> Result<String, ToolError> {
        validate_user_id(user_id)?;
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(ToolError::EmptyFeedback);
        }
        let mut record = self.store.get(user_id).await?;
        let exercise = record
            .last_exercise
            .clone()
            .ok_or_else(|| ToolError::NoExercise(user_id.to_string()))?;

        record.feedback = Some(feedback.to_string());
        self.store.put(record).await?;

        info!(user_id = %user_id, "Recorded feedback");
        Ok(format!("Feedback recorded for {}: '{}'", exercise, feedback))
    }
}
