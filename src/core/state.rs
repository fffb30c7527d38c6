//! Application state store.
//!
//! A single observable container for everything the render layer shows:
//! the pet's expression, the weather, the hover menu, the speech bubble,
//! the processing flag and a mirror of the todo list. Mutation only goes
//! through the methods here; each one notifies subscribers with a
//! [`StateChange`].
//!
//! Timed effects (speech bubble auto-hide, transient expressions) keep the
//! [`TimerId`] of the timer they armed. A firing whose id no longer matches
//! belongs to a superseded call and is ignored.

use crate::core::timer::{PetTimers, TimerEvent, TimerId};
use crate::store::{Task, TaskId};
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The pet's facial expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    #[default]
    Default,
    Happy,
    Talking,
    Thinking,
    Worried,
    Sleepy,
    Rainy,
    Sadly,
    Proudly,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Expression::Default => "default",
            Expression::Happy => "happy",
            Expression::Talking => "talking",
            Expression::Thinking => "thinking",
            Expression::Worried => "worried",
            Expression::Sleepy => "sleepy",
            Expression::Rainy => "rainy",
            Expression::Sadly => "sadly",
            Expression::Proudly => "proudly",
        };
        f.write_str(name)
    }
}

/// Coarse weather condition shown by the pet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sunny,
    #[default]
    Cloudy,
    Rainy,
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Rainy => "rainy",
        };
        f.write_str(name)
    }
}

/// Speech bubble content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechBubble {
    pub visible: bool,
    pub text: String,
}

/// Everything the render layer needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub expression: Expression,
    pub weather: WeatherCondition,
    pub hover_menu_visible: bool,
    pub speech: SpeechBubble,
    pub processing: bool,
    pub todos: Vec<Task>,
}

/// Notification sent to subscribers after each mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Expression(Expression),
    Weather(WeatherCondition),
    HoverMenu(bool),
    Speech(SpeechBubble),
    Processing(bool),
    /// Todo mirror changed; carries the new length
    Todos(usize),
}

/// The observable application state.
#[derive(Debug, Default)]
pub struct AppStore {
    state: AppSnapshot,
    speech_timer: Option<TimerId>,
    expression_timer: Option<TimerId>,
    subscribers: Vec<Sender<StateChange>>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn snapshot(&self) -> &AppSnapshot {
        &self.state
    }

    pub fn expression(&self) -> Expression {
        self.state.expression
    }

    pub fn weather(&self) -> WeatherCondition {
        self.state.weather
    }

    pub fn hover_menu_visible(&self) -> bool {
        self.state.hover_menu_visible
    }

    pub fn speech(&self) -> &SpeechBubble {
        &self.state.speech
    }

    pub fn is_processing(&self) -> bool {
        self.state.processing
    }

    pub fn todos(&self) -> &[Task] {
        &self.state.todos
    }

    /// Subscribe to state changes.
    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    fn notify(&mut self, change: StateChange) {
        // Dropped receivers unsubscribe themselves.
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }

    /// Set the expression. Supersedes any pending transient restore.
    pub fn set_expression(&mut self, expression: Expression, timers: &mut PetTimers) {
        if let Some(old) = self.expression_timer.take() {
            timers.cancel(old);
        }
        self.apply_expression(expression);
    }

    /// Show `expression` for `hold`, then return to `Expression::Default`.
    pub fn flash_expression(
        &mut self,
        expression: Expression,
        hold: Duration,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        if let Some(old) = self.expression_timer.take() {
            timers.cancel(old);
        }
        self.apply_expression(expression);
        self.expression_timer = Some(timers.schedule(now, hold, TimerEvent::ExpressionRestore));
    }

    /// Handle the restore timer of a transient expression.
    pub fn on_expression_restore(&mut self, fired: TimerId) {
        if self.expression_timer != Some(fired) {
            return;
        }
        self.expression_timer = None;
        self.apply_expression(Expression::Default);
    }

    /// Whether a transient expression is still waiting to be restored.
    pub fn expression_transition_pending(&self) -> bool {
        self.expression_timer.is_some()
    }

    fn apply_expression(&mut self, expression: Expression) {
        if self.state.expression != expression {
            tracing::debug!("Expression {} -> {}", self.state.expression, expression);
            self.state.expression = expression;
            self.notify(StateChange::Expression(expression));
        }
    }

    pub fn set_weather(&mut self, weather: WeatherCondition) {
        if self.state.weather != weather {
            self.state.weather = weather;
            self.notify(StateChange::Weather(weather));
        }
    }

    pub fn set_hover_menu(&mut self, visible: bool) {
        if self.state.hover_menu_visible != visible {
            self.state.hover_menu_visible = visible;
            self.notify(StateChange::HoverMenu(visible));
        }
    }

    pub fn set_processing(&mut self, processing: bool) {
        if self.state.processing != processing {
            self.state.processing = processing;
            self.notify(StateChange::Processing(processing));
        }
    }

    /// Show a speech bubble that hides itself after `duration`.
    ///
    /// A newer call replaces the text and restarts the timer; the older
    /// call's timer is cancelled and could not hide the new bubble anyway.
    pub fn show_speech(
        &mut self,
        text: impl Into<String>,
        duration: Duration,
        timers: &mut PetTimers,
        now: DateTime<Utc>,
    ) {
        if let Some(old) = self.speech_timer.take() {
            timers.cancel(old);
        }
        self.state.speech = SpeechBubble {
            visible: true,
            text: text.into(),
        };
        self.speech_timer = Some(timers.schedule(now, duration, TimerEvent::SpeechExpired));
        self.notify(StateChange::Speech(self.state.speech.clone()));
    }

    /// Hide the speech bubble now.
    pub fn hide_speech(&mut self, timers: &mut PetTimers) {
        if let Some(old) = self.speech_timer.take() {
            timers.cancel(old);
        }
        self.clear_speech();
    }

    /// Handle the auto-hide timer of a speech bubble.
    pub fn on_speech_expired(&mut self, fired: TimerId) {
        if self.speech_timer != Some(fired) {
            return;
        }
        self.speech_timer = None;
        self.clear_speech();
    }

    fn clear_speech(&mut self) {
        if self.state.speech != SpeechBubble::default() {
            self.state.speech = SpeechBubble::default();
            self.notify(StateChange::Speech(SpeechBubble::default()));
        }
    }

    /// Replace the whole mirror.
    pub fn set_todos(&mut self, todos: Vec<Task>) {
        self.state.todos = todos;
        self.notify_todos();
    }

    /// Prepend a newly created todo.
    pub fn add_todo(&mut self, todo: Task) {
        self.state.todos.insert(0, todo);
        self.notify_todos();
    }

    /// Flip a todo's completion. Returns the new completion flag.
    pub fn toggle_todo(&mut self, id: &TaskId, now: DateTime<Utc>) -> Option<bool> {
        let todo = self.state.todos.iter_mut().find(|t| t.id == *id)?;
        let completed = !todo.is_completed;
        todo.set_completed(completed, now);
        self.notify_todos();
        Some(completed)
    }

    /// Remove a todo. Returns false if it was not mirrored.
    pub fn delete_todo(&mut self, id: &TaskId) -> bool {
        let before = self.state.todos.len();
        self.state.todos.retain(|t| t.id != *id);
        let removed = self.state.todos.len() != before;
        if removed {
            self.notify_todos();
        }
        removed
    }

    /// Rename a todo. Returns false if it was not mirrored.
    pub fn update_todo_title(&mut self, id: &TaskId, title: &str) -> bool {
        match self.state.todos.iter_mut().find(|t| t.id == *id) {
            Some(todo) => {
                todo.title = title.to_string();
                self.notify_todos();
                true
            }
            None => false,
        }
    }

    /// Overwrite the mirrored copy of a task.
    pub fn replace_todo(&mut self, task: &Task) -> bool {
        match self.state.todos.iter_mut().find(|t| t.id == task.id) {
            Some(todo) => {
                *todo = task.clone();
                self.notify_todos();
                true
            }
            None => false,
        }
    }

    /// True when at least one todo exists and every todo is complete.
    pub fn all_todos_complete(&self) -> bool {
        !self.state.todos.is_empty() && self.state.todos.iter().all(|t| t.is_completed)
    }

    fn notify_todos(&mut self) {
        let len = self.state.todos.len();
        self.notify(StateChange::Todos(len));
    }

    /// Forget pending timed effects (shutdown).
    pub fn clear_timers(&mut self, timers: &mut PetTimers) {
        if let Some(id) = self.speech_timer.take() {
            timers.cancel(id);
        }
        if let Some(id) = self.expression_timer.take() {
            timers.cancel(id);
        }
    }
}
