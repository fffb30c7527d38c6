//! The pet controller.
//!
//! Owns the timer queue, the application state and every component, and
//! is the only thing that mutates them. Input sources hand it
//! [`PetEvent`]s and chat messages; the run loop calls [`PetController::advance`]
//! with the current time so due timers fire in deadline order.

use crate::activity::SharedActivityLog;
use crate::config::{Config, Timings};
use crate::core::{
    AppSnapshot, AppStore, AttentionTracker, Cooldown, Expression, FiredTimer, PetEvent, PetTimers,
    ReminderScheduler, StateChange, TimerEvent, TimerId, WeatherCondition, WindowCoordinator,
};
use crate::host::{PhysicalPosition, WindowHost};
use crate::services::intent::FAILURE_REPLY;
use crate::services::{ConversationSource, Intent, IntentReply, WeatherService};
use crate::store::{
    normalise_title, resolve_id, DailyCutoff, Priority, Settings, SettingsStore, StoreError, Task,
    TaskId, TaskStore,
};
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::Receiver;

/// How long the worried face of a reminder lasts.
const REMIND_EXPRESSION_HOLD_SECS: i64 = 3;
/// How long a reminder speech bubble stays up.
const REMIND_SPEECH_SECS: i64 = 7;
/// Happy face after a todo was created from chat.
const CREATED_EXPRESSION_HOLD_SECS: i64 = 2;
/// Proud face after the last open todo was completed.
const PROUD_EXPRESSION_HOLD_SECS: i64 = 3;

/// Text of a reminder speech bubble.
pub fn reminder_text(task: &Task) -> String {
    format!("「{}」 is still not done, keep an eye on it ⚡", task.title)
}

/// Controller tunables.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PetOptions {
    pub timings: Timings,
    pub cutoff: DailyCutoff,
    pub cooldown: Cooldown,
}

impl PetOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timings: config.timings(),
            cutoff: config.cutoff(),
            cooldown: config.cooldown(),
        }
    }
}

/// Everything the controller talks to.
pub struct Collaborators<H> {
    pub tasks: Box<dyn TaskStore>,
    pub settings: Box<dyn SettingsStore>,
    pub weather: WeatherService,
    pub conversation: Box<dyn ConversationSource>,
    pub host: H,
    pub activity: SharedActivityLog,
}

/// Owner of all pet state.
pub struct PetController<H> {
    options: PetOptions,
    timers: PetTimers,
    app: AppStore,
    reminder: ReminderScheduler,
    attention: AttentionTracker,
    panels: WindowCoordinator,
    tasks: Box<dyn TaskStore>,
    settings_store: Box<dyn SettingsStore>,
    settings: Settings,
    weather: WeatherService,
    conversation: Box<dyn ConversationSource>,
    host: H,
    activity: SharedActivityLog,
    weather_timer: Option<TimerId>,
    cutoff_timer: Option<TimerId>,
}

impl<H: WindowHost> PetController<H> {
    pub fn new(options: PetOptions, parts: Collaborators<H>) -> Self {
        let timings = options.timings;
        Self {
            options,
            timers: PetTimers::new(),
            app: AppStore::new(),
            reminder: ReminderScheduler::new(options.cooldown),
            attention: AttentionTracker::new(
                timings.idle_threshold,
                timings.hover_reveal,
                timings.hover_hide,
            ),
            panels: WindowCoordinator::with_default_panels(
                timings.panel_show,
                timings.panel_hide,
                timings.cursor_poll,
            ),
            settings: Settings::load(parts.settings.as_ref()),
            tasks: parts.tasks,
            settings_store: parts.settings,
            weather: parts.weather,
            conversation: parts.conversation,
            host: parts.host,
            activity: parts.activity,
            weather_timer: None,
            cutoff_timer: None,
        }
    }

    /// Bring the pet up: archive yesterday, load todos and settings, fetch
    /// the weather and arm every recurring timer.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.run_archive(now);
        self.reload_settings();
        self.refresh_weather(now);

        self.reminder
            .start(&mut self.timers, now, self.settings.reminder_interval_min);
        self.attention.start(&mut self.timers, now);
        self.arm_weather(now);
        self.arm_cutoff(now);
        self.panels.anchor_all(&mut self.host);

        tracing::info!(
            "Pet started with {} todos, next cutoff at {}",
            self.app.todos().len(),
            self.options.cutoff.next_after(now)
        );
    }

    /// Fire every timer due at or before `now`. Returns how many fired.
    pub fn advance(&mut self, now: DateTime<Utc>) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.timers.pop_due(now) {
            self.dispatch(timer);
            fired += 1;
        }
        fired
    }

    /// Stop every component and persist the activity log.
    pub fn shutdown(&mut self) {
        self.reminder.stop(&mut self.timers);
        self.attention.stop(&mut self.timers);
        self.panels.shutdown(&mut self.timers);
        self.app.clear_timers(&mut self.timers);
        self.weather_timer = None;
        self.cutoff_timer = None;
        self.timers.clear();

        if let Err(e) = self.activity.save() {
            tracing::warn!("Could not save activity log: {}", e);
        }
        tracing::info!("Pet stopped");
    }

    fn dispatch(&mut self, fired: FiredTimer<TimerEvent>) {
        let FiredTimer {
            deadline: at,
            id,
            event,
        } = fired;

        match event {
            TimerEvent::ReminderCycle => {
                let interval = self.settings.reminder_interval_min;
                if let Some(task) =
                    self.reminder
                        .on_cycle(id, &mut self.timers, self.tasks.as_mut(), at, interval)
                {
                    self.remind(&task, at);
                }
            }
            TimerEvent::IdleElapsed => {
                self.attention
                    .on_idle_elapsed(id, &mut self.app, &mut self.timers, at);
            }
            TimerEvent::HoverReveal => self.attention.on_hover_reveal(id, &mut self.app),
            TimerEvent::HoverHide => self.attention.on_hover_hide(id, &mut self.app),
            TimerEvent::PanelShow(panel) => {
                if self
                    .panels
                    .on_show_elapsed(id, &panel, &mut self.host, &mut self.timers, at)
                {
                    self.activity.record_panel_shown();
                }
            }
            TimerEvent::PanelHide(panel) => {
                self.panels
                    .on_hide_elapsed(id, &panel, &mut self.host, &mut self.timers);
            }
            TimerEvent::CursorPoll => {
                self.panels
                    .on_cursor_poll(id, &self.host, &mut self.timers, at);
            }
            TimerEvent::SpeechExpired => self.app.on_speech_expired(id),
            TimerEvent::ExpressionRestore => self.app.on_expression_restore(id),
            TimerEvent::WeatherRefresh => {
                if self.weather_timer == Some(id) {
                    self.weather_timer = None;
                    self.refresh_weather(at);
                    self.arm_weather(at);
                }
            }
            TimerEvent::ArchiveCutoff => {
                if self.cutoff_timer == Some(id) {
                    self.cutoff_timer = None;
                    self.run_archive(at);
                    self.arm_cutoff(at);
                }
            }
        }
    }

    fn remind(&mut self, task: &Task, at: DateTime<Utc>) {
        self.activity.record_reminder();
        self.app.flash_expression(
            Expression::Worried,
            Duration::seconds(REMIND_EXPRESSION_HOLD_SECS),
            &mut self.timers,
            at,
        );
        self.app.show_speech(
            reminder_text(task),
            Duration::seconds(REMIND_SPEECH_SECS),
            &mut self.timers,
            at,
        );
        // Unknown to the mirror: the store was changed from elsewhere.
        if !self.app.replace_todo(task) {
            self.reload_todos();
        }
    }

    fn arm_weather(&mut self, now: DateTime<Utc>) {
        if let Some(old) = self.weather_timer.take() {
            self.timers.cancel(old);
        }
        self.weather_timer = Some(self.timers.schedule(
            now,
            self.options.timings.weather_refresh,
            TimerEvent::WeatherRefresh,
        ));
    }

    fn arm_cutoff(&mut self, now: DateTime<Utc>) {
        if let Some(old) = self.cutoff_timer.take() {
            self.timers.cancel(old);
        }
        let next = self.options.cutoff.next_after(now);
        self.cutoff_timer = Some(self.timers.schedule_at(next, TimerEvent::ArchiveCutoff));
    }

    fn run_archive(&mut self, now: DateTime<Utc>) {
        match self.tasks.archive_and_purge(&self.options.cutoff, now) {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!("Archived {} tasks from before {}", count, self.options.cutoff.most_recent(now));
                self.activity.record_archived(count as u64);
            }
            Err(e) => tracing::warn!("Daily archive failed: {}", e),
        }
        self.reload_todos();
    }

    fn reload_todos(&mut self) {
        match self.tasks.list() {
            Ok(tasks) => self.app.set_todos(tasks),
            Err(e) => tracing::warn!("Could not load todos: {}", e),
        }
    }

    fn reload_settings(&mut self) {
        if let Err(e) = self.settings_store.reload() {
            tracing::warn!("Could not re-read settings, keeping last values: {}", e);
        }
        self.settings = Settings::load(self.settings_store.as_ref());
        tracing::debug!(
            "Settings loaded: interval {} min, city {}",
            self.settings.reminder_interval_min,
            self.settings.weather_city
        );
    }

    fn refresh_weather(&mut self, now: DateTime<Utc>) {
        let condition = self.weather.current(&self.settings, now);
        self.activity.record_weather_refresh();
        self.app.set_weather(condition);
        if condition == WeatherCondition::Rainy {
            self.app.set_expression(Expression::Rainy, &mut self.timers);
        } else if self.app.expression() == Expression::Rainy {
            self.app.set_expression(Expression::Default, &mut self.timers);
        }
    }

    /// Route a cross-window event.
    pub fn handle_event(&mut self, event: PetEvent, now: DateTime<Utc>) {
        tracing::debug!("Event {:?}", event);
        match event {
            PetEvent::SettingsChanged => self.reload_settings(),
            PetEvent::TodosChanged => self.reload_todos(),
            PetEvent::PanelPointerEnter { panel } => {
                self.panels
                    .panel_pointer_enter(&panel, &self.host, &mut self.timers);
            }
            PetEvent::PanelPointerLeave { panel } => {
                self.panels
                    .panel_pointer_leave(&panel, &self.host, &mut self.timers, now);
            }
            PetEvent::TriggerEnter { panel } => {
                self.panels
                    .trigger_enter(&panel, &self.host, &mut self.timers, now);
            }
            PetEvent::TriggerLeave { panel } => {
                self.panels
                    .trigger_leave(&panel, &self.host, &mut self.timers, now);
            }
            PetEvent::PrimaryMoved { x, y } => {
                self.panels
                    .primary_moved(PhysicalPosition::new(x, y), &mut self.host);
            }
            PetEvent::PetPointerEnter => {
                self.attention
                    .pointer_enter_pet(&mut self.app, &mut self.timers, now);
            }
            PetEvent::PetPointerLeave => self.attention.pointer_leave_pet(&mut self.timers, now),
            PetEvent::MenuPointerEnter => self.attention.pointer_enter_menu(&mut self.timers),
            PetEvent::Interaction => {
                self.attention
                    .record_interaction(&mut self.app, &mut self.timers, now);
            }
        }
    }

    /// Handle a chat message and return what the pet said.
    pub fn send_message(&mut self, text: &str, now: DateTime<Utc>) -> IntentReply {
        self.activity.record_message();
        self.attention
            .record_interaction(&mut self.app, &mut self.timers, now);
        self.app.set_processing(true);
        self.app.set_expression(Expression::Thinking, &mut self.timers);

        let result = self
            .conversation
            .process(self.settings.chat_api_key.as_deref(), text);

        let spoken = match result {
            Ok(reply) => match reply.todo.clone().filter(|_| reply.intent == Intent::CreateTodo) {
                Some(draft) => {
                    match self.tasks.create(&draft.title, draft.priority, now) {
                        Ok(task) => {
                            self.activity.record_todo_created();
                            self.app.add_todo(task);
                            self.app.flash_expression(
                                Expression::Happy,
                                Duration::seconds(CREATED_EXPRESSION_HOLD_SECS),
                                &mut self.timers,
                                now,
                            );
                            reply
                        }
                        Err(e) => {
                            tracing::warn!("Could not save todo from chat: {}", e);
                            self.app.set_expression(Expression::Default, &mut self.timers);
                            IntentReply::chat(FAILURE_REPLY)
                        }
                    }
                }
                None => {
                    self.app.set_expression(Expression::Default, &mut self.timers);
                    reply
                }
            },
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                self.app.set_expression(Expression::Default, &mut self.timers);
                IntentReply::chat(FAILURE_REPLY)
            }
        };

        self.app
            .show_speech(spoken.reply.clone(), self.options.timings.speech, &mut self.timers, now);
        self.app.set_processing(false);
        spoken
    }

    /// Create a todo directly.
    pub fn add_todo(
        &mut self,
        title: &str,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let title = normalise_title(title).ok_or(StoreError::EmptyTitle)?;
        let task = self.tasks.create(&title, priority, now)?;
        self.activity.record_todo_created();
        self.app.add_todo(task.clone());
        Ok(task)
    }

    /// Flip a todo's completion. Returns the new flag, or None if unknown.
    pub fn toggle_todo(&mut self, id: &TaskId, now: DateTime<Utc>) -> Option<bool> {
        let completed = self.app.toggle_todo(id, now)?;
        if let Err(e) = self.tasks.set_completed(id, completed, now) {
            tracing::warn!("Could not persist completion of {}: {}", id.short(), e);
        }
        if completed && self.app.all_todos_complete() {
            self.app.flash_expression(
                Expression::Proudly,
                Duration::seconds(PROUD_EXPRESSION_HOLD_SECS),
                &mut self.timers,
                now,
            );
        }
        Some(completed)
    }

    /// Rename a todo. Returns false for unknown ids or empty titles.
    pub fn edit_todo(&mut self, id: &TaskId, title: &str) -> bool {
        let Some(title) = normalise_title(title) else {
            return false;
        };
        if !self.app.update_todo_title(id, &title) {
            return false;
        }
        if let Err(e) = self.tasks.set_title(id, &title) {
            tracing::warn!("Could not persist title of {}: {}", id.short(), e);
        }
        true
    }

    /// Delete a todo. Returns false for unknown ids.
    pub fn delete_todo(&mut self, id: &TaskId) -> bool {
        if !self.app.delete_todo(id) {
            return false;
        }
        if let Err(e) = self.tasks.delete(id) {
            tracing::warn!("Could not persist deletion of {}: {}", id.short(), e);
        }
        true
    }

    /// Resolve a full id or unique prefix against the mirrored todos.
    pub fn resolve_todo(&self, needle: &str) -> Option<TaskId> {
        resolve_id(self.app.todos(), needle)
    }

    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        self.app.subscribe()
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        self.app.snapshot()
    }

    pub fn app(&self) -> &AppStore {
        &self.app
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tasks(&self) -> &dyn TaskStore {
        self.tasks.as_ref()
    }

    pub fn panels(&self) -> &WindowCoordinator {
        &self.panels
    }

    pub fn reminder(&self) -> &ReminderScheduler {
        &self.reminder
    }

    pub fn attention(&self) -> &AttentionTracker {
        &self.attention
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn timers(&self) -> &PetTimers {
        &self.timers
    }

    /// Earliest pending timer, for bounding the run loop's wait.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    pub fn activity(&self) -> &SharedActivityLog {
        &self.activity
    }
}
