//! CloudPet Agent - the logic core of an always-on-top desktop pet.
//!
//! The pet keeps a personal todo list, nags about unfinished tasks, falls
//! asleep when ignored, reacts to the weather and shows auxiliary panels
//! (todo list, settings) when the pointer hovers its menu.
//!
//! Rendering is out of scope: everything here is a headless state machine
//! that a window toolkit renders from [`core::AppSnapshot`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PetController                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Task Store  │◀─▶│  Reminder   │──▶│  AppStore   │──▶ render
//! │  │   (JSON)    │   │  Scheduler  │   │  (state)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             ▲               │
//! │  ┌─────────────┐   ┌─────────────┐          │               │
//! │  │  Attention  │──▶│ TimerQueue  │◀─────────┤               │
//! │  │  Tracker    │   │ (deadlines) │          │               │
//! │  └─────────────┘   └─────────────┘   ┌─────────────┐       │
//! │                           ▲          │   Window    │──▶ host
//! │                           └──────────│ Coordinator │       │
//! │                                      └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use cloudpet_agent::activity::create_shared_log;
//! use cloudpet_agent::host::{HeadlessHost, PhysicalPosition, PhysicalSize, PrimaryGeometry};
//! use cloudpet_agent::pet::{Collaborators, PetController, PetOptions};
//! use cloudpet_agent::services::{OfflineConversation, UnavailableWeather, WeatherCache, WeatherService};
//! use cloudpet_agent::store::MemoryTaskStore;
//! use std::collections::BTreeMap;
//!
//! let host = HeadlessHost::new(PrimaryGeometry {
//!     position: PhysicalPosition::new(0, 0),
//!     size: PhysicalSize::new(300, 300),
//!     scale_factor: 1.0,
//! });
//! let mut pet = PetController::new(
//!     PetOptions::default(),
//!     Collaborators {
//!         tasks: Box::new(MemoryTaskStore::new()),
//!         settings: Box::new(BTreeMap::<String, String>::new()),
//!         weather: WeatherService::new(Box::new(UnavailableWeather), WeatherCache::in_memory()),
//!         conversation: Box::new(OfflineConversation),
//!         host,
//!         activity: create_shared_log(),
//!     },
//! );
//! pet.start(Utc::now());
//! pet.advance(Utc::now());
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod host;
pub mod pet;
pub mod services;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use config::{Config, ConfigError};
pub use core::{AppSnapshot, AppStore, Expression, PetEvent, StateChange, WeatherCondition};
pub use host::{HeadlessHost, PanelId, WindowHost};
pub use pet::{Collaborators, PetController, PetOptions};
pub use store::{Priority, Task, TaskId, TaskStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
