//! CloudPet Agent CLI
//!
//! Runs the desktop pet headless and manages its todos and settings.

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use cloudpet_agent::{
    activity::{create_shared_log_with_persistence, ActivityLog},
    config::Config,
    core::{PetEvent, StateChange},
    host::{cursor_available, HeadlessHost, PanelId, PhysicalPosition, PhysicalSize, PrimaryGeometry},
    pet::{Collaborators, PetController, PetOptions},
    services::{
        ConversationSource, OfflineConversation, UnavailableWeather, WeatherCache, WeatherService,
        WeatherSource,
    },
    store::{
        resolve_id,
        settings::{keys, parse_interval, REMINDER_INTERVAL_UI_RANGE},
        JsonSettingsStore, JsonTaskStore, Priority, Settings, SettingsStore, Task, TaskStore,
    },
    VERSION,
};
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "network")]
use cloudpet_agent::services::{BlockingChatClient, BlockingOpenWeatherClient, ChatEndpoint};

#[cfg(feature = "server")]
use cloudpet_agent::{
    core::AppSnapshot,
    server::{self, ServerConfig},
};

/// Longest the run loop sleeps before re-checking timers and Ctrl+C.
const MAX_LOOP_WAIT: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "cloudpet")]
#[command(author = "CloudPet")]
#[command(version = VERSION)]
#[command(about = "Desktop pet that keeps your todos honest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pet (reads chat and JSON events from stdin)
    Run {
        /// Start the local HTTP event bridge (requires server feature)
        #[arg(long)]
        serve: bool,

        /// Event bridge port (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage todos
    Todo {
        #[command(subcommand)]
        action: TodoCommand,
    },

    /// Browse archived todos
    Archive {
        #[command(subcommand)]
        action: ArchiveCommand,
    },

    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Show the current weather condition
    Weather,

    /// Show todo counts, next archive cutoff and activity totals
    Status,

    /// Show configuration
    Config,
}

#[derive(Subcommand)]
enum TodoCommand {
    /// Add a todo
    Add {
        /// Title words
        #[arg(required = true)]
        title: Vec<String>,

        #[arg(long, short, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// List active todos
    List,
    /// Mark a todo done (id or unique id prefix)
    Done { id: String },
    /// Mark a todo open again
    Undo { id: String },
    /// Rename a todo
    Edit {
        id: String,
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// Delete a todo
    Rm { id: String },
}

#[derive(Subcommand)]
enum ArchiveCommand {
    /// List dates that have archived todos
    Dates,
    /// Show the todos archived for a YYYY-MM-DD date
    Show { date: String },
    /// Archive everything created before the last cutoff now
    Purge,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print settings (API keys masked)
    Show,
    /// Set one setting
    Set { key: String, value: String },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { serve, port } => {
            cmd_run(serve, port);
        }
        Commands::Todo { action } => {
            cmd_todo(action);
        }
        Commands::Archive { action } => {
            cmd_archive(action);
        }
        Commands::Settings { action } => {
            cmd_settings(action);
        }
        Commands::Weather => {
            cmd_weather();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

/// Log to stderr so stdout stays readable; `RUST_LOG` overrides the level.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        Config::default()
    });
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    config
}

fn open_tasks(config: &Config) -> JsonTaskStore {
    JsonTaskStore::open(config.todos_path()).unwrap_or_else(|e| {
        eprintln!("Error: Could not open todos at {:?}: {e}", config.todos_path());
        std::process::exit(1);
    })
}

fn open_settings(config: &Config) -> JsonSettingsStore {
    JsonSettingsStore::open(config.settings_path()).unwrap_or_else(|e| {
        eprintln!(
            "Error: Could not open settings at {:?}: {e}",
            config.settings_path()
        );
        std::process::exit(1);
    })
}

#[cfg_attr(not(feature = "network"), allow(unused_variables))]
fn weather_source(config: &Config) -> Box<dyn WeatherSource + Send> {
    #[cfg(feature = "network")]
    match BlockingOpenWeatherClient::new(config.request_timeout) {
        Ok(client) => return Box::new(client),
        Err(e) => eprintln!("Warning: Weather client unavailable: {e}"),
    }
    Box::new(UnavailableWeather)
}

#[cfg_attr(not(feature = "network"), allow(unused_variables))]
fn conversation_source(config: &Config) -> Box<dyn ConversationSource> {
    #[cfg(feature = "network")]
    {
        let endpoint = ChatEndpoint {
            base_url: config.chat_base_url.clone(),
            model: config.chat_model.clone(),
        };
        match BlockingChatClient::new(endpoint, config.request_timeout) {
            Ok(client) => return Box::new(client),
            Err(e) => eprintln!("Warning: Chat client unavailable: {e}"),
        }
    }
    Box::new(OfflineConversation)
}

fn weather_service(config: &Config) -> WeatherService {
    WeatherService::new(
        weather_source(config),
        WeatherCache::load(config.weather_cache_path()),
    )
}

fn resolve_or_exit(store: &dyn TaskStore, needle: &str) -> Task {
    let tasks = store.list().unwrap_or_else(|e| {
        eprintln!("Error: Could not read todos: {e}");
        std::process::exit(1);
    });
    let Some(id) = resolve_id(&tasks, needle) else {
        eprintln!("Error: No single todo matches '{needle}'");
        std::process::exit(1);
    };
    match tasks.into_iter().find(|t| t.id == id) {
        Some(task) => task,
        None => std::process::exit(1),
    }
}

fn print_task(task: &Task) {
    println!(
        "  {} [{}] {:<6} {}",
        task.id.short(),
        if task.is_completed { "x" } else { " " },
        task.priority.as_str(),
        task.title
    );
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn cmd_run(serve: bool, port: Option<u16>) {
    println!("CloudPet Agent v{VERSION}");
    println!();

    let config = load_config();
    let tasks = open_tasks(&config);
    let settings = open_settings(&config);

    // Rendering happens elsewhere; the host only tracks geometry.
    let mut host = HeadlessHost::new(PrimaryGeometry {
        position: PhysicalPosition::new(0, 0),
        size: PhysicalSize::new(300, 300),
        scale_factor: 1.0,
    });
    host.add_panel(PanelId::todo(), PhysicalSize::new(306, 480));
    host.add_panel(PanelId::settings(), PhysicalSize::new(320, 420));

    let activity = create_shared_log_with_persistence(config.activity_path());
    let mut pet = PetController::new(
        PetOptions::from_config(&config),
        Collaborators {
            tasks: Box::new(tasks),
            settings: Box::new(settings),
            weather: weather_service(&config),
            conversation: conversation_source(&config),
            host,
            activity: activity.clone(),
        },
    );
    let changes = pet.subscribe();
    pet.start(Utc::now());

    println!("  Todos: {}", pet.app().todos().len());
    println!("  Weather: {}", pet.app().weather());
    println!(
        "  Reminder interval: {} min",
        pet.settings().reminder_interval_min
    );
    if !cursor_available() {
        println!("  Cursor polling: unavailable, panels close on leave events only");
    }

    // The loop keeps both senders alive so neither channel disconnects.
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<PetEvent>();
    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    spawn_stdin_reader(line_tx.clone());

    #[cfg(feature = "server")]
    let bridge = if serve {
        match Bridge::start(
            port.unwrap_or(config.server_port),
            event_tx.clone(),
            pet.snapshot().clone(),
        ) {
            Ok(bridge) => {
                println!("  Event bridge: http://{}", bridge.addr);
                Some(bridge)
            }
            Err(e) => {
                eprintln!("Warning: Could not start event bridge: {e}");
                None
            }
        }
    } else {
        None
    };

    #[cfg(not(feature = "server"))]
    if serve || port.is_some() {
        eprintln!("Warning: --serve needs the server feature, ignoring");
    }

    println!();
    println!("Type to chat with the pet, /help for commands, Ctrl+C to stop.");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    while running.load(Ordering::SeqCst) {
        pet.advance(Utc::now());

        if print_changes(&changes) {
            #[cfg(feature = "server")]
            if let Some(ref bridge) = bridge {
                bridge.snapshot.send_replace(pet.snapshot().clone());
            }
        }

        let wait = pet
            .next_deadline()
            .and_then(|deadline| (deadline - Utc::now()).to_std().ok())
            .map_or(MAX_LOOP_WAIT, |until| until.min(MAX_LOOP_WAIT));

        crossbeam_channel::select! {
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    pet.handle_event(event, Utc::now());
                }
            }
            recv(line_rx) -> line => {
                if let Ok(line) = line {
                    if !handle_line(&mut pet, &line) {
                        running.store(false, Ordering::SeqCst);
                    }
                }
            }
            default(wait) => {}
        }
    }

    println!();
    println!("Stopping...");

    pet.shutdown();
    drop(line_tx);
    drop(event_tx);

    #[cfg(feature = "server")]
    if let Some(bridge) = bridge {
        bridge.stop();
    }

    println!();
    println!("{}", activity.summary());
}

/// Forward stdin lines to the run loop. Ends quietly at EOF.
fn spawn_stdin_reader(lines: Sender<String>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if lines.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
}

/// Print speech and expression changes. Returns whether anything changed.
fn print_changes(changes: &Receiver<StateChange>) -> bool {
    let mut changed = false;
    for change in changes.try_iter() {
        changed = true;
        let now = local_time(Utc::now());
        match change {
            StateChange::Speech(bubble) if bubble.visible => {
                println!("[{now}] 💬 {}", bubble.text);
            }
            StateChange::Expression(expression) => {
                println!("[{now}] ({expression})");
            }
            StateChange::Weather(condition) => {
                println!("[{now}] weather: {condition}");
            }
            StateChange::HoverMenu(visible) => {
                tracing::debug!("Hover menu visible: {}", visible);
            }
            _ => {}
        }
    }
    changed
}

/// Handle one stdin line. Returns false when the user asked to quit.
fn handle_line(pet: &mut PetController<HeadlessHost>, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    if line.starts_with('{') {
        match serde_json::from_str::<PetEvent>(line) {
            Ok(event) => pet.handle_event(event, Utc::now()),
            Err(e) => eprintln!("Invalid event: {e}"),
        }
        return true;
    }

    let Some(command) = line.strip_prefix('/') else {
        pet.send_message(line, Utc::now());
        return true;
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));
    let now = Utc::now();

    match name {
        "quit" | "exit" => return false,
        "help" => print_run_help(),
        "todos" => {
            for task in pet.app().todos() {
                print_task(task);
            }
        }
        "add" => {
            let (priority, title) = match rest.split_once(char::is_whitespace) {
                Some((first, title)) => match first.parse::<Priority>() {
                    Ok(priority) => (priority, title),
                    Err(_) => (Priority::Medium, rest),
                },
                None => (Priority::Medium, rest),
            };
            match pet.add_todo(title, priority, now) {
                Ok(task) => print_task(&task),
                Err(e) => eprintln!("Could not add todo: {e}"),
            }
        }
        "done" => match pet.resolve_todo(rest) {
            Some(id) => {
                pet.toggle_todo(&id, now);
            }
            None => eprintln!("No single todo matches '{rest}'"),
        },
        "edit" => {
            let (needle, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let edited = pet
                .resolve_todo(needle)
                .is_some_and(|id| pet.edit_todo(&id, title));
            if !edited {
                eprintln!("Usage: /edit <id> <new title>");
            }
        }
        "rm" => match pet.resolve_todo(rest) {
            Some(id) => {
                pet.delete_todo(&id);
            }
            None => eprintln!("No single todo matches '{rest}'"),
        },
        other => eprintln!("Unknown command /{other}, try /help"),
    }
    true
}

fn print_run_help() {
    println!("  <text>                       chat with the pet");
    println!("  /todos                       list todos");
    println!("  /add [high|medium|low] <t>   add a todo");
    println!("  /done <id>                   toggle a todo");
    println!("  /edit <id> <title>           rename a todo");
    println!("  /rm <id>                     delete a todo");
    println!("  {{\"type\":\"settings-changed\"}}  any JSON event");
    println!("  /quit                        stop the pet");
}

/// HTTP event bridge running on its own runtime.
#[cfg(feature = "server")]
struct Bridge {
    runtime: tokio::runtime::Runtime,
    snapshot: tokio::sync::watch::Sender<AppSnapshot>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    addr: std::net::SocketAddr,
}

#[cfg(feature = "server")]
impl Bridge {
    fn start(port: u16, events: Sender<PetEvent>, initial: AppSnapshot) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        let (snapshot, snapshot_rx) = tokio::sync::watch::channel(initial);
        let (addr, shutdown) =
            runtime.block_on(server::run(ServerConfig::new(port), events, snapshot_rx))?;
        Ok(Self {
            runtime,
            snapshot,
            shutdown,
            addr,
        })
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
        self.runtime.shutdown_timeout(Duration::from_secs(1));
    }
}

fn cmd_todo(action: TodoCommand) {
    let config = load_config();
    let mut store = open_tasks(&config);
    let now = Utc::now();

    let result = match action {
        TodoCommand::Add { title, priority } => {
            store.create(&title.join(" "), priority, now).map(|task| {
                println!("Added:");
                print_task(&task);
            })
        }
        TodoCommand::List => store.list().map(|tasks| {
            if tasks.is_empty() {
                println!("No todos. Enjoy the quiet.");
            }
            for task in &tasks {
                print_task(task);
            }
        }),
        TodoCommand::Done { id } => {
            let task = resolve_or_exit(&store, &id);
            store
                .set_completed(&task.id, true, now)
                .map(|()| println!("Done: {}", task.title))
        }
        TodoCommand::Undo { id } => {
            let task = resolve_or_exit(&store, &id);
            store
                .set_completed(&task.id, false, now)
                .map(|()| println!("Reopened: {}", task.title))
        }
        TodoCommand::Edit { id, title } => {
            let task = resolve_or_exit(&store, &id);
            let title = title.join(" ");
            store
                .set_title(&task.id, &title)
                .map(|()| println!("Renamed: {} -> {}", task.title, title.trim()))
        }
        TodoCommand::Rm { id } => {
            let task = resolve_or_exit(&store, &id);
            store
                .delete(&task.id)
                .map(|()| println!("Deleted: {}", task.title))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_archive(action: ArchiveCommand) {
    let config = load_config();
    let mut store = open_tasks(&config);

    let result = match action {
        ArchiveCommand::Dates => store.archived_date_keys().map(|dates| {
            if dates.is_empty() {
                println!("Nothing archived yet.");
            }
            for date in dates {
                let count = store.list_archived(&date).map_or(0, |tasks| tasks.len());
                println!("  {date}  {count} todos");
            }
        }),
        ArchiveCommand::Show { date } => store.list_archived(&date).map(|tasks| {
            if tasks.is_empty() {
                println!("No todos archived for {date}.");
            }
            for task in &tasks {
                print_task(task);
            }
        }),
        ArchiveCommand::Purge => store
            .archive_and_purge(&config.cutoff(), Utc::now())
            .map(|count| println!("Archived {count} todos.")),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(value) if value.chars().count() > 4 => {
            format!("{}…", value.chars().take(4).collect::<String>())
        }
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}

fn cmd_settings(action: SettingsCommand) {
    let config = load_config();
    let mut store = open_settings(&config);

    match action {
        SettingsCommand::Show => {
            let settings = Settings::load(&store);
            println!("Settings ({:?})", store.path());
            println!("========");
            println!(
                "  {}: {}",
                keys::CHAT_API_KEY,
                mask(settings.chat_api_key.as_deref())
            );
            println!(
                "  {}: {}",
                keys::WEATHER_API_KEY,
                mask(settings.weather_api_key.as_deref())
            );
            println!("  {}: {}", keys::WEATHER_CITY, settings.weather_city);
            println!(
                "  {}: {}",
                keys::REMINDER_INTERVAL_MIN,
                settings.reminder_interval_min
            );
        }
        SettingsCommand::Set { key, value } => {
            if !keys::ALL.contains(&key.as_str()) {
                eprintln!("Error: Unknown setting '{key}'");
                eprintln!("Known settings: {}", keys::ALL.join(", "));
                std::process::exit(1);
            }
            if key == keys::REMINDER_INTERVAL_MIN {
                let valid = parse_interval(&value)
                    .is_some_and(|minutes| REMINDER_INTERVAL_UI_RANGE.contains(&minutes));
                if !valid {
                    eprintln!(
                        "Error: Reminder interval must be {} to {} minutes",
                        REMINDER_INTERVAL_UI_RANGE.start(),
                        REMINDER_INTERVAL_UI_RANGE.end()
                    );
                    std::process::exit(1);
                }
            }
            if let Err(e) = store.set(&key, value.trim()) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
            println!("Saved {key}.");
            println!("A running pet applies it after a settings-changed event.");
        }
    }
}

fn cmd_weather() {
    let config = load_config();
    let store = open_settings(&config);
    let settings = Settings::load(&store);
    let mut weather = weather_service(&config);

    let condition = weather.current(&settings, Utc::now());
    println!("Weather in {}: {condition}", settings.weather_city);
    if let Some(cached) = weather.cache().get() {
        if !cached.description.is_empty() {
            println!("  {}", cached.description);
        }
        println!("  Updated: {}", cached.updated_at.with_timezone(&Local));
    }
    if settings.weather_api_key.is_none() {
        println!("  (no weather API key set, showing the default)");
    }
}

fn cmd_status() {
    let config = load_config();
    let store = open_tasks(&config);
    let now = Utc::now();

    println!("CloudPet Agent Status");
    println!("=====================");
    println!();

    match store.list() {
        Ok(tasks) => {
            let open = tasks.iter().filter(|t| t.is_pending()).count();
            println!("Todos: {} open, {} done", open, tasks.len() - open);
        }
        Err(e) => println!("Todos: unreadable ({e})"),
    }
    match store.archived_date_keys() {
        Ok(dates) => println!("Archived days: {}", dates.len()),
        Err(e) => println!("Archived days: unreadable ({e})"),
    }

    let cutoff = config.cutoff();
    println!(
        "Next archive cutoff: {} ({})",
        cutoff.next_after(now).with_timezone(&cutoff.timezone()),
        cutoff.timezone()
    );

    let stats = ActivityLog::with_persistence(config.activity_path()).stats();
    println!();
    println!("Activity (all sessions):");
    println!("  Reminders: {}", stats.reminders_emitted);
    println!("  Panels shown: {}", stats.panels_shown);
    println!("  Messages: {}", stats.messages_processed);
    println!("  Todos created: {}", stats.todos_created);
    println!("  Todos archived: {}", stats.tasks_archived);
    println!("  Weather refreshes: {}", stats.weather_refreshes);
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not install Ctrl+C handler: {e}");
    }
}
