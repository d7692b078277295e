use std::cell::RefCell;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use engine::{
    CleanableKind, CleanableScan, ConfigError, GameContext, GameEvent, GameEventKind,
    InventorySnapshot, RulesConfig, SceneDirector, SceneInventory, SceneLoadError,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV_VAR: &str = "TIDYROOM_CONFIG";
const TICK_SECONDS: f32 = 0.1;
const TIMEOUT_SCENARIO_TIME_LIMIT: f32 = 2.0;

/// Scripted playthroughs exercising each ending path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    /// Keep the good memory, discard the bad ones, clean everything.
    Win,
    /// Keep every memory: accumulation blows past its maximum.
    Hoard,
    /// Discard the good memory and hoard a bad one: balance stays low.
    Discard,
    /// Let the countdown run out with items remaining.
    Timeout,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "win" => Some(Self::Win),
            "hoard" => Some(Self::Hoard),
            "discard" => Some(Self::Discard),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }

    fn as_token(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Hoard => "hoard",
            Self::Discard => "discard",
            Self::Timeout => "timeout",
        }
    }
}

/// Shared demo-room state: the harness plays both the world (flipping
/// cleaned flags) and the cleanup sources (sending notifications).
struct DemoInventory {
    snapshot: Rc<RefCell<InventorySnapshot>>,
}

impl SceneInventory for DemoInventory {
    fn scan(&self) -> InventorySnapshot {
        self.snapshot.borrow().clone()
    }
}

/// Stands in for the host scene loader: accepts the two ending scenes it
/// was built with and rejects everything else.
struct LoggingDirector {
    known_scenes: Vec<String>,
}

impl SceneDirector for LoggingDirector {
    fn load_scene(&mut self, scene_name: &str) -> Result<(), SceneLoadError> {
        if self.known_scenes.iter().any(|known| known == scene_name) {
            info!(scene = scene_name, "scene transition");
            Ok(())
        } else {
            Err(SceneLoadError::UnknownScene(scene_name.to_string()))
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    info!("=== Tidy Room Demo ===");

    let scenario = match parse_scenario_from_args() {
        Ok(scenario) => scenario,
        Err(raw) => {
            error!(
                argument = raw.as_str(),
                "unknown scenario, expected one of: win, hoard, discard, timeout"
            );
            return ExitCode::FAILURE;
        }
    };
    let mut config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "config_load_failed");
            return ExitCode::FAILURE;
        }
    };
    if scenario == Scenario::Timeout {
        config.time_limit_seconds = TIMEOUT_SCENARIO_TIME_LIMIT;
    }

    run_scenario(scenario, config);
    ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_scenario_from_args() -> Result<Scenario, String> {
    match env::args().nth(1) {
        None => Ok(Scenario::Win),
        Some(raw) => Scenario::parse(&raw).ok_or(raw),
    }
}

fn load_config() -> Result<RulesConfig, ConfigError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(raw_path) => {
            let path = PathBuf::from(raw_path);
            info!(path = %path.display(), "loading config");
            RulesConfig::load_from_file(&path)
        }
        Err(_) => Ok(RulesConfig::default()),
    }
}

fn demo_room() -> InventorySnapshot {
    let cleanable = |name: &str, position: [f32; 3], kind| CleanableScan {
        name: name.to_string(),
        position,
        kind,
        cleaned: false,
    };
    InventorySnapshot {
        cleanables: vec![
            cleanable("DirtSpot", [0.0, 0.0, 0.0], CleanableKind::Dirt),
            cleanable("DirtSpot", [3.0, 0.0, 1.0], CleanableKind::Dirt),
            cleanable("DirtSpot", [1.0, 0.0, 4.0], CleanableKind::Dirt),
            cleanable("Soda Can", [2.0, 0.0, 2.0], CleanableKind::Trash),
            cleanable("Pizza Box", [4.0, 1.0, 0.0], CleanableKind::Trash),
            cleanable("Old Sock", [5.0, 0.0, 3.0], CleanableKind::Trash),
        ],
        // One treasured photo, two painful reminders.
        memory_values: vec![10, -60, -40],
    }
}

fn subscribe_ui_loggers(context: &mut GameContext) {
    let bus = context.bus_mut();
    bus.subscribe(GameEventKind::ProgressChanged, |event| {
        if let GameEvent::ProgressChanged { cleaned, total } = event {
            info!(cleaned, total, "progress");
        }
    });
    bus.subscribe(GameEventKind::TimeUpdated, |event| {
        if let GameEvent::TimeUpdated { remaining_seconds } = event {
            debug!(remaining_seconds, "time");
        }
    });
    bus.subscribe(GameEventKind::ScoresChanged, |event| {
        if let GameEvent::ScoresChanged {
            balance,
            accumulation,
        } = event
        {
            info!(balance, accumulation, "scores");
        }
    });
    bus.subscribe(GameEventKind::MissingItems, |event| {
        if let GameEvent::MissingItems { labels } = event {
            info!(remaining = labels.join(", "), "missing items");
        }
    });
    bus.subscribe(GameEventKind::RunConcluded, |event| {
        if let GameEvent::RunConcluded { won } = event {
            info!(won, "run concluded");
        }
    });
}

/// Flips the cleaned flag in the shared world state, then notifies the
/// engine the way a finished destruction sequence would.
fn resolve_item(context: &mut GameContext, snapshot: &Rc<RefCell<InventorySnapshot>>, name: &str) {
    let mut flipped = false;
    for scan in &mut snapshot.borrow_mut().cleanables {
        if !scan.cleaned && scan.display_label().starts_with(name) {
            scan.cleaned = true;
            flipped = true;
            break;
        }
    }
    if !flipped {
        warn!(name, "demo world has no such item left");
    }
    context.notify_resolved(name);
    context.tick(TICK_SECONDS);
}

fn decide_memory(context: &mut GameContext, kept: bool, value: i32) {
    context.set_decision_active(true);
    context.tick(TICK_SECONDS);
    context.apply_decision(kept, value);
    context.set_decision_active(false);
    context.tick(TICK_SECONDS);
}

fn run_scenario(scenario: Scenario, config: RulesConfig) {
    info!(scenario = scenario.as_token(), "scenario starting");
    let snapshot = Rc::new(RefCell::new(demo_room()));
    let director = LoggingDirector {
        known_scenes: vec![
            config.good_ending_scene.clone(),
            config.bad_ending_scene.clone(),
        ],
    };
    let end_screen_seconds = config.end_screen_seconds;
    let mut context = GameContext::new(
        config,
        Box::new(DemoInventory {
            snapshot: Rc::clone(&snapshot),
        }),
        Box::new(director),
    );
    subscribe_ui_loggers(&mut context);
    context.start();

    match scenario {
        Scenario::Win => {
            decide_memory(&mut context, true, 10);
            decide_memory(&mut context, false, -60);
            decide_memory(&mut context, false, -40);
            for name in [
                "DirtSpot", "DirtSpot", "DirtSpot", "Soda Can", "Pizza Box", "Old Sock",
            ] {
                resolve_item(&mut context, &snapshot, name);
            }
        }
        Scenario::Hoard => {
            decide_memory(&mut context, true, 10);
            decide_memory(&mut context, true, -60);
            decide_memory(&mut context, true, -40);
            for name in [
                "DirtSpot", "DirtSpot", "DirtSpot", "Soda Can", "Pizza Box", "Old Sock",
            ] {
                resolve_item(&mut context, &snapshot, name);
            }
        }
        Scenario::Discard => {
            decide_memory(&mut context, false, 10);
            decide_memory(&mut context, true, -40);
            for name in [
                "DirtSpot", "DirtSpot", "DirtSpot", "Soda Can", "Pizza Box", "Old Sock",
            ] {
                resolve_item(&mut context, &snapshot, name);
            }
        }
        Scenario::Timeout => {
            resolve_item(&mut context, &snapshot, "DirtSpot");
            resolve_item(&mut context, &snapshot, "Soda Can");
            // The drift check is a no-op here: the demo world and the
            // registry agree.
            context.validate_consistency();
        }
    }

    // Run the countdown (for the timeout path) and the end-screen delay
    // through to the scene request.
    let mut budget_seconds = TIMEOUT_SCENARIO_TIME_LIMIT + end_screen_seconds + 1.0;
    while budget_seconds > 0.0 {
        context.tick(TICK_SECONDS);
        budget_seconds -= TICK_SECONDS;
    }

    let report = context.debug_report();
    info!(
        cleaned = report.progress.cleaned(),
        total = report.progress.total(),
        balance = report.balance,
        accumulation = report.accumulation,
        has_ended = report.run.has_ended,
        "final state"
    );
    if let Some(thresholds) = report.thresholds {
        info!(
            min_balance = thresholds.min_balance_for_good_ending,
            max_accumulation = thresholds.max_accumulation_for_good_ending,
            "thresholds"
        );
    }
    let counts = context.bus_mut().publish_counts();
    debug!(
        total = counts.total,
        progress = counts.progress_changed,
        time = counts.time_updated,
        scores = counts.scores_changed,
        "events published"
    );
}
