pub mod config;
pub mod context;
pub mod events;
pub mod inventory;
pub mod ledger;
pub mod registry;
pub mod run;

pub use config::{ConfigError, RulesConfig};
pub use context::{DebugReport, GameContext};
pub use events::{EventBus, GameEvent, GameEventKind, PublishCounts, SubscriberId};
pub use inventory::{CleanableKind, CleanableScan, InventorySnapshot, SceneInventory};
pub use ledger::{Outcome, ScoreLedger, Thresholds};
pub use registry::{CleanableId, CleanupRegistry, ProgressState, ResolveOutcome};
pub use run::{RunController, RunPhase, RunStateSnapshot, SceneDirector, SceneLoadError};
