pub mod color;
pub mod config;
pub mod dark_patterns;
pub mod differential;
pub mod discovery;
pub mod executor;
pub mod footprint;
pub mod orchestrator;
pub mod picker;
pub mod planner;
pub mod quiescence;
pub mod second_level;
pub mod session;
pub mod tracker;

pub use config::{ConfigError, ScanConfig};
pub use discovery::Discovery;
pub use executor::{ClickOutcome, Executor};
pub use footprint::{Footprint, footprint_of};
pub use orchestrator::{Collaborators, Orchestrator};
pub use picker::{FixedNoticePicker, HeuristicNoticePicker};
pub use planner::InteractionPlan;
pub use quiescence::Quiescence;
pub use second_level::{ProbeOutcome, ProbeReport, SecondLevelProbe};
pub use session::SessionContext;
pub use tracker::CookieTracker;
