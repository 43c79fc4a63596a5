//! Subsweep engine: page executors, readiness bootstrap and effect execution.
#[cfg(feature = "browser")]
mod browser;
mod csv;
mod executor;
mod export;
mod extract;
mod link;
mod navigate;
mod orchestrator;
mod persist;
mod protocol;
mod readiness;
mod settings;
mod surface;
mod types;

#[cfg(feature = "browser")]
pub use browser::{BrowserError, BrowserSession, CdpPage, LaunchOptions};
pub use csv::{parse_records, select_targets, write_records, CsvError, CSV_HEADERS};
pub use executor::{Executor, ExecutorService};
pub use export::{export_filename, write_export, ExportError, ExportSummary};
pub use extract::{
    stabilize_scroll, ChannelScraper, ScrapeRules, ScrollReport, NO_DESCRIPTION,
    UNKNOWN_SUBSCRIBERS,
};
pub use link::{ChannelLink, ExecutorLink, ReadinessBoard, SurfaceLookup};
pub use navigate::{DetachingNavigator, Navigator};
pub use orchestrator::{JobEvent, OrchestratorDeps, OrchestratorError, OrchestratorHandle};
pub use persist::{
    ensure_dir, AtomicFileWriter, MemoryStateStore, PersistError, RonStateStore, StateStore,
    STATE_FILE,
};
pub use protocol::{ExecutorRequest, ExecutorResponse, OrchestratorRequest, OrchestratorResponse};
pub use readiness::{Bootstrap, ReadinessError};
pub use settings::{
    load_settings, parse_settings, EngineSettings, ExecutorSettings, ReadinessSettings,
    ScrollSettings, Settings, SettingsError, DEFAULT_LISTING_URL,
};
pub use surface::{
    classify_subscription_label, Control, ControlSurface, DocumentSurface, PageSurface,
    ScrollSurface, SubscriptionState,
};
pub use types::{Clock, Delivery, TransportError};
