// ABOUTME: Core engine foundation - data model, math helpers, and error/status types
// ABOUTME: Provides the fundamental building blocks shared by the physics modules

pub mod error;
pub mod math;
pub mod site;

pub use error::{ConfigError, MarkovError, SiteStatus};
pub use site::{
    DailyState, FusionPool, Layer, MarkovTables, Pft, PftLayerParams, PftPhysiology, PhysicsParams,
    SiteState, SoilProfile, TempGrid, WeatherState, MAX_LAYERS, PFT_COUNT,
};
