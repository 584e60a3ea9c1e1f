// ABOUTME: Library interface for the pedoflux point-scale soil-water and soil-temperature engine
// ABOUTME: Exposes a clean public API for external use while keeping internal organization

pub mod engine;

pub use engine::{
    frozen_flags, generate_weather, run_day, run_day_observed, BiomassToday, ConfigError, DailyFluxes, MarkovError,
    MarkovGenerator, NullObserver, Observer, PftDailyInputs, RecordingObserver, SiteConfig, SiteState, SiteStatus,
    WeatherToday,
};
