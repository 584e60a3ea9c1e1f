// ABOUTME: Error taxonomy for the hydrothermal engine - fatal config/RNG errors plus per-site flags
// ABOUTME: Numerical and boundary-clamp issues are never raised as errors, only recorded (see SiteStatus)

use thiserror::Error;

/// Fatal, init-time configuration problems. Surfaced to the caller as `Result::Err`;
/// a site whose config fails validation is never constructed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("temperature grid max depth {max_depth} cm is shallower than profile depth {profile_depth} cm")]
    GridShallowerThanProfile { max_depth: f64, profile_depth: f64 },

    #[error("layer {layer}: {field} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange {
        layer: usize,
        field: &'static str,
        value: f64,
    },

    #[error("week {week}: degenerate covariance, sigma_max_min^2 ({cov_sq}) exceeds sigma_max^2 * sigma_min^2 ({bound})")]
    DegenerateCovariance { week: usize, cov_sq: f64, bound: f64 },

    #[error("no soil layers configured (need 1..={max})", max = crate::engine::core::site::MAX_LAYERS)]
    EmptyProfile,

    #[error("too many soil layers: {count} exceeds MAX_LAYERS ({max})", max = crate::engine::core::site::MAX_LAYERS)]
    TooManyLayers { count: usize },

    #[error("layer {layer}: swc_min ({swc_min}) > swc_sat ({swc_sat})")]
    InvertedWaterBounds {
        layer: usize,
        swc_min: f64,
        swc_sat: f64,
    },
}

/// Fatal runtime failures in the Markov generator. Aborts the site's run.
#[derive(Debug, Error, PartialEq)]
pub enum MarkovError {
    #[error("week {week}: bivariate normal covariance term vc10^2 ({vc10_sq}) exceeds sigma_min^2 ({sigma_min_sq})")]
    DegenerateCovariance { week: usize, vc10_sq: f64, sigma_min_sq: f64 },
}

/// Per-site, non-fatal flags and counters. Never a process-wide/global; owned by
/// the `SiteState` it describes so concurrent sites never interfere.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SiteStatus {
    /// Set when any finite-difference band's `alpha > 1.0` on the most recent day.
    pub temperature_alpha_exceeded: bool,
    /// Number of days for which `temperature_alpha_exceeded` was set, lifetime.
    pub temperature_alpha_exceeded_days: u32,
}

impl SiteStatus {
    pub fn record_alpha_exceeded(&mut self) {
        self.temperature_alpha_exceeded = true;
        self.temperature_alpha_exceeded_days += 1;
    }

    pub fn reset_daily_flags(&mut self) {
        self.temperature_alpha_exceeded = false;
    }
}
