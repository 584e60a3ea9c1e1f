// ABOUTME: Per-site data model - soil profile, daily state, weather, temperature grid, Markov tables
// ABOUTME: Every field that crosses a day boundary (or a call boundary) lives here, never in a static

/// Upper bound on the number of hydrological soil layers a profile may carry.
pub const MAX_LAYERS: usize = 25;

/// Plant functional types the engine distributes evaporative demand and roots across.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pft {
    Grass,
    Shrub,
    Tree,
    Forb,
}

pub const PFT_COUNT: usize = 4;

impl Pft {
    pub fn all() -> [Pft; PFT_COUNT] {
        [Pft::Grass, Pft::Shrub, Pft::Tree, Pft::Forb]
    }

    pub fn index(self) -> usize {
        match self {
            Pft::Grass => 0,
            Pft::Shrub => 1,
            Pft::Tree => 2,
            Pft::Forb => 3,
        }
    }
}

/// Per-PFT coefficients fixed at init: leaf-area shading parameter, root distribution,
/// transpiration-withdrawal weighting, and the critical SWP beyond which that PFT treats
/// water as unavailable (used for the plant-available-water metric, not the core flux math).
#[derive(Clone, Debug, PartialEq)]
pub struct PftLayerParams {
    pub transp_coeff: f64,
    pub root_fraction: f64,
    pub swp_crit_bar: f64,
}

impl Default for PftLayerParams {
    fn default() -> Self {
        Self {
            transp_coeff: 0.0,
            root_fraction: 0.0,
            swp_crit_bar: -30.0,
        }
    }
}

/// Per-PFT physiological parameters that don't vary by layer: light extinction for
/// Es/T partitioning, the shade-factor curve for transpiration, and the four interception
/// shape coefficients for that PFT's canopy pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PftPhysiology {
    pub lai_param: f64,
    pub es_param_limit: f64,
    pub shade_scale: f64,
    pub shade_deadmax: f64,
    pub shade_xinflex: f64,
    pub shade_yinflex: f64,
    pub shade_range: f64,
    pub shade_slope: f64,
    pub intercept_a: f64,
    pub intercept_b: f64,
    pub intercept_c: f64,
    pub intercept_d: f64,
}

/// Site-wide physics tuning constants that are neither per-layer nor per-PFT: the
/// watrate sigmoid shape, unsaturated-percolation drainage parameters, hydraulic
/// redistribution conductance, thermal conductivity/heat-capacity coefficients, and the
/// T1 surface-temperature rule's breakpoints. Grouped here because they're fixed at
/// config time and shared across every day's pipeline invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsParams {
    pub watrate_shift: f64,
    pub watrate_shape: f64,
    pub watrate_inflec: f64,
    pub watrate_range: f64,
    pub sdrainpar: f64,
    pub sdraindpth: f64,
    pub hydred_max_cond_root: f64,
    pub hydred_swp50: f64,
    pub hydred_shape_cond: f64,
    pub cs_param1: f64,
    pub cs_param2: f64,
    pub sh_param: f64,
    pub t1_param1: f64,
    pub t1_param2: f64,
    pub t1_param3: f64,
    pub bm_limiter: f64,
    pub litter_intercept_a: f64,
    pub litter_intercept_b: f64,
    pub litter_intercept_c: f64,
    pub litter_intercept_d: f64,
}

/// One hydrological soil layer. Depth-ordered; index 0 is the surface layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub width_cm: f64,
    pub bulk_density_g_cm3: f64,
    pub gravel_fraction: f64,
    pub swc_fc: f64,
    pub swc_wp: f64,
    pub swc_min: f64,
    pub swc_sat: f64,
    /// Matric potential (bar, negative) at field capacity and wilting point; used to fit
    /// the Campbell (1974) power-law retention curve this engine uses for SWC -> SWP.
    pub swp_fc_bar: f64,
    pub swp_wp_bar: f64,
    pub impermeability: f64,
    pub evap_coeff: f64,
    pub transp_region: usize,
    pub pft: [PftLayerParams; PFT_COUNT],
}

impl Layer {
    /// Campbell (1974) power-law retention: SWP = swp_fc * (swc_fc / swc)^b, with the
    /// exponent b fit from the (fc, wp) pair supplied in configuration. The original
    /// pedotransfer function (`SWCbulk2SWPmatric`, SW_Site.c) is not part of the retrieved
    /// source; this closed-form substitute is documented in DESIGN.md.
    pub fn swp_bar(&self, swc: f64) -> f64 {
        let swc = swc.max(1e-6);
        let b = (self.swp_wp_bar / self.swp_fc_bar).ln() / (self.swc_fc / self.swc_wp).ln();
        self.swp_fc_bar * (self.swc_fc / swc).powf(b)
    }

    pub fn pft_params(&self, pft: Pft) -> &PftLayerParams {
        &self.pft[pft.index()]
    }
}

/// Ordered stack of soil layers plus the count of distinct transpiration regions they
/// are grouped into (a contiguous band over which a weighted SWP governs transpiration
/// stress; shared across PFTs, matching `transp_rgn` in the original source).
#[derive(Clone, Debug, PartialEq)]
pub struct SoilProfile {
    pub layers: Vec<Layer>,
    pub n_transp_regions: usize,
}

impl SoilProfile {
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn total_depth_cm(&self) -> f64 {
        self.layers.iter().map(|l| l.width_cm).sum()
    }

    pub fn layers_in_region(&self, region: usize) -> impl Iterator<Item = (usize, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .filter(move |(_, l)| l.transp_region == region)
    }
}

/// Daily hydrological + thermal state, mutated in place by the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyState {
    pub swc: Vec<f64>,
    pub frozen: Vec<bool>,
    /// Previous day's per-layer soil temperature (deg C); the only temperature state
    /// that crosses a day boundary on the hydrological grid.
    pub t_soil: Vec<f64>,
    pub standing_water_cm: f64,
    pub swe_cm: f64,
    pub snow_depth_cm: f64,
    pub t_surface_yesterday: f64,
    pub t_surface_today: f64,
    pub aet_cm: f64,
    pub pet_cm: f64,
}

impl DailyState {
    pub fn new(n_layers: usize, initial_t_soil: f64) -> Self {
        Self {
            swc: vec![0.0; n_layers],
            frozen: vec![false; n_layers],
            t_soil: vec![initial_t_soil; n_layers],
            standing_water_cm: 0.0,
            swe_cm: 0.0,
            snow_depth_cm: 0.0,
            t_surface_yesterday: initial_t_soil,
            t_surface_today: initial_t_soil,
            aet_cm: 0.0,
            pet_cm: 0.0,
        }
    }
}

/// Today's (and, where needed, yesterday's) weather drivers plus the fixed site
/// description PET depends on.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherState {
    pub tmax_today: f64,
    pub tmin_today: f64,
    pub tmax_yesterday: f64,
    pub tmin_yesterday: f64,
    pub rain_cm: f64,
    pub snow_cm: f64,
    /// Monthly climate normals, indexed 0..12 (January = 0).
    pub cloud_cover_pct: [f64; 12],
    pub humidity_pct: [f64; 12],
    pub wind_speed_m_s: [f64; 12],
    pub transmission_coeff: [f64; 12],
    pub latitude_rad: f64,
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub aspect_deg: f64,
    pub albedo: f64,
}

impl WeatherState {
    pub fn tavg_today(&self) -> f64 {
        (self.tmax_today + self.tmin_today) / 2.0
    }
}

/// Mapping matrix entry: overlap width [cm] between a uniform temperature-grid band and
/// a hydrological soil layer. A negative value in the final column encodes "extrapolate
/// from the deepest soil layer" (see `SoilTemperatureEngine` grid construction).
pub type OverlapMatrix = Vec<Vec<f64>>;

/// The uniform-depth regression grid the finite-difference heat solver runs on, plus the
/// state that must survive across days and across calls (the "first call" init latch
/// lives here, as a field, never as a module-static - see DESIGN.md).
#[derive(Clone, Debug, PartialEq)]
pub struct TempGrid {
    pub delta_x_cm: f64,
    pub max_depth_cm: f64,
    pub n_rgr: usize,
    /// Overlap matrix, (n_rgr + 2) rows by (n_layers + 1) columns.
    pub overlap: OverlapMatrix,
    /// Grid temperatures including the two boundary slots (index 0 = surface, last = constant).
    pub t_grid: Vec<f64>,
    pub fc_r: Vec<f64>,
    pub wp_r: Vec<f64>,
    pub bulk_density_r: Vec<f64>,
    pub initialized: bool,
}

impl TempGrid {
    pub fn new(delta_x_cm: f64, max_depth_cm: f64) -> Self {
        let n_rgr = (max_depth_cm / delta_x_cm).round() as usize;
        Self {
            delta_x_cm,
            max_depth_cm,
            n_rgr,
            overlap: Vec::new(),
            t_grid: vec![0.0; n_rgr + 2],
            fc_r: vec![0.0; n_rgr],
            wp_r: vec![0.0; n_rgr],
            bulk_density_r: vec![0.0; n_rgr],
            initialized: false,
        }
    }
}

/// Fusion-pool bookkeeping for the (currently inactive) freeze/thaw energy correction.
/// Kept as a field-complete struct so enabling the correction later is additive.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FusionPool {
    pub old_s_fusion_pool_actual: Vec<f64>,
    pub initialized: bool,
}

impl FusionPool {
    pub fn new(n_layers: usize) -> Self {
        Self {
            old_s_fusion_pool_actual: vec![0.0; n_layers],
            initialized: false,
        }
    }

    /// Freeze/thaw latent-heat correction to `t_soil`, applied after the heat-equation
    /// step projects grid temperatures back to the soil layers. Documented no-op: always
    /// returns `false` and never mutates `t_soil` or `old_s_fusion_pool_actual` - see
    /// DESIGN.md. Enabling the correction later only needs a body here.
    pub fn adjust(&mut self, _t_soil: &mut [f64], _frozen: &[bool]) -> bool {
        false
    }
}

/// Per-day-of-year and per-week-of-year parameters for the first-order wet/dry chain
/// and the bivariate-normal max/min temperature model.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkovTables {
    pub p_wet_given_wet: [f64; 366],
    pub p_wet_given_dry: [f64; 366],
    pub mu_ppt: [f64; 366],
    pub sigma_ppt: [f64; 366],
    pub mu_max: [f64; 52],
    pub mu_min: [f64; 52],
    pub sigma2_max: [f64; 52],
    pub sigma2_min: [f64; 52],
    pub sigma_max_min: [f64; 52],
    pub cf_max_wet: [f64; 52],
    pub cf_min_wet: [f64; 52],
    pub cf_max_dry: [f64; 52],
    pub cf_min_dry: [f64; 52],
}

impl Default for MarkovTables {
    fn default() -> Self {
        Self {
            p_wet_given_wet: [0.0; 366],
            p_wet_given_dry: [0.0; 366],
            mu_ppt: [0.0; 366],
            sigma_ppt: [0.0; 366],
            mu_max: [0.0; 52],
            mu_min: [0.0; 52],
            sigma2_max: [0.0; 52],
            sigma2_min: [0.0; 52],
            sigma_max_min: [0.0; 52],
            cf_max_wet: [0.0; 52],
            cf_min_wet: [0.0; 52],
            cf_max_dry: [0.0; 52],
            cf_min_dry: [0.0; 52],
        }
    }
}

/// Everything owned by a single site: the static profile/grid geometry plus all state
/// that persists across days. Never shared behind a global; a driver runs independent
/// sites by giving each its own `SiteState`.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteState {
    pub profile: SoilProfile,
    pub daily: DailyState,
    pub weather: WeatherState,
    pub temp_grid: TempGrid,
    pub fusion: FusionPool,
    pub markov: MarkovTables,
    pub markov_rng_seed: u64,
    pub status: crate::engine::core::error::SiteStatus,
    pub t_const_c: f64,
    pub physics: PhysicsParams,
    pub pft_physiology: [PftPhysiology; PFT_COUNT],
}
