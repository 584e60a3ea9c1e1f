// ABOUTME: YAML-based site configuration, validated into a ready-to-run SiteState
// ABOUTME: Mirrors engine::config's load/save convention, scoped to one site

use serde::{Deserialize, Serialize};

use crate::engine::core::{
    ConfigError, DailyState, FusionPool, Layer, MarkovTables, PftLayerParams, PftPhysiology,
    PhysicsParams, SiteState, SoilProfile, TempGrid, WeatherState, MAX_LAYERS, PFT_COUNT,
};

/// Top-level configuration for a single site run, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub metadata: SiteMetadata,
    pub grid: GridConfig,
    pub location: LocationConfig,
    pub climate: ClimateNormals,
    pub layers: Vec<LayerConfig>,
    pub markov: MarkovConfig,
    /// Order must match `Pft::all()`: grass, shrub, tree, forb.
    pub pft_physiology: [PftPhysiologyConfig; PFT_COUNT],
    pub physics: PhysicsConfig,
    /// RNG seed for the Markov generator. Absent means time-seeded; present means
    /// reproducible, same role as a simulation-defaults `seed` field.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMetadata {
    pub name: String,
    pub author: String,
    pub created: String,
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub delta_x_cm: f64,
    pub max_depth_cm: f64,
    /// Deep constant sub-soil temperature boundary condition (deg C).
    pub t_const_c: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            delta_x_cm: 15.0,
            max_depth_cm: 180.0,
            t_const_c: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude_deg: f64,
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub aspect_deg: f64,
    pub albedo: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateNormals {
    pub cloud_cover_pct: [f64; 12],
    pub humidity_pct: [f64; 12],
    pub wind_speed_m_s: [f64; 12],
    pub transmission_coeff: [f64; 12],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PftLayerConfig {
    pub transp_coeff: f64,
    pub root_fraction: f64,
    pub swp_crit_bar: f64,
}

impl From<PftLayerConfig> for PftLayerParams {
    fn from(c: PftLayerConfig) -> Self {
        PftLayerParams {
            transp_coeff: c.transp_coeff,
            root_fraction: c.root_fraction,
            swp_crit_bar: c.swp_crit_bar,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub width_cm: f64,
    pub bulk_density_g_cm3: f64,
    pub gravel_fraction: f64,
    pub swc_fc: f64,
    pub swc_wp: f64,
    pub swc_min: f64,
    pub swc_sat: f64,
    pub swp_fc_bar: f64,
    pub swp_wp_bar: f64,
    pub impermeability: f64,
    pub evap_coeff: f64,
    pub transp_region: usize,
    /// Order must match `Pft::all()`: grass, shrub, tree, forb.
    pub pft: [PftLayerConfig; PFT_COUNT],
}

/// Per-PFT physiology not tied to a specific layer: light extinction, shade-factor
/// curve, and canopy interception shape coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PftPhysiologyConfig {
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

impl From<PftPhysiologyConfig> for PftPhysiology {
    fn from(c: PftPhysiologyConfig) -> Self {
        PftPhysiology {
            lai_param: c.lai_param,
            es_param_limit: c.es_param_limit,
            shade_scale: c.shade_scale,
            shade_deadmax: c.shade_deadmax,
            shade_xinflex: c.shade_xinflex,
            shade_yinflex: c.shade_yinflex,
            shade_range: c.shade_range,
            shade_slope: c.shade_slope,
            intercept_a: c.intercept_a,
            intercept_b: c.intercept_b,
            intercept_c: c.intercept_c,
            intercept_d: c.intercept_d,
        }
    }
}

impl Default for PftPhysiologyConfig {
    fn default() -> Self {
        Self {
            lai_param: 0.3,
            es_param_limit: 999.0,
            shade_scale: 1.0,
            shade_deadmax: 999.0,
            shade_xinflex: 0.0,
            shade_yinflex: 1.0,
            shade_range: 1.0,
            shade_slope: 1.0,
            intercept_a: 0.0,
            intercept_b: 0.01,
            intercept_c: 0.0,
            intercept_d: 0.01,
        }
    }
}

/// Site-wide physics tuning constants shared across the whole pipeline. Defaults match
/// the original's cited constants (Parton 1978/1984 thermal coefficients, the T1
/// breakpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
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

impl From<PhysicsConfig> for PhysicsParams {
    fn from(c: PhysicsConfig) -> Self {
        PhysicsParams {
            watrate_shift: c.watrate_shift,
            watrate_shape: c.watrate_shape,
            watrate_inflec: c.watrate_inflec,
            watrate_range: c.watrate_range,
            sdrainpar: c.sdrainpar,
            sdraindpth: c.sdraindpth,
            hydred_max_cond_root: c.hydred_max_cond_root,
            hydred_swp50: c.hydred_swp50,
            hydred_shape_cond: c.hydred_shape_cond,
            cs_param1: c.cs_param1,
            cs_param2: c.cs_param2,
            sh_param: c.sh_param,
            t1_param1: c.t1_param1,
            t1_param2: c.t1_param2,
            t1_param3: c.t1_param3,
            bm_limiter: c.bm_limiter,
            litter_intercept_a: c.litter_intercept_a,
            litter_intercept_b: c.litter_intercept_b,
            litter_intercept_c: c.litter_intercept_c,
            litter_intercept_d: c.litter_intercept_d,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            watrate_shift: 0.0,
            watrate_shape: 1.0,
            watrate_inflec: 0.5,
            watrate_range: 0.5,
            sdrainpar: 0.02,
            sdraindpth: 1.0,
            hydred_max_cond_root: 0.05,
            hydred_swp50: -5.0,
            hydred_shape_cond: 4.0,
            cs_param1: 0.0007,
            cs_param2: 0.0003,
            sh_param: 0.18,
            t1_param1: 15.0,
            t1_param2: -4.0,
            t1_param3: 600.0,
            bm_limiter: 300.0,
            litter_intercept_a: 0.0,
            litter_intercept_b: 0.01,
            litter_intercept_c: 0.0,
            litter_intercept_d: 0.01,
        }
    }
}

/// Day-of-year (1..=366) and week-of-year (1..=52) Markov tables, as read from the
/// original file-based `SW_Markov.c` inputs - flat vectors rather than fixed arrays so
/// YAML authors aren't forced to spell out all 366/52 entries inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovConfig {
    pub p_wet_given_wet: Vec<f64>,
    pub p_wet_given_dry: Vec<f64>,
    pub mu_ppt: Vec<f64>,
    pub sigma_ppt: Vec<f64>,
    pub mu_max: Vec<f64>,
    pub mu_min: Vec<f64>,
    pub sigma2_max: Vec<f64>,
    pub sigma2_min: Vec<f64>,
    pub sigma_max_min: Vec<f64>,
    pub cf_max_wet: Vec<f64>,
    pub cf_min_wet: Vec<f64>,
    pub cf_max_dry: Vec<f64>,
    pub cf_min_dry: Vec<f64>,
}

impl SiteConfig {
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate every Configuration-class invariant from the error-handling design
    /// before a `SiteState` is ever constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.is_empty() {
            return Err(ConfigError::EmptyProfile);
        }
        if self.layers.len() > MAX_LAYERS {
            return Err(ConfigError::TooManyLayers {
                count: self.layers.len(),
            });
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.swc_min > layer.swc_sat {
                return Err(ConfigError::InvertedWaterBounds {
                    layer: i,
                    swc_min: layer.swc_min,
                    swc_sat: layer.swc_sat,
                });
            }
        }

        let profile_depth: f64 = self.layers.iter().map(|l| l.width_cm).sum();
        if self.grid.max_depth_cm < profile_depth {
            return Err(ConfigError::GridShallowerThanProfile {
                max_depth: self.grid.max_depth_cm,
                profile_depth,
            });
        }

        for (i, &p) in self
            .markov
            .p_wet_given_wet
            .iter()
            .chain(self.markov.p_wet_given_dry.iter())
            .enumerate()
        {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::ProbabilityOutOfRange {
                    layer: i,
                    field: "markov wet/dry probability",
                    value: p,
                });
            }
        }

        for week in 0..self.markov.sigma_max_min.len() {
            let cov = self.markov.sigma_max_min[week];
            let bound = self.markov.sigma2_max[week] * self.markov.sigma2_min[week];
            if cov * cov > bound {
                return Err(ConfigError::DegenerateCovariance {
                    week,
                    cov_sq: cov * cov,
                    bound,
                });
            }
        }

        Ok(())
    }

    /// Build a ready-to-run `SiteState`. Callers must call `validate()` first (or rely
    /// on this failing with the same error) - kept separate so a driver can validate a
    /// batch of configs up front before spending time on any of them.
    pub fn build(&self) -> Result<SiteState, ConfigError> {
        self.validate()?;

        let layers: Vec<Layer> = self
            .layers
            .iter()
            .map(|lc| Layer {
                width_cm: lc.width_cm,
                bulk_density_g_cm3: lc.bulk_density_g_cm3,
                gravel_fraction: lc.gravel_fraction,
                swc_fc: lc.swc_fc,
                swc_wp: lc.swc_wp,
                swc_min: lc.swc_min,
                swc_sat: lc.swc_sat,
                swp_fc_bar: lc.swp_fc_bar,
                swp_wp_bar: lc.swp_wp_bar,
                impermeability: lc.impermeability,
                evap_coeff: lc.evap_coeff,
                transp_region: lc.transp_region,
                pft: std::array::from_fn(|i| lc.pft[i].clone().into()),
            })
            .collect();

        let n_transp_regions = layers.iter().map(|l| l.transp_region).max().unwrap_or(0) + 1;
        let n_layers = layers.len();
        let profile = SoilProfile {
            layers,
            n_transp_regions,
        };

        let daily = DailyState::new(n_layers, self.grid.t_const_c);

        let weather = WeatherState {
            tmax_today: self.grid.t_const_c,
            tmin_today: self.grid.t_const_c,
            tmax_yesterday: self.grid.t_const_c,
            tmin_yesterday: self.grid.t_const_c,
            rain_cm: 0.0,
            snow_cm: 0.0,
            cloud_cover_pct: self.climate.cloud_cover_pct,
            humidity_pct: self.climate.humidity_pct,
            wind_speed_m_s: self.climate.wind_speed_m_s,
            transmission_coeff: self.climate.transmission_coeff,
            latitude_rad: self.location.latitude_deg.to_radians(),
            elevation_m: self.location.elevation_m,
            slope_deg: self.location.slope_deg,
            aspect_deg: self.location.aspect_deg,
            albedo: self.location.albedo,
        };

        let temp_grid = TempGrid::new(self.grid.delta_x_cm, self.grid.max_depth_cm);
        let fusion = FusionPool::new(n_layers);

        let markov = MarkovTables {
            p_wet_given_wet: pad_366(&self.markov.p_wet_given_wet),
            p_wet_given_dry: pad_366(&self.markov.p_wet_given_dry),
            mu_ppt: pad_366(&self.markov.mu_ppt),
            sigma_ppt: pad_366(&self.markov.sigma_ppt),
            mu_max: pad_52(&self.markov.mu_max),
            mu_min: pad_52(&self.markov.mu_min),
            sigma2_max: pad_52(&self.markov.sigma2_max),
            sigma2_min: pad_52(&self.markov.sigma2_min),
            sigma_max_min: pad_52(&self.markov.sigma_max_min),
            cf_max_wet: pad_52(&self.markov.cf_max_wet),
            cf_min_wet: pad_52(&self.markov.cf_min_wet),
            cf_max_dry: pad_52(&self.markov.cf_max_dry),
            cf_min_dry: pad_52(&self.markov.cf_min_dry),
        };

        Ok(SiteState {
            profile,
            daily,
            weather,
            temp_grid,
            fusion,
            markov,
            markov_rng_seed: self.seed.unwrap_or(42),
            status: Default::default(),
            t_const_c: self.grid.t_const_c,
            physics: self.physics.clone().into(),
            pft_physiology: std::array::from_fn(|i| self.pft_physiology[i].clone().into()),
        })
    }
}

fn pad_366(src: &[f64]) -> [f64; 366] {
    let mut out = [0.0; 366];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = src.get(i % src.len().max(1)).copied().unwrap_or(0.0);
    }
    out
}

fn pad_52(src: &[f64]) -> [f64; 52] {
    let mut out = [0.0; 52];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = src.get(i % src.len().max(1)).copied().unwrap_or(0.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> SiteConfig {
        SiteConfig {
            metadata: SiteMetadata {
                name: "test".into(),
                author: "test".into(),
                created: "2024-01-01".into(),
                description: None,
                version: "1.0".into(),
            },
            grid: GridConfig::default(),
            location: LocationConfig {
                latitude_deg: 40.0,
                elevation_m: 1600.0,
                slope_deg: 0.0,
                aspect_deg: 0.0,
                albedo: 0.2,
            },
            climate: ClimateNormals {
                cloud_cover_pct: [40.0; 12],
                humidity_pct: [50.0; 12],
                wind_speed_m_s: [2.0; 12],
                transmission_coeff: [1.0; 12],
            },
            layers: vec![LayerConfig {
                width_cm: 10.0,
                bulk_density_g_cm3: 1.4,
                gravel_fraction: 0.0,
                swc_fc: 2.5,
                swc_wp: 1.2,
                swc_min: 1.0,
                swc_sat: 4.0,
                swp_fc_bar: -0.33,
                swp_wp_bar: -15.0,
                impermeability: 0.0,
                evap_coeff: 1.0,
                transp_region: 0,
                pft: std::array::from_fn(|_| PftLayerConfig {
                    transp_coeff: 0.25,
                    root_fraction: 0.25,
                    swp_crit_bar: -30.0,
                }),
            }],
            markov: MarkovConfig {
                p_wet_given_wet: vec![0.5; 366],
                p_wet_given_dry: vec![0.2; 366],
                mu_ppt: vec![0.3; 366],
                sigma_ppt: vec![0.2; 366],
                mu_max: vec![20.0; 52],
                mu_min: vec![5.0; 52],
                sigma2_max: vec![9.0; 52],
                sigma2_min: vec![4.0; 52],
                sigma_max_min: vec![1.0; 52],
                cf_max_wet: vec![0.0; 52],
                cf_min_wet: vec![0.0; 52],
                cf_max_dry: vec![0.0; 52],
                cf_min_dry: vec![0.0; 52],
            },
            pft_physiology: std::array::from_fn(|_| PftPhysiologyConfig::default()),
            physics: PhysicsConfig::default(),
            seed: Some(7),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn rejects_shallow_grid() {
        let mut cfg = minimal_config();
        cfg.grid.max_depth_cm = 1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::GridShallowerThanProfile { .. })
        ));
    }

    #[test]
    fn rejects_too_many_layers() {
        let mut cfg = minimal_config();
        let layer = cfg.layers[0].clone();
        cfg.layers = std::iter::repeat(layer).take(MAX_LAYERS + 1).collect();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyLayers { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let mut cfg = minimal_config();
        cfg.markov.p_wet_given_wet[10] = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ProbabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_degenerate_covariance() {
        let mut cfg = minimal_config();
        cfg.markov.sigma_max_min[0] = 100.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DegenerateCovariance { .. })
        ));
    }

    #[test]
    fn build_produces_consistent_state() {
        let site = minimal_config().build().expect("build");
        assert_eq!(site.profile.n_layers(), 1);
        assert_eq!(site.daily.swc.len(), 1);
        assert_eq!(site.temp_grid.n_rgr, 12);
    }
}
