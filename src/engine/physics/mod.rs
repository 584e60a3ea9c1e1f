// ABOUTME: Daily pipeline orchestration - wires WeatherProvider -> InterceptionLayer ->
// ABOUTME: EvapDemandModel -> SoilWaterEngine -> SoilTemperatureEngine into one run_day call

pub mod evap_demand;
pub mod interception;
pub mod markov;
pub mod pet_utils;
pub mod temperature;
pub mod water;

use crate::engine::core::{MarkovError, MarkovTables, Pft, SiteState, PFT_COUNT};
use crate::engine::diagnostics::Observer;
use evap_demand::{est_partitioning, petfunc, pot_soil_evap, pot_soil_evap_bs, pot_transp, transp_weighted_avg, PetInputs};
use interception::{intercept, litter_intercepted_water, MAX_WINTFOR, MAX_WINTSTCR};
use markov::MarkovGenerator;
use temperature::{T1Params, TemperatureDayInputs, ThermalParams};
use water::{hydraulic_redistribution, infiltrate_water_high, infiltrate_water_low, withdraw_est, WaterFluxes};

/// Today's per-PFT canopy state, supplied by the (out-of-scope) vegetation driver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PftDailyInputs {
    pub live_biomass_g_m2: f64,
    pub dead_biomass_g_m2: f64,
    pub lai_live: f64,
    /// Fractional cover of the site this PFT occupies; scales its transpiration and
    /// hydraulic-redistribution contribution to whole-site SWC.
    pub cover_fraction: f64,
}

impl Default for PftDailyInputs {
    fn default() -> Self {
        Self {
            live_biomass_g_m2: 0.0,
            dead_biomass_g_m2: 0.0,
            lai_live: 0.0,
            cover_fraction: 0.0,
        }
    }
}

/// Today's biomass/LAI snapshot across all PFTs plus litter, already adjusted for any
/// CO2 scenario multiplier by the driver (the core never reads scenario tables itself).
#[derive(Clone, Debug, PartialEq)]
pub struct BiomassToday {
    /// Order must match `Pft::all()`.
    pub pft: [PftDailyInputs; PFT_COUNT],
    pub litter_biomass_g_m2: f64,
}

/// Today's observed (or generator-supplied) weather drivers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeatherToday {
    pub precip_cm: f64,
    pub tmax_c: f64,
    pub tmin_c: f64,
    /// 1-indexed day of year.
    pub doy: u32,
}

/// Aggregate fluxes produced by one `run_day` call, for mass-balance bookkeeping and
/// output accumulation by the (out-of-scope) CSV writer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DailyFluxes {
    pub water: WaterFluxes,
    pub pet_cm: f64,
    pub aet_cm: f64,
    pub intercepted_cm: f64,
    pub surface_temp_c: f64,
}

/// Read-only view of today's frozen flags, consumed by the (external) water-balance
/// reporting layer.
pub fn frozen_flags(site: &SiteState) -> Vec<bool> {
    site.daily.frozen.clone()
}

/// Thin pass-through to `MarkovGenerator::generate_weather`, matching the external
/// contract's signature.
pub fn generate_weather(
    generator: &mut MarkovGenerator,
    tables: &MarkovTables,
    doy0: usize,
    yesterday_rain_cm: f64,
) -> Result<(f64, f64, f64), MarkovError> {
    generator.generate_weather(tables, doy0, yesterday_rain_cm)
}

/// Crude month index (0-indexed) for looking up monthly climate normals from a 1-indexed
/// day-of-year. Climate normals are coarse inputs; a 30.44-day-average month boundary is
/// adequate here and keeps this free of a full Gregorian calendar dependency.
fn month_of(doy: u32) -> usize {
    (((doy.max(1) - 1) as f64 / 30.44) as usize).min(11)
}

/// Runs one simulated day end to end: rain/snow split and simple snowpack bookkeeping,
/// canopy/litter interception, potential evapotranspiration and Es/T partitioning, the
/// four-step SoilWaterEngine, and the SoilTemperatureEngine (which also updates frozen
/// flags for tomorrow). Deterministic given `site` and the two input snapshots.
pub fn run_day(site: &mut SiteState, weather_today: &WeatherToday, biomass_today: &BiomassToday) -> DailyFluxes {
    site.status.reset_daily_flags();

    let tavg = (weather_today.tmax_c + weather_today.tmin_c) / 2.0;
    site.weather.tmax_yesterday = site.weather.tmax_today;
    site.weather.tmin_yesterday = site.weather.tmin_today;
    site.weather.tmax_today = weather_today.tmax_c;
    site.weather.tmin_today = weather_today.tmin_c;

    // WeatherProvider: split precipitation into rain/snow by a freezing-point threshold,
    // then run a minimal degree-day melt model. The original's snow-accumulation routine
    // is not part of the retrieved source; this stands in for it (see DESIGN.md).
    const SNOW_DENSITY: f64 = 0.3;
    const MELT_RATE_CM_PER_C: f64 = 0.15;

    let (mut pptleft, snow_cm) = if tavg <= 0.0 {
        (0.0, weather_today.precip_cm)
    } else {
        (weather_today.precip_cm, 0.0)
    };
    site.daily.swe_cm += snow_cm;
    site.weather.rain_cm = pptleft;
    site.weather.snow_cm = snow_cm;

    if tavg > 0.0 && site.daily.swe_cm > 0.0 {
        let melt = (tavg * MELT_RATE_CM_PER_C).min(site.daily.swe_cm);
        site.daily.swe_cm -= melt;
        pptleft += melt;
    }
    site.daily.snow_depth_cm = site.daily.swe_cm / SNOW_DENSITY;

    // InterceptionLayer: canopy pools in PFT order, then litter.
    let snow_scale = 1.0 - (site.daily.snow_depth_cm / 10.0).min(1.0);
    let mut intercepted_total = 0.0;
    for pft in Pft::all() {
        let idx = pft.index();
        let phys = &site.pft_physiology[idx];
        let cov = if pft == Pft::Tree {
            biomass_today.pft[idx].lai_live
        } else {
            biomass_today.pft[idx].cover_fraction
        };
        let max_pool = if pft == Pft::Tree { MAX_WINTFOR } else { MAX_WINTSTCR };
        let result = intercept(
            pptleft,
            cov,
            snow_scale,
            phys.intercept_a,
            phys.intercept_b,
            phys.intercept_c,
            phys.intercept_d,
            max_pool,
        );
        intercepted_total += result.intercepted_cm;
        pptleft = result.pptleft_cm;
    }
    let litter = litter_intercepted_water(
        pptleft,
        biomass_today.litter_biomass_g_m2,
        snow_scale,
        site.physics.litter_intercept_a,
        site.physics.litter_intercept_b,
        site.physics.litter_intercept_c,
        site.physics.litter_intercept_d,
    );
    intercepted_total += litter.intercepted_cm;
    pptleft = litter.pptleft_cm;

    // EvapDemandModel: PET, then Es/T partitioning.
    let month = month_of(weather_today.doy);
    let pet_inputs = PetInputs {
        doy: weather_today.doy,
        avg_temp_c: tavg,
        latitude_rad: site.weather.latitude_rad,
        elevation_m: site.weather.elevation_m,
        slope_deg: site.weather.slope_deg,
        aspect_deg: site.weather.aspect_deg,
        albedo: site.weather.albedo,
        humidity_pct: site.weather.humidity_pct[month],
        wind_speed_m_s: site.weather.wind_speed_m_s[month],
        cloud_cover_pct: site.weather.cloud_cover_pct[month],
        transmission_coeff: site.weather.transmission_coeff[month],
    };
    let pet = petfunc(&pet_inputs);
    site.daily.pet_cm = pet;

    let total_agb: f64 = biomass_today
        .pft
        .iter()
        .map(|p| p.live_biomass_g_m2 + p.dead_biomass_g_m2)
        .sum::<f64>()
        + biomass_today.litter_biomass_g_m2;

    let total_live_lai: f64 = biomass_today.pft.iter().map(|p| p.lai_live).sum();
    let avg_lai_param = site.pft_physiology.iter().map(|p| p.lai_param).sum::<f64>() / PFT_COUNT as f64;
    let (fbse, fbst) = est_partitioning(total_live_lai, avg_lai_param);

    let es_limit = site
        .pft_physiology
        .iter()
        .map(|p| p.es_param_limit)
        .fold(f64::INFINITY, f64::min);

    let es_rate = if total_live_lai > 0.0 {
        pot_soil_evap(
            &site.profile.layers,
            &site.daily.swc,
            total_agb,
            fbse,
            pet,
            site.physics.watrate_shift,
            site.physics.watrate_shape,
            site.physics.watrate_inflec,
            site.physics.watrate_range,
            es_limit,
        )
    } else {
        pot_soil_evap_bs(
            &site.profile.layers,
            &site.daily.swc,
            pet,
            site.physics.watrate_shift,
            site.physics.watrate_shape,
            site.physics.watrate_inflec,
            site.physics.watrate_range,
        )
    };

    let mut transp_rate = [0.0; PFT_COUNT];
    for pft in Pft::all() {
        let idx = pft.index();
        let p = &biomass_today.pft[idx];
        if p.live_biomass_g_m2 <= 0.0 || p.cover_fraction <= 0.0 {
            continue;
        }
        let phys = &site.pft_physiology[idx];

        let mut min_swp = f64::INFINITY;
        for region in 0..site.profile.n_transp_regions {
            let avg = transp_weighted_avg(&site.profile.layers, &site.daily.swc, pft, region);
            min_swp = min_swp.min(avg);
        }
        if !min_swp.is_finite() {
            min_swp = 0.0;
        }

        let rate = pot_transp(
            min_swp,
            p.live_biomass_g_m2,
            p.dead_biomass_g_m2,
            fbst,
            pet,
            site.physics.watrate_shift,
            site.physics.watrate_shape,
            site.physics.watrate_inflec,
            site.physics.watrate_range,
            phys.shade_scale,
            phys.shade_deadmax,
            phys.shade_xinflex,
            phys.shade_slope,
            phys.shade_yinflex,
            phys.shade_range,
        );
        transp_rate[idx] = rate * p.cover_fraction;
    }

    // SoilWaterEngine, in strict order.
    let mut deep_drainage = infiltrate_water_high(
        &mut site.daily.swc,
        &site.profile,
        &site.daily.frozen,
        pptleft,
        &mut site.daily.standing_water_cm,
    );

    let evap_coeff: Vec<f64> = site.profile.layers.iter().map(|l| l.evap_coeff).collect();
    let mut aet = withdraw_est(&mut site.daily.swc, &site.profile, &site.daily.frozen, &evap_coeff, es_rate);

    for pft in Pft::all() {
        let idx = pft.index();
        if transp_rate[idx] <= 0.0 {
            continue;
        }
        let coeff: Vec<f64> = site.profile.layers.iter().map(|l| l.pft_params(pft).transp_coeff).collect();
        aet += withdraw_est(&mut site.daily.swc, &site.profile, &site.daily.frozen, &coeff, transp_rate[idx]);
    }

    deep_drainage += infiltrate_water_low(
        &mut site.daily.swc,
        &site.profile,
        &site.daily.frozen,
        site.physics.sdrainpar,
        site.physics.sdraindpth,
        &mut site.daily.standing_water_cm,
    );

    for pft in Pft::all() {
        let idx = pft.index();
        let cover = biomass_today.pft[idx].cover_fraction;
        if cover <= 0.0 {
            continue;
        }
        hydraulic_redistribution(
            &mut site.daily.swc,
            &site.profile,
            &site.daily.frozen,
            pft,
            site.physics.hydred_max_cond_root,
            site.physics.hydred_swp50,
            site.physics.hydred_shape_cond,
            cover,
        );
    }

    site.daily.aet_cm = aet;

    // SoilTemperatureEngine, coupled back into frozen flags for tomorrow.
    let temp_inputs = TemperatureDayInputs {
        avg_air_temp_c: tavg,
        pet_cm: pet,
        aet_cm: aet,
        total_agb_g_m2: total_agb,
    };
    let thermal = ThermalParams {
        cs_param1: site.physics.cs_param1,
        cs_param2: site.physics.cs_param2,
        sh_param: site.physics.sh_param,
    };
    let t1params = T1Params {
        t1_param1: site.physics.t1_param1,
        t1_param2: site.physics.t1_param2,
        t1_param3: site.physics.t1_param3,
        bm_limiter: site.physics.bm_limiter,
    };

    temperature::run_day(
        &mut site.temp_grid,
        &site.profile,
        &mut site.daily,
        &mut site.fusion,
        &mut site.status,
        site.t_const_c,
        &temp_inputs,
        &thermal,
        &t1params,
    )
    .expect("temperature grid geometry was already validated at site construction");

    DailyFluxes {
        water: WaterFluxes {
            deep_drainage_cm: deep_drainage,
            standing_water_added_cm: site.daily.standing_water_cm,
            aet_cm: aet,
        },
        pet_cm: pet,
        aet_cm: aet,
        intercepted_cm: intercepted_total,
        surface_temp_c: site.daily.t_surface_today,
    }
}

/// Same as `run_day`, but also reports each component's headline scalars to `observer`.
/// Kept as a thin wrapper so the bare `run_day` contract stays exactly as documented.
pub fn run_day_observed(
    site: &mut SiteState,
    weather_today: &WeatherToday,
    biomass_today: &BiomassToday,
    day: u32,
    observer: &mut dyn Observer,
) -> DailyFluxes {
    let fluxes = run_day(site, weather_today, biomass_today);
    observer.on_day(day, "water", &[
        ("deep_drainage_cm", fluxes.water.deep_drainage_cm),
        ("aet_cm", fluxes.aet_cm),
        ("standing_water_cm", fluxes.water.standing_water_added_cm),
    ]);
    observer.on_day(day, "evap_demand", &[("pet_cm", fluxes.pet_cm), ("intercepted_cm", fluxes.intercepted_cm)]);
    observer.on_day(day, "temperature", &[("surface_c", fluxes.surface_temp_c)]);
    fluxes
}
