// ABOUTME: CLI entry point - loads a site config and runs the daily pipeline for N days
// ABOUTME: Subcommands: `run` for one site, `batch` for many configs in parallel via rayon

mod engine;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, warn};
use rayon::prelude::*;

use engine::physics::markov::MarkovGenerator;
use engine::physics::{generate_weather, run_day, BiomassToday, PftDailyInputs, WeatherToday};
use engine::{SiteConfig, SiteState};

#[derive(Parser)]
#[command(name = "pedoflux")]
#[command(about = "Daily-timestep point-scale soil-water and soil-temperature simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one site config for a fixed number of days, writing daily fluxes to stdout.
    Run {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value_t = 365)]
        days: u32,

        /// Overrides the config's RNG seed, if set.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Constant live grass biomass (g/m^2) driving transpiration and Es/T
        /// partitioning; vegetation dynamics are outside this engine's scope.
        #[arg(long, default_value_t = 150.0)]
        grass_biomass_g_m2: f64,
    },
    /// Run every config under a directory concurrently, one site per task.
    Batch {
        #[arg(long)]
        config_dir: PathBuf,

        #[arg(long, default_value_t = 365)]
        days: u32,
    },
}

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Csv,
    Summary,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            days,
            seed,
            format,
            grass_biomass_g_m2,
        } => run_single(&config, days, seed, format, grass_biomass_g_m2),
        Command::Batch { config_dir, days } => run_batch(&config_dir, days),
    }
}

fn run_single(
    config_path: &PathBuf,
    days: u32,
    seed_override: Option<u64>,
    format: OutputFormat,
    grass_biomass_g_m2: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let path_str = config_path.to_string_lossy();
    info!("loading site config from {path_str}");
    let mut config = SiteConfig::load_from_file(&path_str)?;
    if let Some(seed) = seed_override {
        config.seed = Some(seed);
    }

    let mut site = config.build()?;
    let mut markov = MarkovGenerator::new(site.markov_rng_seed);
    let biomass = flat_biomass(grass_biomass_g_m2);

    if format == OutputFormat::Csv {
        println!("day,rain_cm,tmax_c,tmin_c,pet_cm,aet_cm,deep_drainage_cm,surface_temp_c,alpha_exceeded");
    }

    let mut yesterday_rain = 0.0;
    for day in 1..=days {
        let doy0 = ((day - 1) % 366) as usize;
        let (rain, tmax, tmin) = generate_weather(&mut markov, &site.markov, doy0, yesterday_rain)?;
        yesterday_rain = rain;

        let weather = WeatherToday {
            precip_cm: rain,
            tmax_c: tmax,
            tmin_c: tmin,
            doy: day,
        };
        let fluxes = run_day(&mut site, &weather, &biomass);

        if site.status.temperature_alpha_exceeded {
            warn!("day {day}: finite-difference stability coefficient exceeded 1.0");
        }

        match format {
            OutputFormat::Csv => println!(
                "{day},{rain:.4},{tmax:.2},{tmin:.2},{:.4},{:.4},{:.4},{:.2},{}",
                fluxes.pet_cm,
                fluxes.aet_cm,
                fluxes.water.deep_drainage_cm,
                fluxes.surface_temp_c,
                site.status.temperature_alpha_exceeded as u8,
            ),
            OutputFormat::Summary => {
                if day == days {
                    println!(
                        "{}: {} days, alpha exceeded on {} day(s), final surface temp {:.2} C",
                        config.metadata.name, days, site.status.temperature_alpha_exceeded_days, fluxes.surface_temp_c
                    );
                }
            }
        }
    }

    Ok(())
}

fn run_batch(config_dir: &PathBuf, days: u32) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<PathBuf> = std::fs::read_dir(config_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
        .collect();

    info!("running {} site config(s) from {}", entries.len(), config_dir.display());

    let results: Vec<Result<(String, SiteState), String>> = entries
        .par_iter()
        .map(|path| {
            let path_str = path.to_string_lossy();
            let config = SiteConfig::load_from_file(&path_str).map_err(|e| format!("{path_str}: {e}"))?;
            let mut site = config.build().map_err(|e| format!("{path_str}: {e}"))?;
            let mut markov = MarkovGenerator::new(site.markov_rng_seed);
            let biomass = flat_biomass(150.0);

            let mut yesterday_rain = 0.0;
            for day in 1..=days {
                let doy0 = ((day - 1) % 366) as usize;
                let (rain, tmax, tmin) = generate_weather(&mut markov, &site.markov, doy0, yesterday_rain)
                    .map_err(|e| format!("{path_str}: {e}"))?;
                yesterday_rain = rain;
                let weather = WeatherToday {
                    precip_cm: rain,
                    tmax_c: tmax,
                    tmin_c: tmin,
                    doy: day,
                };
                run_day(&mut site, &weather, &biomass);
            }

            Ok((config.metadata.name, site))
        })
        .collect();

    for result in results {
        match result {
            Ok((name, site)) => println!(
                "{name}: alpha exceeded on {} of {days} day(s)",
                site.status.temperature_alpha_exceeded_days
            ),
            Err(msg) => eprintln!("site failed: {msg}"),
        }
    }

    Ok(())
}

fn flat_biomass(grass_biomass_g_m2: f64) -> BiomassToday {
    let mut pft = [PftDailyInputs::default(); 4];
    pft[0] = PftDailyInputs {
        live_biomass_g_m2: grass_biomass_g_m2,
        dead_biomass_g_m2: 0.0,
        lai_live: grass_biomass_g_m2 / 100.0,
        cover_fraction: 0.6,
    };
    BiomassToday {
        pft,
        litter_biomass_g_m2: 0.0,
    }
}
