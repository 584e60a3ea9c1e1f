// ABOUTME: MarkovGenerator - first-order wet/dry precipitation chain plus bivariate-normal temperature
// ABOUTME: Grounded on SW_Markov.c's SW_MKV_today/mvnorm/temp_correct_wetdry, with an explicit per-site RNG

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg32;

use crate::engine::core::error::MarkovError;
use crate::engine::core::MarkovTables;

/// Stochastic weather generator. Owns its RNG as a struct field - never a process-wide
/// static - so concurrently simulated sites never share or race over generator state.
pub struct MarkovGenerator {
    rng: Pcg32,
}

impl MarkovGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: Pcg32::seed_from_u64(seed) }
    }

    /// Maps a 1-indexed day-of-year to a 0-indexed week-of-year, clamped into the last
    /// (52nd) week so a 366-day year doesn't walk off the table. The `doy + 1` lookahead
    /// used at the call site is intentional (see `generate_weather`) and is exercised by
    /// tests at both ends of the year.
    pub fn doy2week(doy_1indexed: u32) -> usize {
        (((doy_1indexed.max(1) - 1) / 7) as usize).min(51)
    }

    /// Draws today's rain, Tmax, and Tmin given yesterday's rain and day-of-year (0-indexed,
    /// 0..=365). Mirrors `SW_MKV_today`: the wet/dry chain, the bivariate-normal draw via a
    /// Cholesky factor, and the additive wet/dry temperature correction, in that order.
    pub fn generate_weather(
        &mut self,
        tables: &MarkovTables,
        doy0: usize,
        yesterday_rain_cm: f64,
    ) -> Result<(f64, f64, f64), MarkovError> {
        let rain = self.draw_rain(tables, doy0, yesterday_rain_cm);

        let week = Self::doy2week(doy0 as u32 + 1);
        let (mut tmax, mut tmin) = self.draw_temperature(tables, week)?;

        if rain > 0.0 {
            tmax += tables.cf_max_wet[week];
            tmin = tmax.min(tmin + tables.cf_min_wet[week]);
        } else {
            tmax += tables.cf_max_dry[week];
            tmin = tmax.min(tmin + tables.cf_min_dry[week]);
        }

        Ok((rain, tmax, tmin))
    }

    fn draw_rain(&mut self, tables: &MarkovTables, doy0: usize, yesterday_rain_cm: f64) -> f64 {
        let prob = if yesterday_rain_cm > 0.0 {
            tables.p_wet_given_wet[doy0]
        } else {
            tables.p_wet_given_dry[doy0]
        };

        let p: f64 = self.rng.gen();
        if p <= prob {
            let sigma = tables.sigma_ppt[doy0].max(0.0);
            let x = if sigma > 0.0 {
                let normal = Normal::new(tables.mu_ppt[doy0], sigma).expect("sigma validated positive");
                normal.sample(&mut self.rng)
            } else {
                tables.mu_ppt[doy0]
            };
            x.max(0.0)
        } else {
            0.0
        }
    }

    /// Bivariate-normal (Tmax, Tmin) draw via the Cholesky factor of the weekly
    /// covariance matrix. `vc10`/`vc11` naming matches `mvnorm`.
    fn draw_temperature(&mut self, tables: &MarkovTables, week: usize) -> Result<(f64, f64), MarkovError> {
        let standard_normal = Normal::new(0.0, 1.0).expect("unit normal is always valid");
        let z1 = standard_normal.sample(&mut self.rng);
        let z2 = standard_normal.sample(&mut self.rng);

        let wmax_var = tables.sigma2_max[week];
        let wmin_var = tables.sigma2_min[week];
        let covar = tables.sigma_max_min[week];

        let wmax_sd = wmax_var.max(0.0).sqrt();
        let vc10 = if wmax_sd > 0.0 { covar / wmax_sd } else { 0.0 };
        let s = vc10 * vc10;

        if s > wmin_var {
            return Err(MarkovError::DegenerateCovariance {
                week,
                vc10_sq: s,
                sigma_min_sq: wmin_var,
            });
        }

        let vc11 = if (wmin_var - s).abs() < 1e-12 { 0.0 } else { (wmin_var - s).sqrt() };

        let tmax = wmax_sd * z1 + tables.mu_max[week];
        let tmin = (vc10 * z1 + vc11 * z2 + tables.mu_min[week]).min(tmax);

        Ok((tmax, tmin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_tables() -> MarkovTables {
        let mut t = MarkovTables::default();
        for d in 0..366 {
            t.p_wet_given_wet[d] = 0.6;
            t.p_wet_given_dry[d] = 0.2;
            t.mu_ppt[d] = 0.5;
            t.sigma_ppt[d] = 0.2;
        }
        for w in 0..52 {
            t.mu_max[w] = 25.0;
            t.mu_min[w] = 10.0;
            t.sigma2_max[w] = 9.0;
            t.sigma2_min[w] = 4.0;
            t.sigma_max_min[w] = 3.0;
        }
        t
    }

    #[test]
    fn doy2week_stays_in_range_across_year() {
        for doy in 1..=366 {
            let w = MarkovGenerator::doy2week(doy);
            assert!(w < 52, "doy {doy} -> week {w}");
        }
        assert_eq!(MarkovGenerator::doy2week(1), 0);
        assert_eq!(MarkovGenerator::doy2week(7), 0);
        assert_eq!(MarkovGenerator::doy2week(8), 1);
    }

    #[test]
    fn wet_wet_chain_never_dries() {
        let mut tables = flat_tables();
        for d in 0..366 {
            tables.p_wet_given_wet[d] = 1.0;
            tables.p_wet_given_dry[d] = 0.0;
            tables.mu_ppt[d] = 1.0;
            tables.sigma_ppt[d] = 0.0;
        }
        let mut gen = MarkovGenerator::new(42);
        let mut rain = 1.0;
        for doy0 in 0..200 {
            let (r, _tmax, _tmin) = gen.generate_weather(&tables, doy0, rain).unwrap();
            assert!(r > 0.0, "chain dried at doy0 {doy0}");
            rain = r;
        }
    }

    #[test]
    fn tmin_never_exceeds_tmax() {
        let tables = flat_tables();
        let mut gen = MarkovGenerator::new(7);
        let mut rain = 0.0;
        for doy0 in 0..2000 {
            let (r, tmax, tmin) = gen.generate_weather(&tables, doy0 % 366, rain).unwrap();
            assert!(tmin <= tmax + 1e-9);
            rain = r;
        }
    }

    #[test]
    fn degenerate_covariance_is_fatal() {
        let mut tables = flat_tables();
        tables.sigma_max_min[0] = 100.0; // covariance far too large for the variances
        let mut gen = MarkovGenerator::new(1);
        let err = gen.draw_temperature(&tables, 0).unwrap_err();
        assert!(matches!(err, MarkovError::DegenerateCovariance { .. }));
    }

    #[test]
    fn sampled_moments_match_configuration_within_tolerance() {
        let tables = flat_tables();
        let mut gen = MarkovGenerator::new(1234);
        let n = 100_000;
        let mut sum_max = 0.0;
        let mut sum_min = 0.0;
        let mut sum_max2 = 0.0;
        let mut sum_min2 = 0.0;

        for _ in 0..n {
            let (tmax, tmin) = gen.draw_temperature(&tables, 10).unwrap();
            sum_max += tmax;
            sum_min += tmin;
            sum_max2 += tmax * tmax;
            sum_min2 += tmin * tmin;
            assert!(tmin <= tmax + 1e-9);
        }

        let n_f = n as f64;
        let mean_max = sum_max / n_f;
        let mean_min = sum_min / n_f;
        let var_max = sum_max2 / n_f - mean_max * mean_max;

        // Tmin is truncated by `min(tmax, ...)`, so only Tmax's untruncated moments are
        // checked tightly here; Tmin's mean is checked loosely for sanity.
        let se_mean_max = (tables.sigma2_max[10] / n_f).sqrt();
        assert!((mean_max - tables.mu_max[10]).abs() < 3.0 * se_mean_max, "mean_max = {mean_max}");
        assert!((var_max - tables.sigma2_max[10]).abs() < tables.sigma2_max[10] * 0.1, "var_max = {var_max}");
        assert!(mean_min < tables.mu_max[10]);
        let _ = sum_min2;
    }
}
