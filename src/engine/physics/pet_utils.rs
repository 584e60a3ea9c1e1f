// ABOUTME: Shared PET/soil-water kernel primitives - svapor, tanfunc, watrate
// ABOUTME: Library-style primitives reused by EvapDemandModel and SoilWaterEngine

/// Saturation vapor pressure of water (mm Hg) via the Clausius-Clapeyron form used by
/// Penman (1948); `temp` is deg C.
pub fn svapor(temp: f64) -> f64 {
    0.75 * (6.11_f64.ln() + 5418.38 * (1.0 / 273.15 - 1.0 / (temp + 273.15))).exp()
}

/// Shared sigmoid: `b + c * tanh(d * (x - a))`. Used by `watrate` (evaporation/
/// transpiration rate vs. soil water potential) and by the shade-factor and
/// root-conductance terms elsewhere in the engine.
pub fn tanfunc(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    b + c * (d * (x - a)).tanh()
}

/// Rate of evaporation (or transpiration) relative to PET, as a function of soil water
/// potential `swp` (-bar) and potential evapotranspiration `petday` (cm/day). The
/// steepness parameter is itself piecewise in `petday` (steeper at low demand).
pub fn watrate(swp: f64, petday: f64, shift: f64, shape: f64, inflec: f64, range: f64) -> f64 {
    let steepness = if petday < 0.2 {
        3.0
    } else if petday < 0.4 {
        (0.4 - petday) * -10.0 + 5.0
    } else if petday < 0.6 {
        (0.6 - petday) * -15.0 + 8.0
    } else {
        8.0
    };

    let x = shift - swp;
    tanfunc(x, steepness, inflec, range, shape).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svapor_at_freezing() {
        // at 0 C, svapor should be close to the textbook 4.58 mmHg
        let v = svapor(0.0);
        assert!((v - 4.58).abs() < 0.1, "svapor(0) = {v}");
    }

    #[test]
    fn tanfunc_is_bounded_by_b_plus_minus_c() {
        let y_hi = tanfunc(1e6, 0.0, 1.0, 2.0, 1.0);
        let y_lo = tanfunc(-1e6, 0.0, 1.0, 2.0, 1.0);
        assert!((y_hi - 3.0).abs() < 1e-6);
        assert!((y_lo - -1.0).abs() < 1e-6);
    }

    #[test]
    fn watrate_is_clamped_to_unit_interval() {
        let r = watrate(-100.0, 0.5, 20.0, 1.0, 0.0, 1.0);
        assert!((0.0..=1.0).contains(&r));
    }
}
