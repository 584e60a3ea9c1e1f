// ABOUTME: Observer hook for per-day diagnostic scalars - no-op unless a caller installs one
// ABOUTME: Sits alongside the physics modules as a pluggable monitoring layer, not inside them

/// Receives named scalars for one simulated day, one physics component at a time. The
/// default no-op lets `run_day` call it unconditionally with no cost when nobody is
/// listening.
pub trait Observer {
    fn on_day(&mut self, day: u32, component: &str, scalars: &[(&str, f64)]);
}

/// The default observer: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_day(&mut self, _day: u32, _component: &str, _scalars: &[(&str, f64)]) {}
}

/// Collects every call verbatim, for tests and `pedoflux run --trace`.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub records: Vec<(u32, String, Vec<(String, f64)>)>,
}

impl Observer for RecordingObserver {
    fn on_day(&mut self, day: u32, component: &str, scalars: &[(&str, f64)]) {
        self.records.push((
            day,
            component.to_string(),
            scalars.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_observer_accepts_any_call() {
        let mut obs = NullObserver;
        obs.on_day(1, "water", &[("aet_cm", 0.2)]);
    }

    #[test]
    fn recording_observer_keeps_every_call_in_order() {
        let mut obs = RecordingObserver::default();
        obs.on_day(1, "water", &[("aet_cm", 0.2)]);
        obs.on_day(2, "temperature", &[("surface_c", 12.5)]);
        assert_eq!(obs.records.len(), 2);
        assert_eq!(obs.records[0].0, 1);
        assert_eq!(obs.records[1].1, "temperature");
    }
}
