/// Run-wide constants, mirroring the original's `CLOCK_HZ`/`HZ` macro pair:
/// a fast "hardware" tick rate and a slower scheduling rate derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub cycles_per_second: u64,
    pub ticks_per_jiffy_second: u64,
    pub seed: u64,
    pub end_time_ms: Option<u64>,
    /// Wall-clock throttle: microseconds of real `sleep` per simulated
    /// millisecond boundary crossed. `None` means run at full speed.
    pub cycle_sleep_microseconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_second: 500_000,
            ticks_per_jiffy_second: 100,
            seed: 42,
            end_time_ms: None,
            cycle_sleep_microseconds: None,
        }
    }
}

impl Config {
    /// Ticks per jiffy: how many clock cycles make up one scheduling tick.
    pub fn ticks_per_jiffy(&self) -> u64 {
        self.cycles_per_second / self.ticks_per_jiffy_second
    }

    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ((ms as u128) * self.cycles_per_second as u128 / 1000) as u64
    }

    pub fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ((ticks as u128) * 1000 / self.cycles_per_second as u128) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ticks_per_jiffy_matches_reference_rates() {
        let config = Config::default();
        assert_eq!(config.ticks_per_jiffy(), 5000);
    }

    #[test]
    fn ms_to_ticks_round_trips_on_whole_jiffies() {
        let config = Config::default();
        let ticks = config.ms_to_ticks(100);
        assert_eq!(config.ticks_to_ms(ticks), 100);
    }
}
