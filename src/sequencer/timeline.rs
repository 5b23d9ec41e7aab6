// Timeline - Tempo and step timing
// Converts BPM into sixteenth-note step durations and ramps tempo changes

use std::fmt;
use std::time::Duration;

/// Steps per quarter note (the sequencer grid runs on sixteenths)
pub const STEPS_PER_BEAT: f64 = 4.0;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Creates a tempo from untrusted input, clamping into the valid range
    /// Non-finite values fall back to the default tempo
    pub fn clamped(bpm: f64) -> Self {
        if !bpm.is_finite() {
            return Self::default();
        }
        Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one sequencer step (a sixteenth note) in seconds
    pub fn step_duration_seconds(&self) -> f64 {
        self.beat_duration_seconds() / STEPS_PER_BEAT
    }

    /// Duration of one sequencer step
    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(self.step_duration_seconds())
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Linear tempo ramp on a clock's timeline
///
/// Changing tempo mid-playback moves the rate from its current value to the target over
/// `ramp` seconds instead of jumping. Times are seconds on the owning clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRamp {
    from: f64,
    to: f64,
    start: f64,
    duration: f64,
}

impl TempoRamp {
    /// Constant tempo
    pub fn new(bpm: f64) -> Self {
        Self {
            from: bpm,
            to: bpm,
            start: 0.0,
            duration: 0.0,
        }
    }

    /// Start a ramp towards `bpm` beginning at clock time `now`
    pub fn ramp_to(&mut self, bpm: f64, now: f64, ramp: Duration) {
        self.from = self.bpm_at(now);
        self.to = bpm;
        self.start = now;
        self.duration = ramp.as_secs_f64();
    }

    /// Rate at clock time `t`
    pub fn bpm_at(&self, t: f64) -> f64 {
        if self.duration <= 0.0 || t >= self.start + self.duration {
            return self.to;
        }
        if t <= self.start {
            return self.from;
        }
        let progress = (t - self.start) / self.duration;
        self.from + (self.to - self.from) * progress
    }

    /// Step interval at clock time `t`
    pub fn step_interval_at(&self, t: f64) -> f64 {
        Tempo::clamped(self.bpm_at(t)).step_duration_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_creation() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
    }

    #[test]
    #[should_panic(expected = "BPM must be between 20 and 999")]
    fn test_tempo_out_of_range() {
        Tempo::new(5.0);
    }

    #[test]
    fn test_tempo_clamped() {
        assert_eq!(Tempo::clamped(5.0).bpm(), 20.0);
        assert_eq!(Tempo::clamped(5000.0).bpm(), 999.0);
        assert_eq!(Tempo::clamped(f64::NAN).bpm(), 120.0);
        assert_eq!(Tempo::clamped(90.0).bpm(), 90.0);
    }

    #[test]
    fn test_step_duration() {
        // 120 BPM: quarter = 0.5s, sixteenth = 0.125s
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.step_duration_seconds(), 0.125);
        assert_eq!(tempo.step_duration(), Duration::from_millis(125));
    }

    #[test]
    fn test_ramp_is_linear() {
        let mut ramp = TempoRamp::new(100.0);
        ramp.ramp_to(200.0, 1.0, Duration::from_millis(100));

        assert_eq!(ramp.bpm_at(0.5), 100.0);
        assert_eq!(ramp.bpm_at(1.0), 100.0);
        assert!((ramp.bpm_at(1.05) - 150.0).abs() < 1e-9);
        assert_eq!(ramp.bpm_at(1.2), 200.0);
        assert_eq!(ramp.bpm_at(10.0), 200.0);
    }

    #[test]
    fn test_ramp_restarts_from_current_rate() {
        let mut ramp = TempoRamp::new(100.0);
        ramp.ramp_to(200.0, 0.0, Duration::from_millis(100));

        // Retarget halfway through
        ramp.ramp_to(100.0, 0.05, Duration::from_millis(100));
        assert!((ramp.bpm_at(0.05) - 150.0).abs() < 1e-9);
        assert_eq!(ramp.bpm_at(0.2), 100.0);
    }

    #[test]
    fn test_zero_ramp_is_immediate() {
        let mut ramp = TempoRamp::new(120.0);
        ramp.ramp_to(60.0, 2.0, Duration::ZERO);
        assert_eq!(ramp.bpm_at(2.0), 60.0);
        assert_eq!(ramp.step_interval_at(2.0), 0.25);
    }
}
