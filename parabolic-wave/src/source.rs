use std::f64::consts::PI;

/// Morlet frequency parameter.
pub const MORLET_SIGMA: f64 = 6.0;
/// Half-width of the emitted pulse in units of the source period.
pub const PULSE_HALF_WIDTH: f64 = 4.0;
/// Gain applied to the configured amplitude before injection.
pub const SOURCE_GAIN: f64 = 15.0;

/// Real Morlet wavelet `c_s pi^(-1/4) e^(-t^2/2) (cos(s t) - k_s)` with `s = 6`.
pub fn morlet(scaled_time: f64) -> f64 {
    let sigma = MORLET_SIGMA;
    // Admissibility correction and normalisation
    let kappa = (-0.5 * sigma * sigma).exp();
    let c_sigma =
        (1.0 + (-sigma * sigma).exp() - 2.0 * (-0.75 * sigma * sigma).exp()).powf(-0.5);
    let gaussian = (-0.5 * scaled_time * scaled_time).exp();
    c_sigma * PI.powf(-0.25) * gaussian * ((sigma * scaled_time).cos() - kappa)
}

/// Point excitation at the shared focus.
///
/// The pulse is centred three periods after `t = 0` and cut off outside
/// `PULSE_HALF_WIDTH` periods of its centre, so it fires once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorletSource {
    pub frequency: f64, // Hz
    pub amplitude: f64,
}

impl MorletSource {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }

    pub fn period(&self) -> f64 {
        1.0 / self.frequency
    }

    pub fn pulse_center(&self) -> f64 {
        3.0 * self.period()
    }

    /// Simulation time mapped to wavelet time.
    pub fn scaled_time(&self, t: f64) -> f64 {
        (t - self.pulse_center()) / self.period()
    }

    /// Value injected at the focus cell at simulation time `t`.
    pub fn amplitude_at(&self, t: f64) -> f64 {
        let scaled = self.scaled_time(t);
        if scaled.abs() > PULSE_HALF_WIDTH {
            return 0.0;
        }
        self.amplitude * SOURCE_GAIN * morlet(scaled)
    }

    /// Largest magnitude the source can inject.
    pub fn peak(&self) -> f64 {
        (self.amplitude * SOURCE_GAIN * morlet(0.0)).abs()
    }
}
