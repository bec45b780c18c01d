use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Per-actuator velocity filter.
///
/// The decoder feeds every raw velocity sample through `input` and stores
/// whatever `output` returns.
pub trait VelocityFilter: Send {
    fn input(&mut self, sample: f64);
    fn output(&self) -> f64;
}

/// Stores the raw sample unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough {
    last: f64,
}

impl VelocityFilter for PassThrough {
    fn input(&mut self, sample: f64) {
        self.last = sample;
    }

    fn output(&self) -> f64 {
        self.last
    }
}

/// Second-order Butterworth low-pass at a fixed sample rate.
///
/// Bilinear-transform form from J. O. Smith, "Introduction to Digital
/// Filters", with `c = 1 / tan(pi * fc / fs)`. History starts at zero, so the
/// first few outputs ramp up towards the input.
#[derive(Debug, Clone, Copy)]
pub struct ButterworthLowPass {
    c: f64,
    inputs: [f64; 3],
    outputs: [f64; 3],
}

impl ButterworthLowPass {
    /// `cutoff_hz` must lie strictly between zero and the Nyquist frequency.
    pub fn new(cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(CoreError::InvalidFilter(format!(
                "sample rate must be positive, got {sample_rate_hz}"
            )));
        }
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < sample_rate_hz / 2.0) {
            return Err(CoreError::InvalidFilter(format!(
                "cutoff {cutoff_hz} Hz must be in (0, {}) Hz",
                sample_rate_hz / 2.0
            )));
        }
        Ok(Self {
            c: 1.0 / (PI * cutoff_hz / sample_rate_hz).tan(),
            inputs: [0.0; 3],
            outputs: [0.0; 3],
        })
    }
}

impl VelocityFilter for ButterworthLowPass {
    fn input(&mut self, sample: f64) {
        let c = self.c;
        self.inputs = [sample, self.inputs[0], self.inputs[1]];
        let [x0, x1, x2] = self.inputs;
        let (y1, y2) = (self.outputs[0], self.outputs[1]);
        let y0 = (x2 + 2.0 * x1 + x0
            - (c * c - SQRT_2 * c + 1.0) * y2
            - (-2.0 * c * c + 2.0) * y1)
            / (1.0 + c * c + SQRT_2 * c);
        self.outputs = [y0, y1, y2];
    }

    fn output(&self) -> f64 {
        self.outputs[0]
    }
}

/// Filter selection in a bus configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    #[default]
    PassThrough,
    Butterworth {
        cutoff_hz: f64,
        sample_rate_hz: f64,
    },
}

impl FilterSpec {
    /// Build a fresh filter instance.
    pub fn build(&self) -> Result<Box<dyn VelocityFilter>> {
        match *self {
            FilterSpec::PassThrough => Ok(Box::new(PassThrough::default())),
            FilterSpec::Butterworth {
                cutoff_hz,
                sample_rate_hz,
            } => Ok(Box::new(ButterworthLowPass::new(cutoff_hz, sample_rate_hz)?)),
        }
    }
}
