//! Resource utilization models of jobs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

use dyn_clone::{clone_trait_object, DynClone};
use rand::prelude::*;
use rand_pcg::Pcg64;
use sugars::boxed;

use crate::config::options::{parse_config_value, parse_options, required_option};
use crate::error::SchedulingError;

/// A utilization model is a function which defines the fraction of a resource (from 0 to 1) used by a job at the
/// specified simulated time.
pub trait UtilizationModel: DynClone {
    fn utilization(&self, time: f64) -> f64;
}

clone_trait_object!(UtilizationModel);

/// Job always uses the whole resource.
#[derive(Clone, Default)]
pub struct FullUtilizationModel;

impl UtilizationModel for FullUtilizationModel {
    fn utilization(&self, _time: f64) -> f64 {
        1.
    }
}

/// Job does not use the resource.
#[derive(Clone, Default)]
pub struct NullUtilizationModel;

impl UtilizationModel for NullUtilizationModel {
    fn utilization(&self, _time: f64) -> f64 {
        0.
    }
}

/// Constant fraction of the resource.
#[derive(Clone)]
pub struct ConstantUtilizationModel {
    value: f64,
}

impl ConstantUtilizationModel {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl UtilizationModel for ConstantUtilizationModel {
    fn utilization(&self, _time: f64) -> f64 {
        self.value
    }
}

/// Uniformly random utilization.
///
/// The value for each distinct time is drawn once and remembered, so repeated queries within one tick agree.
#[derive(Clone)]
pub struct StochasticUtilizationModel {
    rand: RefCell<Pcg64>,
    history: RefCell<HashMap<u64, f64>>,
}

impl StochasticUtilizationModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rand: RefCell::new(Pcg64::seed_from_u64(seed)),
            history: RefCell::new(HashMap::new()),
        }
    }
}

impl UtilizationModel for StochasticUtilizationModel {
    fn utilization(&self, time: f64) -> f64 {
        *self
            .history
            .borrow_mut()
            .entry(time.to_bits())
            .or_insert_with(|| self.rand.borrow_mut().gen::<f64>())
    }
}

/// Utilization trace sampled with a fixed interval, values between samples are linearly interpolated.
#[derive(Clone)]
pub struct TraceUtilizationModel {
    interval: f64,
    data: Vec<f64>,
}

impl TraceUtilizationModel {
    /// Creates model from utilization fractions. Sampling interval must be positive.
    pub fn new(interval: f64, data: Vec<f64>) -> Result<Self, SchedulingError> {
        if !interval.is_finite() || interval <= 0. {
            return Err(SchedulingError::Config(format!(
                "bad utilization trace interval: {}",
                interval
            )));
        }
        Ok(Self { interval, data })
    }

    /// Creates model from utilization percentages (0-100).
    pub fn from_percentages(interval: f64, data: &[f64]) -> Result<Self, SchedulingError> {
        Self::new(interval, data.iter().map(|value| value / 100.).collect())
    }

    /// Reads percentages from a text file with one value per line.
    pub fn from_file(path: &str, interval: f64) -> Result<Self, SchedulingError> {
        let content =
            fs::read_to_string(path).map_err(|e| SchedulingError::Config(format!("can't read {}: {}", path, e)))?;
        let mut data = Vec::new();
        for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let value: f64 = line
                .parse()
                .map_err(|_| SchedulingError::Config(format!("bad utilization value '{}' in {}", line, path)))?;
            data.push(value);
        }
        Self::from_percentages(interval, &data)
    }
}

impl UtilizationModel for TraceUtilizationModel {
    fn utilization(&self, time: f64) -> f64 {
        if self.data.is_empty() {
            return 0.;
        }
        let position = (time / self.interval).max(0.);
        let idx = position.floor() as usize;
        if idx + 1 >= self.data.len() {
            return self.data[self.data.len() - 1];
        }
        let fraction = position - idx as f64;
        self.data[idx] + (self.data[idx + 1] - self.data[idx]) * fraction
    }
}

/// Creates utilization model from config value string.
///
/// Supported values: `Full`, `Null`, `Constant[value=0.5]`, `Stochastic[seed=1]`,
/// `Trace[path=trace.txt,interval=300]`.
pub fn utilization_model_resolver(config_str: &str) -> Result<Box<dyn UtilizationModel>, SchedulingError> {
    let (name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    match name.as_str() {
        "Full" => Ok(boxed!(FullUtilizationModel)),
        "Null" => Ok(boxed!(NullUtilizationModel)),
        "Constant" => Ok(boxed!(ConstantUtilizationModel::new(required_option(&options, "value")?))),
        "Stochastic" => Ok(boxed!(StochasticUtilizationModel::new(
            options.get("seed").and_then(|seed| seed.parse().ok()).unwrap_or(0)
        ))),
        "Trace" => {
            let path: String = required_option(&options, "path")?;
            let interval = match options.get("interval") {
                Some(interval) => interval
                    .parse::<f64>()
                    .map_err(|_| SchedulingError::Config(format!("bad trace interval: {}", interval)))?,
                None => 300.,
            };
            Ok(boxed!(TraceUtilizationModel::from_file(&path, interval)?))
        }
        _ => Err(SchedulingError::Config(format!(
            "can't resolve utilization model: {}",
            config_str
        ))),
    }
}
