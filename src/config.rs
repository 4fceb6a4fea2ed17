use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataset::Domain;
use crate::derived::EarlySign;
use crate::{Error, Result};

/// One measured output characteristic
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Legend and report label, for example `Ib = 50 uA`
    pub label: String,
    pub path: PathBuf,
    /// Base current in mA, the unit of the collector current column
    pub base_current: f64,
}

/// Layout of the exported chart
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotConfig {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Axis ranges, fitted to the data when absent
    pub x_range: Option<Domain<f64>>,
    pub y_range: Option<Domain<f64>>,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            title: "BJT output characteristics".to_owned(),
            x_label: "V_CE [V]".to_owned(),
            y_label: "I_C [mA]".to_owned(),
            x_range: None,
            y_range: None,
            width: 800,
            height: 600,
        }
    }
}

/// A complete analysis run
///
/// Every variant of the measurement (file names, fit ranges, sign conventions, whether the fits
/// are drawn) is a value of this struct rather than a separate pipeline.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub datasets: Vec<DatasetConfig>,
    /// Active region on the voltage axis
    pub fit_domain: Domain<f64>,
    /// Collector-emitter voltage at which beta is evaluated
    pub target_voltage: f64,
    #[serde(default)]
    pub early_sign: EarlySign,
    /// Voltage window of the `V = a + b I` fit, the fit domain when absent
    #[serde(default)]
    pub inverse_window: Option<Domain<f64>>,
    /// Converts the current unit of the data to amperes
    #[serde(default = "default_current_scale")]
    pub current_scale: f64,
    #[serde(default = "default_draw_fits")]
    pub draw_fits: bool,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// CSV file receiving one row of fit results per dataset
    #[serde(default)]
    pub summary: Option<PathBuf>,
    #[serde(default)]
    pub plot: PlotConfig,
}

const fn default_current_scale() -> f64 {
    1e-3
}

const fn default_draw_fits() -> bool {
    true
}

fn default_output() -> PathBuf {
    PathBuf::from("fit.svg")
}

impl Default for Config {
    fn default() -> Self {
        let dataset = |label: &str, path: &str, base_current| DatasetConfig {
            label: label.to_owned(),
            path: PathBuf::from(path),
            base_current,
        };
        Self {
            datasets: vec![
                dataset("Ib = 50 uA", "data/50.txt", 0.05),
                dataset("Ib = 100 uA", "data/100.txt", 0.1),
            ],
            fit_domain: Domain::new(1.0, 3.5),
            target_voltage: 3.0,
            early_sign: EarlySign::Negative,
            inverse_window: None,
            current_scale: default_current_scale(),
            draw_fits: default_draw_fits(),
            output: default_output(),
            summary: None,
            plot: PlotConfig {
                x_range: Some(Domain::new(0.0, 4.5)),
                y_range: Some(Domain::new(0.0, 22.0)),
                ..PlotConfig::default()
            },
        }
    }
}

impl Config {
    /// Read and validate a TOML analysis description
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML for a [`Config`] or fails
    /// [`Config::validate`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        log::info!(
            "loaded configuration with {} datasets from {}",
            config.datasets.len(),
            path.display()
        );
        Ok(config)
    }

    /// # Errors
    /// [`Error::InvalidConfig`] describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(Error::InvalidConfig("no datasets listed".to_owned()));
        }
        if !(self.current_scale.is_finite() && self.current_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "current scale must be positive, got {}",
                self.current_scale
            )));
        }
        for (axis, range) in [("x", self.plot.x_range), ("y", self.plot.y_range)] {
            if let Some(range) = range {
                if !(range.min < range.max) {
                    return Err(Error::InvalidConfig(format!(
                        "empty {axis} range [{}, {}]",
                        range.min, range.max
                    )));
                }
            }
        }
        Ok(())
    }

    /// The voltage window of the inverse fit
    pub fn inverse_window(&self) -> Domain<f64> {
        self.inverse_window.unwrap_or(self.fit_domain)
    }
}
