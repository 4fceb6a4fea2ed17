use itertools::Itertools;

use crate::config::{Config, DatasetConfig};
use crate::dataset::Dataset;
use crate::derived::{self, Measurement};
use crate::fit::{fit, FittedLine};
use crate::{Error, Result};

/// The collector current fit `I = a + b V` and the Early voltage drawn from it
#[derive(Debug)]
pub struct OutputFit {
    pub line: FittedLine<f64>,
    pub early_voltage: Result<Measurement<f64>>,
}

/// The transposed fit `V = a + b I` and the output conductance drawn from it
#[derive(Debug)]
pub struct InverseFit {
    pub line: FittedLine<f64>,
    pub conductance: Result<Measurement<f64>>,
}

/// Everything computed from a single dataset
#[derive(Debug)]
pub struct DatasetAnalysis {
    pub dataset: Dataset<f64>,
    pub base_current: f64,
    pub output: Result<OutputFit>,
    pub inverse: Result<InverseFit>,
}

impl DatasetAnalysis {
    pub fn label(&self) -> &str {
        self.dataset.label()
    }

    pub fn line(&self) -> Option<&FittedLine<f64>> {
        self.output.as_ref().ok().map(|output| &output.line)
    }
}

/// Current gain between two neighbouring base current settings
#[derive(Debug)]
pub struct Gain {
    pub low_label: String,
    pub high_label: String,
    pub low_current: f64,
    pub high_current: f64,
    pub target_voltage: f64,
    /// Collector currents of both fits at the target voltage
    pub low_collector: Measurement<f64>,
    pub high_collector: Measurement<f64>,
    pub beta: Result<Measurement<f64>>,
}

impl Gain {
    pub fn delta_collector(&self) -> Measurement<f64> {
        Measurement {
            value: (self.high_collector.value - self.low_collector.value).abs(),
            uncertainty: self
                .low_collector
                .uncertainty
                .hypot(self.high_collector.uncertainty),
        }
    }

    pub fn delta_base(&self) -> f64 {
        self.high_current - self.low_current
    }
}

#[derive(Debug)]
pub struct Analysis {
    pub datasets: Vec<DatasetAnalysis>,
    pub gains: Vec<Gain>,
    /// Datasets that could not be read, reported but not analysed
    pub missing: Vec<Error>,
}

/// Fit one dataset and derive its per-dataset quantities
///
/// A failed fit leaves the other results of the dataset untouched, there is no I/O here.
pub fn process_dataset(
    dataset: Dataset<f64>,
    base_current: f64,
    config: &Config,
) -> DatasetAnalysis {
    let output = fit(&dataset, config.fit_domain).map(|line| OutputFit {
        early_voltage: derived::early_voltage(&line, config.early_sign),
        line,
    });
    if let Err(e) = &output {
        log::warn!("skipping the fit of {}: {e}", dataset.label());
    }

    let inverse = fit_inverse(&dataset, config).map(|line| InverseFit {
        conductance: derived::conductance(&line, config.current_scale),
        line,
    });
    if let Err(e) = &inverse {
        log::warn!("skipping the inverse fit of {}: {e}", dataset.label());
    }

    DatasetAnalysis {
        dataset,
        base_current,
        output,
        inverse,
    }
}

fn fit_inverse(dataset: &Dataset<f64>, config: &Config) -> Result<FittedLine<f64>> {
    let swapped = dataset.swap_within(&config.inverse_window());
    let domain = swapped
        .domain()
        .ok_or(Error::InsufficientPoints { found: 0 })?;
    fit(swapped.dataset(), domain)
}

/// Current gain for each pair of neighbouring base currents whose fits both succeeded
pub fn gains(datasets: &[DatasetAnalysis], target_voltage: f64) -> Vec<Gain> {
    datasets
        .iter()
        .filter(|analysis| analysis.line().is_some())
        .sorted_by(|a, b| a.base_current.total_cmp(&b.base_current))
        .tuple_windows()
        .filter_map(|(low, high)| {
            let (low_line, high_line) = (low.line()?, high.line()?);
            let beta = derived::beta(
                low_line,
                high_line,
                target_voltage,
                low.base_current,
                high.base_current,
            );
            if let Err(e) = &beta {
                log::warn!("beta between {} and {}: {e}", low.label(), high.label());
            }
            Some(Gain {
                low_label: low.label().to_owned(),
                high_label: high.label().to_owned(),
                low_current: low.base_current,
                high_current: high.base_current,
                target_voltage,
                low_collector: low_line.evaluate_with_uncertainty(target_voltage),
                high_collector: high_line.evaluate_with_uncertainty(target_voltage),
                beta,
            })
        })
        .collect()
}

/// Analyse datasets that are already in memory
pub fn analyse(loaded: Vec<(&DatasetConfig, Dataset<f64>)>, config: &Config) -> Analysis {
    let datasets: Vec<DatasetAnalysis> = loaded
        .into_iter()
        .map(|(dataset_config, dataset)| {
            process_dataset(dataset, dataset_config.base_current, config)
        })
        .collect();
    let gains = gains(&datasets, config.target_voltage);
    Analysis {
        datasets,
        gains,
        missing: vec![],
    }
}

/// Read every dataset named in `config` and analyse those that could be read
///
/// # Errors
/// Returns the first [`Error::MissingData`] if no dataset could be read at all.
pub fn run(config: &Config) -> Result<Analysis> {
    let mut loaded = vec![];
    let mut missing = vec![];
    for dataset_config in &config.datasets {
        match Dataset::from_file(&dataset_config.path, dataset_config.label.as_str()) {
            Ok(dataset) => loaded.push((dataset_config, dataset)),
            Err(e) => {
                log::error!("{e}");
                missing.push(e);
            }
        }
    }

    if loaded.is_empty() {
        return Err(missing
            .into_iter()
            .next()
            .unwrap_or_else(|| Error::InvalidConfig("no datasets listed".to_owned())));
    }

    log::info!("analysing {} datasets", loaded.len());
    let mut analysis = analyse(loaded, config);
    analysis.missing = missing;
    Ok(analysis)
}
