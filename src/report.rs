use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::analysis::{Analysis, DatasetAnalysis, Gain};
use crate::derived::{Measurement, Quantity};
use crate::fit::FittedLine;
use crate::Result;

fn parameter_lines(
    out: &mut impl Write,
    label: &str,
    line: &FittedLine<f64>,
    units: [&'static str; 2],
) -> io::Result<()> {
    let [a, b] = line.parameters();
    match line.standard_errors() {
        Some([sigma_a, sigma_b]) => {
            let a = Measurement {
                value: a,
                uncertainty: sigma_a,
            };
            let b = Measurement {
                value: b,
                uncertainty: sigma_b,
            };
            writeln!(out, "{}", Quantity::new(format!("a ({label})"), a, units[0]))?;
            writeln!(out, "{}", Quantity::new(format!("b ({label})"), b, units[1]))?;
        }
        None => {
            writeln!(out, "a ({label}): {a} {} (exact fit, error undefined)", units[0])?;
            writeln!(out, "b ({label}): {b} {} (exact fit, error undefined)", units[1])?;
        }
    }
    match line.reduced_chi_square() {
        Some(reduced) => writeln!(
            out,
            "chi2/ndf ({label}): {} / {} = {reduced}",
            line.chi_square(),
            line.degrees_of_freedom()
        ),
        None => writeln!(
            out,
            "chi2/ndf ({label}): {} / 0, no degrees of freedom",
            line.chi_square()
        ),
    }
}

fn quantity_line(
    out: &mut impl Write,
    name: String,
    quantity: &Result<Measurement<f64>>,
    unit: &'static str,
) -> io::Result<()> {
    match quantity {
        Ok(measurement) => writeln!(out, "{}", Quantity::new(name, *measurement, unit)),
        Err(e) => writeln!(out, "{name}: {e}"),
    }
}

fn dataset_block(out: &mut impl Write, analysis: &DatasetAnalysis) -> io::Result<()> {
    let label = analysis.label();
    match &analysis.output {
        Ok(output) => {
            let domain = output.line.domain();
            writeln!(
                out,
                "\n--- Fit {label}: I_C = a + b V_CE over [{}, {}] V ---",
                domain.min, domain.max
            )?;
            parameter_lines(out, label, &output.line, ["mA", "mA/V"])?;
            quantity_line(out, format!("V_A ({label})"), &output.early_voltage, "V")?;
        }
        Err(e) => writeln!(out, "\n--- Fit {label} skipped: {e} ---")?,
    }
    match &analysis.inverse {
        Ok(inverse) => {
            let domain = inverse.line.domain();
            writeln!(
                out,
                "\n--- Inverse fit {label}: V_CE = a + b I_C over [{}, {}] mA ---",
                domain.min, domain.max
            )?;
            parameter_lines(out, label, &inverse.line, ["V", "V/mA"])?;
            quantity_line(out, format!("g_o ({label})"), &inverse.conductance, "S")?;
        }
        Err(e) => writeln!(out, "\n--- Inverse fit {label} skipped: {e} ---")?,
    }
    Ok(())
}

fn gain_block(out: &mut impl Write, gain: &Gain) -> io::Result<()> {
    writeln!(
        out,
        "\n=== beta between {} and {} at V_CE = {} V ===",
        gain.low_label, gain.high_label, gain.target_voltage
    )?;
    let collector = |label: &str, measurement| {
        Quantity::new(format!("I_C (fit, {label})"), measurement, "mA")
    };
    writeln!(out, "{}", collector(&gain.high_label, gain.high_collector))?;
    writeln!(out, "{}", collector(&gain.low_label, gain.low_collector))?;
    writeln!(
        out,
        "{}",
        Quantity::new("Delta I_C", gain.delta_collector(), "mA")
    )?;
    writeln!(
        out,
        "{}",
        Quantity::new("Delta I_B", Measurement::exact(gain.delta_base()), "mA")
    )?;
    quantity_line(
        out,
        format!("beta ({} -> {})", gain.low_label, gain.high_label),
        &gain.beta,
        "",
    )
}

/// Write the human readable report, one quantity per line
///
/// # Errors
/// Only if writing to `out` fails.
pub fn write_report(out: &mut impl Write, analysis: &Analysis) -> io::Result<()> {
    for missing in &analysis.missing {
        writeln!(out, "Error: {missing}")?;
    }
    for dataset in &analysis.datasets {
        dataset_block(out, dataset)?;
    }
    for gain in &analysis.gains {
        gain_block(out, gain)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    label: &'a str,
    base_current: f64,
    points: usize,
    a: Option<f64>,
    sigma_a: Option<f64>,
    b: Option<f64>,
    sigma_b: Option<f64>,
    chi_square: Option<f64>,
    ndf: Option<usize>,
    early_voltage: Option<f64>,
    sigma_early_voltage: Option<f64>,
    conductance: Option<f64>,
    sigma_conductance: Option<f64>,
}

impl<'a> From<&'a DatasetAnalysis> for SummaryRow<'a> {
    fn from(analysis: &'a DatasetAnalysis) -> Self {
        let output = analysis.output.as_ref().ok();
        let line = output.map(|output| &output.line);
        let errors = line.and_then(FittedLine::standard_errors);
        let early = output.and_then(|output| output.early_voltage.as_ref().ok());
        let conductance = analysis
            .inverse
            .as_ref()
            .ok()
            .and_then(|inverse| inverse.conductance.as_ref().ok());
        Self {
            label: analysis.label(),
            base_current: analysis.base_current,
            points: analysis.dataset.len(),
            a: line.map(FittedLine::intercept),
            sigma_a: errors.map(|[sigma_a, _]| sigma_a),
            b: line.map(FittedLine::slope),
            sigma_b: errors.map(|[_, sigma_b]| sigma_b),
            chi_square: line.map(FittedLine::chi_square),
            ndf: line.map(FittedLine::degrees_of_freedom),
            early_voltage: early.map(|m| m.value),
            sigma_early_voltage: early.map(|m| m.uncertainty),
            conductance: conductance.map(|m| m.value),
            sigma_conductance: conductance.map(|m| m.uncertainty),
        }
    }
}

/// Write one CSV row of fit results per dataset, empty cells where a fit failed or where a
/// two point fit leaves the parameter errors undefined
///
/// # Errors
/// Returns an error if `path` cannot be created or written.
pub fn write_summary(path: &Path, analysis: &Analysis) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for dataset in &analysis.datasets {
        wtr.serialize(SummaryRow::from(dataset))?;
    }
    wtr.flush()?;
    log::info!("wrote fit summary to {}", path.display());
    Ok(())
}
