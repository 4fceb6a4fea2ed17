use std::fs;
use std::path::{Path, PathBuf};

use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::Normal;
use rand_isaac::Isaac64Rng;
use tempdir::TempDir;

use bjt_fit::analysis;
use bjt_fit::config::Config;
use bjt_fit::Error;
use bjt_fit::Result;

const EARLY_VOLTAGE: f64 = 60.0;
const SIGMA_V: f64 = 0.01;
const SIGMA_I: f64 = 0.02;

/// Collector current in mA for base current `ib` in mA, `I_C = 100 ib (1 + V / V_A)` in the
/// active region and rising linearly from zero below 0.5 V
fn collector_current(v: f64, ib: f64) -> f64 {
    let active = 100.0 * ib * (1.0 + v / EARLY_VOLTAGE);
    if v < 0.5 {
        active * v / 0.5
    } else {
        active
    }
}

fn write_characteristic<R: Rng>(path: &Path, ib: f64, rng: &mut R) -> Result<()> {
    let noise = Normal::new(0.0, SIGMA_I).unwrap();
    let mut table = String::from("# Vce Ic errVce errIc\n");
    for n in 0..=45_i32 {
        let v = f64::from(n) / 10.0;
        let current = collector_current(v, ib) + rng.sample(noise);
        table.push_str(&format!("{v} {current} {SIGMA_V} {SIGMA_I}\n"));
    }
    fs::write(path, table)?;
    Ok(())
}

fn write_config(dir: &Path, datasets: &[(&str, PathBuf, f64)], extra: &str) -> Result<PathBuf> {
    let mut config = format!(
        "target_voltage = 3.0\noutput = {:?}\nsummary = {:?}\n{extra}\n",
        dir.join("fit.svg").to_string_lossy(),
        dir.join("fit_summary.csv").to_string_lossy(),
    );
    config.push_str("\n[fit_domain]\nmin = 1.0\nmax = 3.5\n");
    for (label, path, base_current) in datasets {
        config.push_str(&format!(
            "\n[[datasets]]\nlabel = {label:?}\npath = {:?}\nbase_current = {base_current}\n",
            path.to_string_lossy()
        ));
    }
    let path = dir.join("analysis.toml");
    fs::write(&path, config)?;
    Ok(path)
}

#[test]
fn beta_and_early_voltage_are_recovered_from_noisy_characteristics() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);

    let tmp_dir = TempDir::new("beta_and_early_voltage_are_recovered")?;
    let low = tmp_dir.path().join("50.txt");
    let high = tmp_dir.path().join("100.txt");
    write_characteristic(&low, 0.05, &mut rng)?;
    write_characteristic(&high, 0.1, &mut rng)?;

    let config_path = write_config(
        tmp_dir.path(),
        &[("Ib = 50 uA", low, 0.05), ("Ib = 100 uA", high, 0.1)],
        "",
    )?;
    let config = Config::from_file(&config_path)?;
    let analysis = analysis::run(&config)?;

    assert!(analysis.missing.is_empty());
    assert_eq!(analysis.datasets.len(), 2);
    for dataset in &analysis.datasets {
        let output = dataset.output.as_ref().unwrap();
        // 1.0, 1.1, ..., 3.5 V
        assert_eq!(output.line.num_points(), 26);
        let early = output.early_voltage.as_ref().unwrap();
        assert!((early.value + EARLY_VOLTAGE).abs() < 5.0 * early.uncertainty);
        assert!(dataset.inverse.as_ref().unwrap().conductance.is_ok());
    }

    assert_eq!(analysis.gains.len(), 1);
    let beta = analysis.gains[0].beta.as_ref().unwrap();
    let expected = 100.0 * (1.0 + 3.0 / EARLY_VOLTAGE);
    assert!((beta.value - expected).abs() < 5.0 * beta.uncertainty);

    bjt_fit::report::write_summary(config.summary.as_ref().unwrap(), &analysis)?;
    bjt_fit::plot::render(&analysis.datasets, &config)?;
    assert!(config.output.exists());
    assert_eq!(fs::read_to_string(config.summary.unwrap())?.lines().count(), 3);

    Ok(())
}

#[test]
fn an_unreadable_dataset_is_reported_and_the_rest_analysed() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);

    let tmp_dir = TempDir::new("an_unreadable_dataset_is_reported")?;
    let present = tmp_dir.path().join("100.txt");
    write_characteristic(&present, 0.1, &mut rng)?;
    let empty = tmp_dir.path().join("200.txt");
    fs::write(&empty, "# no measurements yet\n")?;

    let config_path = write_config(
        tmp_dir.path(),
        &[
            ("Ib = 50 uA", tmp_dir.path().join("50.txt"), 0.05),
            ("Ib = 100 uA", present, 0.1),
            ("Ib = 200 uA", empty, 0.2),
        ],
        "early_sign = \"positive\"",
    )?;
    let analysis = analysis::run(&Config::from_file(&config_path)?)?;

    assert_eq!(analysis.missing.len(), 2);
    assert!(analysis
        .missing
        .iter()
        .all(|e| matches!(e, Error::MissingData { .. })));
    assert_eq!(analysis.datasets.len(), 1);
    assert!(analysis.gains.is_empty());

    let early = analysis.datasets[0]
        .output
        .as_ref()
        .unwrap()
        .early_voltage
        .as_ref()
        .unwrap();
    assert!(early.value > 0.0);

    Ok(())
}

#[test]
fn the_run_aborts_when_no_dataset_can_be_read() -> Result<()> {
    let tmp_dir = TempDir::new("the_run_aborts_when_no_dataset_can_be_read")?;
    let config_path = write_config(
        tmp_dir.path(),
        &[("Ib = 50 uA", tmp_dir.path().join("50.txt"), 0.05)],
        "",
    )?;

    let result = analysis::run(&Config::from_file(&config_path)?);

    assert!(matches!(result, Err(Error::MissingData { .. })));
    Ok(())
}

#[test]
fn the_default_run_reads_the_two_base_currents() {
    let config = Config::default();
    let paths: Vec<_> = config.datasets.iter().map(|d| d.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("data/50.txt"), PathBuf::from("data/100.txt")]
    );
}

#[test]
fn the_shipped_configurations_are_valid() -> Result<()> {
    let configs = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");
    for entry in fs::read_dir(configs)? {
        let config = Config::from_file(&entry?.path())?;
        assert!(config.datasets.len() >= 2);
    }
    Ok(())
}
