use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use itertools::{Itertools, MinMaxResult};
use num_traits::Float;
use serde::Deserialize;

use crate::{Error, Result};

/// A closed interval `[min, max]` on the primary coordinate
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Domain<E> {
    pub min: E,
    pub max: E,
}

impl<E: Float> Domain<E> {
    pub const fn new(min: E, max: E) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. An inverted domain contains nothing.
    pub fn contains(&self, x: E) -> bool {
        self.min <= x && x <= self.max
    }

}

/// A single tabulated measurement with its errors
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point<E> {
    pub x: E,
    pub y: E,
    pub sigma_x: E,
    pub sigma_y: E,
}

impl<E: Float> Point<E> {
    /// Errors are stored as magnitudes
    pub fn new(x: E, y: E, sigma_x: E, sigma_y: E) -> Self {
        Self {
            x,
            y,
            sigma_x: sigma_x.abs(),
            sigma_y: sigma_y.abs(),
        }
    }

    /// The same measurement with abscissa and ordinate exchanged, errors included
    #[must_use]
    pub const fn transposed(&self) -> Self {
        Self {
            x: self.y,
            y: self.x,
            sigma_x: self.sigma_y,
            sigma_y: self.sigma_x,
        }
    }
}

/// An ordered set of measurements sharing a label, usually the base current setting
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset<E> {
    label: String,
    points: Vec<Point<E>>,
}

impl<E: Float> Dataset<E> {
    pub fn new(label: impl Into<String>, points: Vec<Point<E>>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[Point<E>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest and largest abscissa, `None` for an empty dataset
    pub fn extent(&self) -> Option<Domain<E>> {
        match self.points.iter().map(|point| point.x).minmax_by(|a, b| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        }) {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(x) => Some(Domain::new(x, x)),
            MinMaxResult::MinMax(min, max) => Some(Domain::new(min, max)),
        }
    }

    /// The points whose abscissa falls in `domain`, in their original order
    #[must_use]
    pub fn within(&self, domain: &Domain<E>) -> Self {
        Self {
            label: self.label.clone(),
            points: self
                .points
                .iter()
                .filter(|point| domain.contains(point.x))
                .copied()
                .collect(),
        }
    }

    /// Every point with its coordinates and errors exchanged
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            label: self.label.clone(),
            points: self.points.iter().map(Point::transposed).collect(),
        }
    }

    /// Select the points in `window` and exchange their coordinates, so the ordinate can be
    /// fit as a function of the former ordinate.
    pub fn swap_within(&self, window: &Domain<E>) -> Swapped<E> {
        let dataset = self.within(window).swapped();
        let domain = dataset.extent();
        Swapped { dataset, domain }
    }
}

impl<E: Float + FromStr> Dataset<E> {
    /// Read a whitespace separated table of `x y sigma_x sigma_y` records
    ///
    /// # Errors
    /// Returns [`Error::MissingData`] if the file cannot be read or contains no valid record.
    pub fn from_file(path: &Path, label: impl Into<String>) -> Result<Self> {
        let missing = |reason: String| Error::MissingData {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| missing(e.to_string()))?;
        let dataset =
            Self::from_reader(BufReader::new(file), label).map_err(|e| missing(e.to_string()))?;
        if dataset.is_empty() {
            return Err(missing("no valid records".to_owned()));
        }
        log::info!("read {} points from {}", dataset.len(), path.display());
        Ok(dataset)
    }

    /// Parse records from any reader. Comment lines (`#` or `//`), blank lines and lines
    /// without four finite numeric columns are skipped.
    ///
    /// # Errors
    /// Only if reading from `reader` fails.
    pub fn from_reader<R: BufRead>(reader: R, label: impl Into<String>) -> Result<Self> {
        let mut points = vec![];
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let record = line.trim();
            if record.is_empty() || record.starts_with('#') || record.starts_with("//") {
                continue;
            }
            match parse_record(record) {
                Some(point) => points.push(point),
                None => log::debug!("skipping malformed line {}: {record:?}", number + 1),
            }
        }
        Ok(Self::new(label, points))
    }
}

fn parse_record<E: Float + FromStr>(record: &str) -> Option<Point<E>> {
    let values = record
        .split_whitespace()
        .take(4)
        .map(str::parse)
        .collect::<std::result::Result<Vec<E>, _>>()
        .ok()?;
    if !values.iter().all(|value| value.is_finite()) {
        return None;
    }
    match values[..] {
        [x, y, sigma_x, sigma_y] => Some(Point::new(x, y, sigma_x, sigma_y)),
        _ => None,
    }
}

/// The outcome of [`Dataset::swap_within`]
#[derive(Clone, Debug)]
pub struct Swapped<E> {
    dataset: Dataset<E>,
    domain: Option<Domain<E>>,
}

impl<E: Copy> Swapped<E> {
    pub const fn dataset(&self) -> &Dataset<E> {
        &self.dataset
    }

    /// Range spanned by the new primary coordinate, `None` when the window selected nothing
    pub const fn domain(&self) -> Option<Domain<E>> {
        self.domain
    }

    pub fn len(&self) -> usize {
        self.dataset.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.points.is_empty()
    }
}
