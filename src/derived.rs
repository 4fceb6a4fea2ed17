use std::fmt;

use num_traits::Float;
use serde::Deserialize;

use crate::fit::FittedLine;
use crate::{Error, Result};

/// A value with its one standard deviation uncertainty
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement<E> {
    pub value: E,
    pub uncertainty: E,
}

impl<E: Float> Measurement<E> {
    pub fn exact(value: E) -> Self {
        Self {
            value,
            uncertainty: E::zero(),
        }
    }

    fn finite(self, quantity: &'static str) -> Result<Self> {
        if self.value.is_finite() && self.uncertainty.is_finite() {
            Ok(self)
        } else {
            Err(Error::NonFinite { quantity })
        }
    }
}

/// A named, printable [`Measurement`]
#[derive(Clone, Debug)]
pub struct Quantity {
    pub name: String,
    pub measurement: Measurement<f64>,
    pub unit: &'static str,
}

impl Quantity {
    pub fn new(name: impl Into<String>, measurement: Measurement<f64>, unit: &'static str) -> Self {
        Self {
            name: name.into(),
            measurement,
            unit,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} +/- {}",
            self.name, self.measurement.value, self.measurement.uncertainty
        )?;
        if !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}

/// Sign convention of the Early voltage extrapolated from `I = a + b V`
///
/// The intercept of the line with the voltage axis sits at `-a / b`. Setups that record
/// voltage magnitudes report it as a positive number instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlySign {
    /// `V_A = -a / b`
    #[default]
    Negative,
    /// `V_A = a / b`
    Positive,
}

/// Current gain between two base current settings at collector-emitter voltage `v_target`
///
/// Both lines are evaluated at `v_target`, beta is `|I_high - I_low| / (i_high - i_low)`. The
/// base currents are exact, the uncertainty comes from the two line evaluations.
///
/// # Errors
/// - [`Error::DivisionByZero`] if the base currents are equal
/// - [`Error::NonFinite`] if the gain overflows
pub fn beta<E: Float>(
    low: &FittedLine<E>,
    high: &FittedLine<E>,
    v_target: E,
    i_low: E,
    i_high: E,
) -> Result<Measurement<E>> {
    let delta_i = i_high - i_low;
    if delta_i == E::zero() {
        return Err(Error::division_by_zero("beta", "the base currents are equal"));
    }

    let low = low.evaluate_with_uncertainty(v_target);
    let high = high.evaluate_with_uncertainty(v_target);

    Measurement {
        value: (high.value - low.value).abs() / delta_i,
        uncertainty: low.uncertainty.hypot(high.uncertainty) / delta_i.abs(),
    }
    .finite("beta")
}

/// Early voltage from the collector current fit `I = a + b V`
///
/// The uncertainty adds the relative errors of `a` and `b` in quadrature and ignores their
/// correlation.
///
/// # Errors
/// - [`Error::DivisionByZero`] if `a`, `b` or the uncertainty of `b` vanish
/// - [`Error::NonFinite`] if the ratio overflows
pub fn early_voltage<E: Float>(line: &FittedLine<E>, sign: EarlySign) -> Result<Measurement<E>> {
    const QUANTITY: &str = "Early voltage";

    let (a, b) = (line.intercept(), line.slope());
    let (sigma_a, sigma_b) = (line.sigma_intercept(), line.sigma_slope());
    if a == E::zero() {
        return Err(Error::division_by_zero(QUANTITY, "the intercept is zero"));
    }
    if b == E::zero() {
        return Err(Error::division_by_zero(QUANTITY, "the slope is zero"));
    }
    if sigma_b == E::zero() {
        return Err(Error::division_by_zero(QUANTITY, "the slope has no uncertainty"));
    }

    let value = match sign {
        EarlySign::Negative => -a / b,
        EarlySign::Positive => a / b,
    };
    Measurement {
        value,
        uncertainty: value.abs() * (sigma_a / a).hypot(sigma_b / b),
    }
    .finite(QUANTITY)
}

/// Reciprocal slope of a fit, converted by `scale`
///
/// For a fit of voltage against current in mA, `scale = 1e-3` yields the output conductance in
/// siemens.
///
/// # Errors
/// - [`Error::DivisionByZero`] if the slope or its uncertainty vanish
/// - [`Error::NonFinite`] if the reciprocal overflows
pub fn conductance<E: Float>(line: &FittedLine<E>, scale: E) -> Result<Measurement<E>> {
    const QUANTITY: &str = "conductance";

    let (b, sigma_b) = (line.slope(), line.sigma_slope());
    if b == E::zero() {
        return Err(Error::division_by_zero(QUANTITY, "the slope is zero"));
    }
    if sigma_b == E::zero() {
        return Err(Error::division_by_zero(QUANTITY, "the slope has no uncertainty"));
    }

    Measurement {
        value: scale / b,
        uncertainty: (scale * sigma_b / (b * b)).abs(),
    }
    .finite(QUANTITY)
}
