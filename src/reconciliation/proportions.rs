//! Historical proportion estimators for top-down disaggregation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a fine segment's share of its coarse parent is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProportionsMethod {
    /// Average historical proportions: mean of per-timestamp `fine / coarse`.
    #[serde(rename = "AHP")]
    Ahp,
    /// Proportions of the historical averages: `mean(fine) / mean(coarse)`.
    #[serde(rename = "PHA")]
    Pha,
}

impl ProportionsMethod {
    /// All methods, sorted by name.
    pub const ALL: [ProportionsMethod; 2] = [ProportionsMethod::Ahp, ProportionsMethod::Pha];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProportionsMethod::Ahp => "AHP",
            ProportionsMethod::Pha => "PHA",
        }
    }

    /// Estimate the proportion of `fine` in `coarse` over the last `period_length` steps.
    ///
    /// Both series are aligned on the same timestamps. `NaN` observations are
    /// ignored; AHP also skips timestamps where the ratio is not finite, such as a
    /// zero coarse value. If nothing is left to average the result is `NaN`.
    pub fn estimate(&self, fine: &[f64], coarse: &[f64], period_length: usize) -> f64 {
        let fine = tail(fine, period_length);
        let coarse = tail(coarse, period_length);
        match self {
            ProportionsMethod::Ahp => {
                let ratios: Vec<f64> = fine
                    .iter()
                    .zip(coarse)
                    .map(|(f, c)| f / c)
                    .filter(|r| r.is_finite())
                    .collect();
                nanmean(&ratios)
            }
            ProportionsMethod::Pha => nanmean(fine) / nanmean(coarse),
        }
    }
}

impl fmt::Display for ProportionsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProportionsMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnsupportedMethod {
                method: s.to_string(),
                supported: Self::ALL.map(|m| m.as_str()).join(", "),
            })
    }
}

/// Last `n` items of a slice.
fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Mean over non-`NaN` values, `NaN` if there are none.
fn nanmean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
