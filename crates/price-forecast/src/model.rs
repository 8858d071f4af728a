//! Additive trend + seasonality regression.
//!
//! `y(t) = intercept + slope * t + daily(t) + weekly(t)`, where the seasonal
//! parts are truncated Fourier series. Coefficients are the MAP estimate under
//! Gaussian priors (ridge), which keeps the system solvable when the history is
//! shorter than the number of terms. Yearly seasonality is never modelled.

use chrono::{Duration, NaiveDateTime};
use nalgebra::{DMatrix, DVector};
use pricewatch_core::{ForecastPoint, PriceWatchError, PriceWatchResult};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

const MS_PER_DAY: f64 = 86_400_000.0;
/// Residual sigma never drops below this fraction of the mean level.
const MIN_RELATIVE_SIGMA: f64 = 0.01;
/// Keeps the intercept column invertible when every other term is collinear.
const JITTER: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub daily_order: usize,
    pub weekly_order: usize,
    /// Weekly terms are only added once the history spans this many days.
    pub weekly_min_span_days: f64,
    /// Central probability mass covered by the lower/upper bounds.
    pub interval_width: f64,
    pub trend_prior_scale: f64,
    pub seasonality_prior_scale: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            daily_order: 4,
            weekly_order: 3,
            weekly_min_span_days: 14.0,
            interval_width: 0.8,
            trend_prior_scale: 5.0,
            seasonality_prior_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeasonalModel {
    config: ModelConfig,
}

impl SeasonalModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Fit on timezone-naive samples. Input need not be sorted.
    pub fn fit(&self, samples: &[(NaiveDateTime, f64)]) -> PriceWatchResult<FittedModel> {
        if samples.len() < 2 {
            return Err(PriceWatchError::ModelFitting(format!(
                "need at least 2 samples, got {}",
                samples.len()
            )));
        }
        if samples.iter().any(|(_, y)| !y.is_finite()) {
            return Err(PriceWatchError::ModelFitting("non-finite price in history".into()));
        }

        let (first, last) = samples.iter().fold((samples[0].0, samples[0].0), |(lo, hi), (t, _)| {
            (lo.min(*t), hi.max(*t))
        });
        let span_days = days_between(first, last).max(1.0);
        let weekly = span_days >= self.config.weekly_min_span_days;

        let y_scale = samples
            .iter()
            .map(|(_, y)| y.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let layout = Layout {
            origin: first,
            span_days,
            daily_order: self.config.daily_order,
            weekly_order: if weekly { self.config.weekly_order } else { 0 },
        };

        let n = samples.len();
        let p = layout.width();
        let rows: Vec<Vec<f64>> = samples.iter().map(|(t, _)| layout.row(*t)).collect();
        let x = DMatrix::from_fn(n, p, |r, c| rows[r][c]);
        let y = DVector::from_iterator(n, samples.iter().map(|(_, v)| v / y_scale));

        let mut penalty = DVector::from_element(p, 1.0 / self.config.seasonality_prior_scale.powi(2));
        penalty[0] = 0.0;
        penalty[1] = 1.0 / self.config.trend_prior_scale.powi(2);

        let xt = x.transpose();
        let mut gram = &xt * &x;
        for i in 0..p {
            gram[(i, i)] += penalty[i] + JITTER;
        }

        let chol = gram
            .cholesky()
            .ok_or_else(|| PriceWatchError::ModelFitting("normal equations not positive definite".into()))?;
        let coef = chol.solve(&(&xt * &y));

        let residuals = &y - &x * &coef;
        let dof = (n as f64 - 2.0).max(1.0);
        let mean_level = y.iter().map(|v| v.abs()).sum::<f64>() / n as f64;
        let sigma = (residuals.norm_squared() / dof)
            .sqrt()
            .max(MIN_RELATIVE_SIGMA * mean_level);

        let slope_var = chol.inverse()[(1, 1)] * sigma * sigma;

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| PriceWatchError::ModelFitting(e.to_string()))?
            .inverse_cdf(0.5 + self.config.interval_width / 2.0);

        Ok(FittedModel {
            layout,
            coef,
            y_scale,
            sigma,
            slope_var,
            z,
            last,
            samples: n,
        })
    }
}

#[derive(Debug, Clone)]
struct Layout {
    origin: NaiveDateTime,
    span_days: f64,
    daily_order: usize,
    weekly_order: usize,
}

impl Layout {
    fn width(&self) -> usize {
        2 + 2 * self.daily_order + 2 * self.weekly_order
    }

    fn row(&self, at: NaiveDateTime) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(days_between(self.origin, at) / self.span_days);

        // Seasonal phase is taken from absolute time so it does not depend on
        // where the history happens to start.
        let abs_days = at.and_utc().timestamp_millis() as f64 / MS_PER_DAY;
        fourier(&mut row, abs_days, 1.0, self.daily_order);
        fourier(&mut row, abs_days, 7.0, self.weekly_order);
        row
    }
}

fn fourier(row: &mut Vec<f64>, t_days: f64, period: f64, order: usize) {
    for k in 1..=order {
        let arg = 2.0 * PI * k as f64 * t_days / period;
        row.push(arg.sin());
        row.push(arg.cos());
    }
}

fn days_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_DAY
}

#[derive(Debug, Clone)]
pub struct FittedModel {
    layout: Layout,
    coef: DVector<f64>,
    y_scale: f64,
    sigma: f64,
    slope_var: f64,
    z: f64,
    last: NaiveDateTime,
    samples: usize,
}

impl FittedModel {
    pub fn uses_weekly(&self) -> bool {
        self.layout.weekly_order > 0
    }

    pub fn training_samples(&self) -> usize {
        self.samples
    }

    /// One point per day for `horizon` days after the last observation. Bounds
    /// widen with distance as slope uncertainty accumulates.
    pub fn predict(&self, horizon: usize) -> PriceWatchResult<Vec<ForecastPoint>> {
        let mut out = Vec::with_capacity(horizon);
        for i in 0..horizon {
            let at = self.last + Duration::days(i as i64 + 1);
            let row = DVector::from_vec(self.layout.row(at));
            let yhat = row.dot(&self.coef) * self.y_scale;

            let h = days_between(self.last, at) / self.layout.span_days;
            let sd = (self.sigma.powi(2) + h * h * self.slope_var).sqrt() * self.y_scale;
            let half = self.z * sd;

            if !yhat.is_finite() || !half.is_finite() {
                return Err(PriceWatchError::ModelFitting(format!(
                    "non-finite prediction at horizon day {}",
                    i + 1
                )));
            }

            out.push(ForecastPoint {
                date: at.date(),
                predicted_price: yhat,
                lower_bound: yhat - half,
                upper_bound: yhat + half,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
            + Duration::days(day)
    }

    #[test]
    fn test_linear_history_extrapolates() {
        let samples: Vec<_> = (0..20).map(|d| (at(d), 100.0 + 2.0 * d as f64)).collect();
        let fitted = SeasonalModel::default().fit(&samples).unwrap();
        assert!(fitted.uses_weekly());

        let forecast = fitted.predict(5).unwrap();
        assert_eq!(forecast.len(), 5);
        assert_eq!(forecast[0].date, at(20).date());
        assert!((forecast[0].predicted_price - 140.0).abs() < 2.0);
        assert!(forecast[4].predicted_price > forecast[0].predicted_price);
    }

    #[test]
    fn test_bounds_bracket_and_widen() {
        let samples: Vec<_> = [500.0, 480.0, 510.0, 495.0, 505.0]
            .iter()
            .enumerate()
            .map(|(d, y)| (at(d as i64), *y))
            .collect();
        let fitted = SeasonalModel::default().fit(&samples).unwrap();
        assert!(!fitted.uses_weekly());
        assert_eq!(fitted.training_samples(), 5);

        let forecast = fitted.predict(30).unwrap();
        for p in &forecast {
            assert!(p.lower_bound < p.predicted_price && p.predicted_price < p.upper_bound);
        }
        let first = forecast[0].upper_bound - forecast[0].lower_bound;
        let last = forecast[29].upper_bound - forecast[29].lower_bound;
        assert!(last > first);
    }

    #[test]
    fn test_flat_history_has_nonzero_interval() {
        let samples: Vec<_> = (0..3).map(|d| (at(d), 999.0)).collect();
        let forecast = SeasonalModel::default().fit(&samples).unwrap().predict(1).unwrap();
        assert!((forecast[0].predicted_price - 999.0).abs() < 1.0);
        assert!(forecast[0].upper_bound - forecast[0].lower_bound > 0.0);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let model = SeasonalModel::default();
        assert!(model.fit(&[(at(0), 10.0)]).is_err());
        assert!(model.fit(&[(at(0), 10.0), (at(1), f64::NAN)]).is_err());
    }
}
