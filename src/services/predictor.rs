use chrono::{Datelike, Duration, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::errors::AppError;
use crate::external::market_data::DailyBar;
use crate::models::{Algorithm, Forecast, ForecastPoint};

const SHORT_MA_WINDOW: usize = 5;
const LONG_MA_WINDOW: usize = 20;
const VOLATILITY_WINDOW: usize = 20;
/// Trailing observations scored for the ARIMA confidence figure.
const CONFIDENCE_LOOKBACK: usize = 30;
/// Fixed autoregressive order; the model is ARIMA(5,1,0), not auto-selected.
const AR_ORDER: usize = 5;

/// One row of the engineered table: the raw bar plus rolling features.
/// Only rows with every feature populated survive preprocessing.
#[derive(Debug, Clone)]
pub struct EngineeredRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ma5: f64,
    pub ma20: f64,
    pub ret: f64,
    pub volatility: f64,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u32,
}

/// Fits one of three interchangeable strategies over a price history and
/// produces an N-day forward forecast. Holds no state between calls beyond
/// the sorted input copy and the selected algorithm.
pub struct StockPredictor {
    history: Vec<DailyBar>,
    algorithm: Algorithm,
}

impl StockPredictor {
    /// Takes a copy of the history (sorted by date ascending) and the
    /// algorithm tag. An unknown tag is rejected here, before any fitting.
    pub fn new(mut history: Vec<DailyBar>, algorithm: &str) -> Result<Self, AppError> {
        let algorithm = Algorithm::parse(algorithm)?;
        history.sort_by_key(|b| b.date);
        Ok(Self { history, algorithm })
    }

    /// Derives the engineered table: MA5/MA20 of close, daily percent
    /// return, 20-day rolling standard deviation of return, weekday. Rows
    /// inside the rolling warm-up are dropped, so the output is strictly
    /// shorter than the input.
    pub fn preprocess(&self) -> Vec<EngineeredRow> {
        let closes: Vec<f64> = self.history.iter().map(|b| b.close).collect();

        let ma5 = sma(&closes, SHORT_MA_WINDOW);
        let ma20 = sma(&closes, LONG_MA_WINDOW);
        let returns = pct_change(&closes);
        let volatility = rolling_std(&returns, VOLATILITY_WINDOW);

        self.history
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| {
                Some(EngineeredRow {
                    date: bar.date,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume as f64,
                    ma5: ma5[i]?,
                    ma20: ma20[i]?,
                    ret: returns[i]?,
                    volatility: volatility[i]?,
                    weekday: bar.date.weekday().num_days_from_monday(),
                })
            })
            .collect()
    }

    /// Produces exactly `prediction_days` forecast points with consecutive
    /// calendar dates following the last engineered row, plus a run-level
    /// confidence score and the algorithm label.
    pub fn predict(&self, prediction_days: u32) -> Result<Forecast, AppError> {
        let table = self.preprocess();

        match self.algorithm {
            Algorithm::LinearRegression => self.linear_regression(&table, prediction_days),
            Algorithm::Arima => self.arima(&table, prediction_days),
            Algorithm::Lstm => self.mock_lstm(&table, prediction_days),
        }
    }

    fn linear_regression(
        &self,
        table: &[EngineeredRow],
        prediction_days: u32,
    ) -> Result<Forecast, AppError> {
        if table.len() < 2 {
            return Err(AppError::Validation(
                "Insufficient history for a linear regression fit".to_string(),
            ));
        }

        let day_cols = weekday_columns(table);
        let raw: Vec<Vec<f64>> = table.iter().map(|r| feature_row(r, &day_cols)).collect();
        let scaler = MinMaxScaler::fit(&raw);

        let n = raw.len();
        let k = raw[0].len();

        // Design matrix with an intercept column; features scaled to [0, 1].
        let mut x = DMatrix::zeros(n, k + 1);
        for (i, row) in raw.iter().enumerate() {
            x[(i, 0)] = 1.0;
            for (j, v) in scaler.transform(row).into_iter().enumerate() {
                x[(i, j + 1)] = v;
            }
        }
        let y = DVector::from_iterator(n, table.iter().map(|r| r.close));

        let beta = least_squares(&x, &y)?;

        let y_hat = &x * &beta;
        let rmse = ((&y - &y_hat).iter().map(|e| e * e).sum::<f64>() / n as f64).sqrt();
        let mean_close = y.iter().sum::<f64>() / n as f64;
        let confidence = round2((100.0 - rmse / mean_close * 100.0).max(0.0));

        // Day 1 is the model's output for the last known feature row. The
        // remaining days perturb the previous prediction; feature vectors
        // are not re-derived for future dates.
        let last_scaled = scaler.transform(&raw[raw.len() - 1]);
        let mut price = beta[0]
            + last_scaled
                .iter()
                .enumerate()
                .map(|(j, &v)| beta[j + 1] * v)
                .sum::<f64>();

        let last_date = table[table.len() - 1].date;
        let mut predictions = Vec::with_capacity(prediction_days as usize);

        for day in 1..=prediction_days {
            if day > 1 {
                price *= 1.0 + 0.005 * (rand::random::<f64>() - 0.5);
            }
            price = round2(price);
            predictions.push(ForecastPoint {
                date: last_date + Duration::days(day as i64),
                price,
            });
        }

        Ok(Forecast {
            predictions,
            confidence,
            algorithm: Algorithm::LinearRegression.label().to_string(),
        })
    }

    fn arima(&self, table: &[EngineeredRow], prediction_days: u32) -> Result<Forecast, AppError> {
        let ts: Vec<f64> = table.iter().map(|r| r.close).collect();
        if ts.len() < AR_ORDER + 3 {
            return Err(AppError::Validation(
                "Insufficient history for an ARIMA fit".to_string(),
            ));
        }

        let diff = difference(&ts);
        let (constant, phi) = fit_ar(&diff, AR_ORDER)?;

        // Direct h-step forecast: future shocks are taken at their
        // expectation (zero), then the differenced path is integrated back
        // from the last observed close.
        let mut extended = diff.clone();
        let mut deltas = Vec::with_capacity(prediction_days as usize);
        for _ in 0..prediction_days {
            let mut next = constant;
            for (i, &p) in phi.iter().enumerate() {
                next += p * extended[extended.len() - 1 - i];
            }
            extended.push(next);
            deltas.push(next);
        }
        let last_close = ts[ts.len() - 1];
        let prices = integrate(&deltas, last_close);

        // Confidence from in-sample one-step predictions over the trailing
        // window, against actual closes.
        let lookback = CONFIDENCE_LOOKBACK.min(ts.len() - 1);
        let start = (ts.len() - lookback).max(AR_ORDER + 1);

        let mut sum_sq = 0.0;
        let mut sum_actual = 0.0;
        let mut count = 0usize;
        for j in start..ts.len() {
            let t = j - 1;
            let mut pred_delta = constant;
            for (i, &p) in phi.iter().enumerate() {
                pred_delta += p * diff[t - 1 - i];
            }
            let predicted = ts[j - 1] + pred_delta;
            sum_sq += (ts[j] - predicted) * (ts[j] - predicted);
            sum_actual += ts[j];
            count += 1;
        }
        let rmse = (sum_sq / count as f64).sqrt();
        let mean_actual = sum_actual / count as f64;
        let confidence = round2((100.0 - rmse / mean_actual * 100.0).max(0.0));

        let last_date = table[table.len() - 1].date;
        let predictions = prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| ForecastPoint {
                date: last_date + Duration::days(i as i64 + 1),
                price: round2(price),
            })
            .collect();

        Ok(Forecast {
            predictions,
            confidence,
            algorithm: Algorithm::Arima.label().to_string(),
        })
    }

    /// Labeled placeholder, not a neural network: a Gaussian random walk
    /// with fixed drift taken from the 20-day trend. Its confidence is
    /// noise around a constant, unrelated to fit quality.
    fn mock_lstm(
        &self,
        table: &[EngineeredRow],
        prediction_days: u32,
    ) -> Result<Forecast, AppError> {
        let ts: Vec<f64> = table.iter().map(|r| r.close).collect();
        if ts.len() < LONG_MA_WINDOW {
            return Err(AppError::Validation(
                "Insufficient history for the LSTM forecast".to_string(),
            ));
        }

        let trend = (ts[ts.len() - 1] - ts[ts.len() - LONG_MA_WINDOW]) / LONG_MA_WINDOW as f64;
        let sigma = (trend * 2.0).abs();

        let mut rng = rand::rng();
        let last_date = table[table.len() - 1].date;
        let mut price = ts[ts.len() - 1];
        let mut predictions = Vec::with_capacity(prediction_days as usize);

        for day in 1..=prediction_days {
            let shock: f64 = rng.sample::<f64, _>(StandardNormal) * sigma;
            price = price + trend + shock;
            predictions.push(ForecastPoint {
                date: last_date + Duration::days(day as i64),
                price: round2(price),
            });
        }

        let noise: f64 = rng.sample::<f64, _>(StandardNormal);
        let confidence = round2(85.0 + 5.0 * noise);

        Ok(Forecast {
            predictions,
            confidence,
            algorithm: Algorithm::Lstm.label().to_string(),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Simple moving average, aligned with the input: `None` until `window`
/// values have been seen.
fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    values
        .iter()
        .enumerate()
        .scan(0.0_f64, move |sum, (i, &v)| {
            *sum += v;
            if i >= window {
                *sum -= values[i - window];
            }

            let out = if i + 1 >= window {
                Some(*sum / window as f64)
            } else {
                None
            };

            Some(out)
        })
        .collect()
}

/// Day-over-day percent change; the first element has no predecessor.
fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i == 0 {
                None
            } else {
                Some(v / values[i - 1] - 1.0)
            }
        })
        .collect()
}

/// Rolling sample standard deviation over an optional series. A window
/// containing any gap yields `None`.
fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let mut complete = Vec::with_capacity(window);
            for v in slice {
                complete.push((*v)?);
            }
            Some(sample_std(&complete))
        })
        .collect()
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Distinct weekdays present in the table, ascending. One-hot columns are
/// generated only for days that actually occur.
fn weekday_columns(table: &[EngineeredRow]) -> Vec<u32> {
    let mut days: Vec<u32> = table.iter().map(|r| r.weekday).collect();
    days.sort_unstable();
    days.dedup();
    days
}

fn feature_row(row: &EngineeredRow, day_cols: &[u32]) -> Vec<f64> {
    let mut features = vec![
        row.open,
        row.high,
        row.low,
        row.volume,
        row.ma5,
        row.ma20,
        row.volatility,
    ];
    for &day in day_cols {
        features.push(if row.weekday == day { 1.0 } else { 0.0 });
    }
    features
}

/// Per-feature min-max scaling to [0, 1], fit on the full table. Constant
/// columns scale to zero.
struct MinMaxScaler {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    fn fit(rows: &[Vec<f64>]) -> Self {
        let k = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut mins = vec![f64::INFINITY; k];
        let mut maxs = vec![f64::NEG_INFINITY; k];

        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }

        Self { mins, maxs }
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &v)| {
                let range = self.maxs[j] - self.mins[j];
                if range == 0.0 {
                    0.0
                } else {
                    (v - self.mins[j]) / range
                }
            })
            .collect()
    }
}

/// Least-squares solve via SVD. Handles the rank deficiency that the
/// intercept plus a full set of one-hot columns introduces.
fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, AppError> {
    x.clone()
        .svd(true, true)
        .solve(y, 1e-12)
        .map_err(|e| AppError::Validation(format!("Model fit failed: {}", e)))
}

/// First difference of the series.
fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Inverse of `difference`: cumulative sum anchored at `start`.
fn integrate(deltas: &[f64], start: f64) -> Vec<f64> {
    deltas
        .iter()
        .scan(start, |acc, &d| {
            *acc += d;
            Some(*acc)
        })
        .collect()
}

/// AR(p) with constant, estimated by least squares on the lag matrix.
fn fit_ar(diff: &[f64], p: usize) -> Result<(f64, Vec<f64>), AppError> {
    let n = diff.len();
    if n < p + 2 {
        return Err(AppError::Validation(
            "Insufficient history for an ARIMA fit".to_string(),
        ));
    }

    let rows = n - p;
    let mut x = DMatrix::zeros(rows, p + 1);
    let mut y = DVector::zeros(rows);
    for (r, t) in (p..n).enumerate() {
        x[(r, 0)] = 1.0;
        for i in 1..=p {
            x[(r, i)] = diff[t - i];
        }
        y[r] = diff[t];
    }

    let beta = least_squares(&x, &y)?;
    Ok((beta[0], beta.iter().skip(1).cloned().collect()))
}
