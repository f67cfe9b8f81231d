//! End-to-end tests for the prediction engine over a fixed business-day
//! fixture: feature engineering, the three strategies, and their shared
//! output contract.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use stockcast_backend::external::market_data::DailyBar;
use stockcast_backend::services::predictor::StockPredictor;

/// Roughly half a year of weekday bars with a gentle upward drift and a
/// short repeating wiggle, deterministic across runs.
fn fixture_history(n: usize) -> Vec<DailyBar> {
    let mut bars = Vec::with_capacity(n);
    let mut date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(); // Monday
    let mut i = 0usize;
    while bars.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let close = 120.0 + i as f64 * 0.25 + (i % 5) as f64 * 0.9;
            bars.push(DailyBar {
                date,
                open: close - 0.6,
                high: close + 1.2,
                low: close - 1.4,
                close,
                volume: 2_000_000 + (i as i64) * 3_000,
            });
            i += 1;
        }
        date = date + Duration::days(1);
    }
    bars
}

fn last_engineered_date(history: &[DailyBar]) -> NaiveDate {
    history.last().unwrap().date
}

fn has_two_decimals(v: f64) -> bool {
    (v * 100.0 - (v * 100.0).round()).abs() < 1e-9
}

#[test]
fn preprocess_drops_the_rolling_warmup_and_leaves_no_gaps() {
    let history = fixture_history(130);
    let predictor = StockPredictor::new(history.clone(), "linear_regression").unwrap();
    let table = predictor.preprocess();

    assert!(table.len() + 19 <= history.len());
    assert_eq!(table.len(), 110);

    for row in &table {
        for value in [row.open, row.high, row.low, row.close, row.volume] {
            assert!(value.is_finite());
        }
        for value in [row.ma5, row.ma20, row.ret, row.volatility] {
            assert!(value.is_finite());
        }
        assert!(row.weekday < 5, "fixture only contains weekdays");
    }

    // The engineered table ends where the input ends.
    assert_eq!(table.last().unwrap().date, history.last().unwrap().date);
}

#[test]
fn linear_regression_returns_exactly_the_requested_days() {
    let history = fixture_history(130);
    let last_date = last_engineered_date(&history);
    let predictor = StockPredictor::new(history, "linear_regression").unwrap();

    let forecast = predictor.predict(5).unwrap();

    assert_eq!(forecast.algorithm, "Linear Regression");
    assert_eq!(forecast.predictions.len(), 5);
    for (i, point) in forecast.predictions.iter().enumerate() {
        assert_eq!(point.date, last_date + Duration::days(i as i64 + 1));
        assert!(point.price.is_finite());
        assert!(has_two_decimals(point.price));
    }
    assert!(forecast.confidence >= 0.0 && forecast.confidence <= 100.0);
}

#[test]
fn linear_regression_day_one_is_deterministic_for_a_fixed_fit() {
    let history = fixture_history(130);

    let first = StockPredictor::new(history.clone(), "linear_regression")
        .unwrap()
        .predict(5)
        .unwrap();
    let second = StockPredictor::new(history, "linear_regression")
        .unwrap()
        .predict(5)
        .unwrap();

    assert_eq!(first.predictions[0].price, second.predictions[0].price);
    assert_eq!(first.confidence, second.confidence);
}

#[test]
fn linear_regression_later_days_walk_off_the_anchor() {
    let history = fixture_history(130);
    let forecast = StockPredictor::new(history, "linear_regression")
        .unwrap()
        .predict(10)
        .unwrap();

    let anchor = forecast.predictions[0].price;
    for point in &forecast.predictions[1..] {
        // Each step moves at most 0.25% from the previous one, so the walk
        // stays within a narrow band of the anchor.
        assert!((point.price - anchor).abs() / anchor < 0.05);
    }
}

#[test]
fn arima_forecast_dates_are_consecutive_calendar_days() {
    let history = fixture_history(130);
    let last_date = last_engineered_date(&history);
    let predictor = StockPredictor::new(history, "arima").unwrap();

    let forecast = predictor.predict(9).unwrap();

    assert_eq!(forecast.algorithm, "ARIMA");
    assert_eq!(forecast.predictions.len(), 9);
    for (i, point) in forecast.predictions.iter().enumerate() {
        assert_eq!(point.date, last_date + Duration::days(i as i64 + 1));
        assert!(point.price.is_finite());
        assert!(has_two_decimals(point.price));
    }
    assert!(forecast.confidence >= 0.0 && forecast.confidence <= 100.0);
}

#[test]
fn arima_forecast_stays_near_the_recent_level() {
    let history = fixture_history(130);
    let last_close = history.last().unwrap().close;
    let forecast = StockPredictor::new(history, "arima").unwrap().predict(7).unwrap();

    for point in &forecast.predictions {
        assert!((point.price - last_close).abs() / last_close < 0.25);
    }
}

#[test]
fn mock_lstm_returns_the_requested_horizon() {
    let history = fixture_history(130);
    let last_date = last_engineered_date(&history);
    let forecast = StockPredictor::new(history, "lstm").unwrap().predict(12).unwrap();

    assert_eq!(forecast.algorithm, "LSTM Neural Network (Mock)");
    assert_eq!(forecast.predictions.len(), 12);
    for (i, point) in forecast.predictions.iter().enumerate() {
        assert_eq!(point.date, last_date + Duration::days(i as i64 + 1));
        assert!(point.price.is_finite());
        assert!(has_two_decimals(point.price));
    }
    // The mock's confidence is decorative noise around 85 and deliberately
    // unclamped; it should at least be a finite number.
    assert!(forecast.confidence.is_finite());
}

#[test]
fn history_order_does_not_matter() {
    let mut history = fixture_history(130);
    let expected = StockPredictor::new(history.clone(), "linear_regression")
        .unwrap()
        .predict(1)
        .unwrap();

    history.reverse();
    let shuffled = StockPredictor::new(history, "linear_regression")
        .unwrap()
        .predict(1)
        .unwrap();

    assert_eq!(expected.predictions[0].price, shuffled.predictions[0].price);
}

#[test]
fn unsupported_algorithm_is_signaled_not_defaulted() {
    assert!(StockPredictor::new(fixture_history(60), "neural_prophet").is_err());
    assert!(StockPredictor::new(fixture_history(60), "LSTM").is_err());
}
