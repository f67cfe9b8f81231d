mod prediction;
mod price_bar;
mod stock;
mod stock_info;

pub use prediction::{
    Algorithm, Forecast, ForecastPoint, HistoricalSeries, PredictRequest, PredictionResponse,
    PredictionRun, StockPrediction,
};
pub use price_bar::PriceBar;
pub use stock::Stock;
pub use stock_info::StockInfo;
