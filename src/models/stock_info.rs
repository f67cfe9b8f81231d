use serde::{Deserialize, Serialize};

use crate::external::market_data::CompanyProfile;

/// Company record served to clients. Fields the provider could not supply
/// are rendered "N/A" so the record is always complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInfo {
    pub name: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: String,
    pub pe_ratio: String,
    pub dividend_yield: String,
    pub description: String,
}

const NA: &str = "N/A";

impl StockInfo {
    /// Sentinel record used when the underlying fetch failed.
    pub fn unavailable(symbol: &str) -> Self {
        Self {
            name: symbol.to_string(),
            sector: NA.to_string(),
            industry: NA.to_string(),
            market_cap: NA.to_string(),
            pe_ratio: NA.to_string(),
            dividend_yield: NA.to_string(),
            description: "Information not available".to_string(),
        }
    }

    pub fn from_profile(symbol: &str, profile: &CompanyProfile) -> Self {
        Self {
            name: profile.display_name(symbol),
            sector: profile.sector.clone().unwrap_or_else(|| NA.to_string()),
            industry: profile.industry.clone().unwrap_or_else(|| NA.to_string()),
            market_cap: profile
                .market_cap
                .map(|v| format!("{:.0}", v))
                .unwrap_or_else(|| NA.to_string()),
            pe_ratio: profile
                .trailing_pe
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| NA.to_string()),
            dividend_yield: profile
                .dividend_yield
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| NA.to_string()),
            description: profile
                .summary
                .clone()
                .unwrap_or_else(|| "No description available".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_record_is_fully_populated() {
        let info = StockInfo::unavailable("AAPL");
        assert_eq!(info.name, "AAPL");
        assert_eq!(info.sector, "N/A");
        assert_eq!(info.pe_ratio, "N/A");
        assert_eq!(info.description, "Information not available");
    }

    #[test]
    fn profile_fields_pass_through_with_na_fallbacks() {
        let profile = CompanyProfile {
            short_name: Some("Apple Inc.".into()),
            sector: Some("Technology".into()),
            trailing_pe: Some(27.6912),
            ..Default::default()
        };
        let info = StockInfo::from_profile("AAPL", &profile);
        assert_eq!(info.name, "Apple Inc.");
        assert_eq!(info.sector, "Technology");
        assert_eq!(info.pe_ratio, "27.69");
        assert_eq!(info.industry, "N/A");
        assert_eq!(info.market_cap, "N/A");
    }
}
