use std::time::Duration;

/// Largest page the search capability will return in one call.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Quota budget and cost model for the external API.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub daily_limit: u64,
    pub search_cost: u64,
    pub detail_cost_per_item: u64,
    /// Resume today's consumed budget from the checkpoint document.
    pub carry_over: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 10_000,
            search_cost: 100,
            detail_cost_per_item: 1,
            carry_over: true,
        }
    }
}

/// Harvest loop configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Identities requested per search call, clamped to `1..=MAX_PAGE_SIZE`.
    pub max_results: u32,
    /// Minimum wait between two terms.
    pub pacing: Duration,
}

impl HarvestConfig {
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_results: MAX_PAGE_SIZE,
            pacing: Duration::from_secs(1),
        }
    }
}

/// HTTP client configuration for external API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Quarry/0.1 (keyword-harvester)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_config_defaults() {
        let config = QuotaConfig::default();
        assert_eq!(config.daily_limit, 10_000);
        assert_eq!(config.search_cost, 100);
        assert_eq!(config.detail_cost_per_item, 1);
        assert!(config.carry_over);
    }

    #[test]
    fn test_harvest_config_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.max_results, 50);
        assert_eq!(config.pacing, Duration::from_secs(1));
    }

    #[test]
    fn test_max_results_is_clamped() {
        assert_eq!(HarvestConfig::default().with_max_results(0).max_results, 1);
        assert_eq!(HarvestConfig::default().with_max_results(500).max_results, 50);
        assert_eq!(HarvestConfig::default().with_max_results(25).max_results, 25);
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("Quarry/"));
    }
}
