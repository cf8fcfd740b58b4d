//! Settings bundle import/export
//!
//! The bundle carries devs, panel filters, the chart provider and the tracked
//! tokens in one JSON document. A bare JSON array of devs is also accepted for
//! dev-only import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{TrackerError, TrackerResult};
use super::panels::{PanelFilter, PanelFilters, PanelId};
use super::types::{ChartProvider, Dev, Token};

pub const SETTINGS_VERSION: &str = "1.0";

/// Exported settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBundle {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub devs: Vec<Dev>,
    pub filters: PanelFilters,
    pub chart_provider: ChartProvider,
    pub tokens: Vec<Token>,
}

/// Settings document as read back; everything except `version` is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsImport {
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub devs: Option<Vec<Dev>>,
    #[serde(default)]
    pub filters: Option<BTreeMap<PanelId, PanelFilter>>,
    #[serde(default)]
    pub chart_provider: Option<String>,
    #[serde(default)]
    pub tokens: Option<Vec<Token>>,
}

/// What an import changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub devs_added: usize,
    pub devs_skipped: usize,
    pub filters_replaced: usize,
    pub chart_provider_changed: bool,
    pub tokens_replaced: Option<usize>,
}

/// Parse and validate a settings document
pub fn parse_settings(text: &str) -> TrackerResult<SettingsImport> {
    let settings: SettingsImport =
        serde_json::from_str(text).map_err(|e| TrackerError::InvalidImport(e.to_string()))?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Reject documents without a version and filters with bad bounds
pub fn validate_settings(settings: &SettingsImport) -> TrackerResult<()> {
    match &settings.version {
        None | Some(serde_json::Value::Null) => {
            return Err(TrackerError::InvalidImport(
                "Invalid settings file format: missing version".to_string(),
            ))
        }
        Some(_) => {}
    }
    if let Some(filters) = &settings.filters {
        for filter in filters.values() {
            filter.validate()?;
        }
    }
    Ok(())
}

/// Parse a dev-only export (a JSON array of devs)
pub fn parse_dev_list(text: &str) -> TrackerResult<Vec<Dev>> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| TrackerError::InvalidImport(e.to_string()))?;
    if !value.is_array() {
        return Err(TrackerError::InvalidImport(
            "Invalid file format: expected an array of devs".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| TrackerError::InvalidImport(e.to_string()))
}

/// Merge imported filters over the current set
pub fn merged_filters(current: &PanelFilters, partial: Option<BTreeMap<PanelId, PanelFilter>>) -> (PanelFilters, usize) {
    let mut filters = current.clone();
    let replaced = partial.as_ref().map(BTreeMap::len).unwrap_or(0);
    if let Some(partial) = partial {
        filters.merge(partial);
    }
    (filters, replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_version() {
        let err = parse_settings(r#"{"devs": []}"#).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidImport(_)));

        let err = parse_settings(r#"{"version": null}"#).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidImport(_)));

        assert!(parse_settings(r#"{"version": "1.0"}"#).is_ok());
        assert!(parse_settings("not json").is_err());
    }

    #[test]
    fn test_parse_browser_export() {
        let settings = parse_settings(
            r#"{
                "version": "1.0",
                "exportDate": "2024-05-01T10:00:00.000Z",
                "devs": [{"id": 1714557600000, "name": "alpha", "address": "A1"}],
                "filters": {
                    "new-launches": {"minAge": 0, "maxAge": 5, "minMC": 0, "maxMC": null},
                    "active-tokens": {"minAge": 0, "maxAge": null, "minMC": 10, "maxMC": 500}
                },
                "chartProvider": "photon"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.devs.as_ref().unwrap()[0].id, "1714557600000");
        let filters = settings.filters.unwrap();
        assert_eq!(filters.len(), 2);

        // minMC/maxMC are thousands of USD
        let active = filters[&PanelId::ActiveTokens];
        assert_eq!(active.min_market_cap, Some(10_000.0));
        assert_eq!(active.max_market_cap, Some(500_000.0));
        assert_eq!(filters[&PanelId::NewLaunches].max_age, Some(5.0));
        assert_eq!(filters[&PanelId::NewLaunches].max_market_cap, None);
        assert_eq!(settings.chart_provider.as_deref(), Some("photon"));
        assert!(settings.tokens.is_none());
    }

    #[test]
    fn test_parse_usd_filter_keys() {
        let settings = parse_settings(
            r#"{"version": "1.0", "filters": {"graduated": {"minMarketCap": 69000, "maxMarketCap": null}}}"#,
        )
        .unwrap();
        let graduated = settings.filters.unwrap()[&PanelId::Graduated];
        assert_eq!(graduated.min_market_cap, Some(69_000.0));
        assert_eq!(graduated.min_age, None);
    }

    #[test]
    fn test_exported_filters_round_trip() {
        let filter = PanelFilter::defaults_for(PanelId::Graduated);
        let text = serde_json::to_string(&filter).unwrap();
        assert!(text.contains("minMarketCap"));
        assert_eq!(serde_json::from_str::<PanelFilter>(&text).unwrap(), filter);
    }

    #[test]
    fn test_parse_rejects_bad_filter() {
        let err = parse_settings(
            r#"{"version": "1.0", "filters": {"active-tokens": {"minAge": 10, "maxAge": 1}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidFilter(_)));
    }

    #[test]
    fn test_parse_dev_list() {
        let devs = parse_dev_list(r#"[{"name": "a", "address": "A"}]"#).unwrap();
        assert_eq!(devs.len(), 1);
        assert!(parse_dev_list(r#"{"name": "a"}"#).is_err());
        assert!(parse_dev_list(r#"[{"name": "missing address"}]"#).is_err());
    }

    #[test]
    fn test_merged_filters() {
        let mut partial = BTreeMap::new();
        partial.insert(PanelId::Graduated, PanelFilter::default());
        let (filters, replaced) = merged_filters(&PanelFilters::default(), Some(partial));
        assert_eq!(replaced, 1);
        assert_eq!(*filters.get(PanelId::Graduated), PanelFilter::default());
        assert_eq!(
            *filters.get(PanelId::NewLaunches),
            PanelFilter::defaults_for(PanelId::NewLaunches)
        );

        let (unchanged, replaced) = merged_filters(&PanelFilters::default(), None);
        assert_eq!(replaced, 0);
        assert_eq!(unchanged, PanelFilters::default());
    }

    #[test]
    fn test_bundle_round_trip() {
        let bundle = SettingsBundle {
            version: SETTINGS_VERSION.to_string(),
            export_date: Utc::now(),
            devs: Vec::new(),
            filters: PanelFilters::default(),
            chart_provider: ChartProvider::Photon,
            tokens: vec![Token::launched("M", "C", 1)],
        };
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("\"chartProvider\":\"photon\""));
        assert!(json.contains("\"exportDate\""));

        let settings = parse_settings(&json).unwrap();
        assert_eq!(settings.tokens.unwrap().len(), 1);
        assert_eq!(settings.filters.unwrap().len(), 3);
    }
}
