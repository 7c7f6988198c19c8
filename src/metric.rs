use serde::{Deserialize, Serialize};

/// Parses a free-form metric value such as `45.2%`, `$125,340` or `12`.
///
/// Returns `None` for anything that is not a finite number once the percent
/// sign, currency sign and thousands separators are removed.
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches('%');
    // A currency sign may sit on either side of a leading minus: `-$5` or `$-5`.
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let cleaned: String = sign
        .chars()
        .chain(unsigned.trim_start_matches('$').chars())
        .filter(|c| *c != ',')
        .collect();

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCatalog {
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
    pub metrics: Vec<CatalogEntry>,
}

fn default_fallback_title() -> String {
    "Contributor".to_string()
}

impl MetricCatalog {
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.entry(key)
            .map(|entry| entry.display_name.as_str())
            .unwrap_or(key)
    }

    pub fn title(&self, key: &str) -> Option<&str> {
        self.entry(key).and_then(|entry| entry.title.as_deref())
    }

    pub fn is_titled(&self, key: &str) -> bool {
        self.title(key).is_some()
    }

    fn entry(&self, key: &str) -> Option<&CatalogEntry> {
        self.metrics.iter().find(|entry| entry.key == key)
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        let metrics = [
            ("M365Attach", "M365 Attach", Some("Microsoft Champion")),
            ("GSP", "GSP (Warranty)", Some("Guardian of Guarantees")),
            ("Revenue", "Revenue", Some("Revenue Raider")),
            ("ASP", "ASP (Average Selling Price)", Some("Elite Virtuoso")),
            ("Basket", "Basket", Some("Master of Addons")),
            ("PMAttach", "PM Attach %", Some("Membership Pro")),
            ("5Star", "5-Star Surveys", None),
            ("BP", "Business Points", None),
            ("PM", "Protection Members", None),
            ("Picks", "Picks", None),
            ("Accuracy", "Accuracy", None),
            ("Awk", "Awk", None),
        ]
        .into_iter()
        .map(|(key, display_name, title)| CatalogEntry {
            key: key.to_string(),
            display_name: display_name.to_string(),
            title: title.map(str::to_string),
        })
        .collect();

        Self {
            fallback_title: default_fallback_title(),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percent_currency_and_plain_values() {
        assert_eq!(parse_metric_value("45.2%"), Some(45.2));
        assert_eq!(parse_metric_value("$125,340"), Some(125340.0));
        assert_eq!(parse_metric_value("12"), Some(12.0));
        assert_eq!(parse_metric_value(" $1,245 "), Some(1245.0));
        assert_eq!(parse_metric_value("-3.5"), Some(-3.5));
    }

    #[test]
    fn negative_currency_parses_with_sign_on_either_side() {
        assert_eq!(parse_metric_value("-$5"), Some(-5.0));
        assert_eq!(parse_metric_value("$-5"), Some(-5.0));
        assert_eq!(parse_metric_value("-$1,250.50"), Some(-1250.5));
        assert_eq!(parse_metric_value("--$5"), None);
    }

    #[test]
    fn non_numeric_values_are_absent() {
        assert_eq!(parse_metric_value("N/A"), None);
        assert_eq!(parse_metric_value(""), None);
        assert_eq!(parse_metric_value("%"), None);
        assert_eq!(parse_metric_value("MVP"), None);
        assert_eq!(parse_metric_value("NaN"), None);
        assert_eq!(parse_metric_value("inf"), None);
    }

    #[test]
    fn default_catalog_titles_only_sales_metrics() {
        let catalog = MetricCatalog::default();
        assert_eq!(catalog.title("Revenue"), Some("Revenue Raider"));
        assert_eq!(catalog.title("Accuracy"), None);
        assert!(!catalog.is_titled("Picks"));
        assert_eq!(catalog.display_name("GSP"), "GSP (Warranty)");
        assert_eq!(catalog.display_name("Unknown"), "Unknown");
        assert_eq!(catalog.fallback_title, "Contributor");
    }

    #[test]
    fn catalog_deserializes_with_default_fallback() {
        let catalog: MetricCatalog = serde_json::from_str(
            r#"{"metrics": [{"key": "Calls", "display_name": "Calls", "title": "Phone Hero"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.fallback_title, "Contributor");
        assert_eq!(catalog.title("Calls"), Some("Phone Hero"));
    }
}
