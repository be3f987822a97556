//! Crop category and taxonomy types

use serde::{Deserialize, Serialize};

/// The closed set of crop categories.
///
/// Unknown category strings are rejected at parse time, before any storage
/// or database call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropCategory {
    Tables,
    Equations,
    Diagrams,
    Others,
}

impl CropCategory {
    pub const ALL: [CropCategory; 4] = [
        CropCategory::Tables,
        CropCategory::Equations,
        CropCategory::Diagrams,
        CropCategory::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropCategory::Tables => "tables",
            CropCategory::Equations => "equations",
            CropCategory::Diagrams => "diagrams",
            CropCategory::Others => "others",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tables" => Some(CropCategory::Tables),
            "equations" => Some(CropCategory::Equations),
            "diagrams" => Some(CropCategory::Diagrams),
            "others" => Some(CropCategory::Others),
            _ => None,
        }
    }
}

impl std::fmt::Display for CropCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four-level taxonomy tuple identifying one aggregate row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxonomyKey {
    pub class_id: i64,
    pub subject_id: i64,
    pub course_id: i64,
    pub module_id: i64,
}

/// Per-category URL lists stored in the `image_urls` JSON column.
///
/// The struct has exactly the four category fields, so an unknown category
/// key is unrepresentable. Lists are append-only; insertion order is upload
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUrls {
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub equations: Vec<String>,
    #[serde(default)]
    pub diagrams: Vec<String>,
    #[serde(default)]
    pub others: Vec<String>,
}

impl CategoryUrls {
    pub fn get(&self, category: CropCategory) -> &[String] {
        match category {
            CropCategory::Tables => &self.tables,
            CropCategory::Equations => &self.equations,
            CropCategory::Diagrams => &self.diagrams,
            CropCategory::Others => &self.others,
        }
    }

    pub fn push(&mut self, category: CropCategory, url: String) {
        let list = match category {
            CropCategory::Tables => &mut self.tables,
            CropCategory::Equations => &mut self.equations,
            CropCategory::Diagrams => &mut self.diagrams,
            CropCategory::Others => &mut self.others,
        };
        list.push(url);
    }

    pub fn total(&self) -> usize {
        CropCategory::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Read view of one aggregate row (or its empty default)
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub image_urls: CategoryUrls,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub total_images: usize,
}

impl AggregateView {
    /// The view returned for a never-seen taxonomy tuple: all four
    /// categories present and empty.
    pub fn empty() -> Self {
        Self {
            image_urls: CategoryUrls::default(),
            created_at: None,
            updated_at: None,
            total_images: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_the_four_fixed_categories() {
        for category in CropCategory::ALL {
            assert_eq!(CropCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(CropCategory::parse("figures"), None);
        assert_eq!(CropCategory::parse("Tables"), None);
        assert_eq!(CropCategory::parse(""), None);
    }

    #[test]
    fn default_map_serializes_all_four_keys() {
        let json = serde_json::to_value(CategoryUrls::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        for category in CropCategory::ALL {
            assert_eq!(obj[category.as_str()], serde_json::json!([]));
        }
    }

    #[test]
    fn push_appends_in_call_order() {
        let mut map = CategoryUrls::default();
        map.push(CropCategory::Tables, "a".into());
        map.push(CropCategory::Tables, "b".into());
        map.push(CropCategory::Others, "c".into());

        assert_eq!(map.get(CropCategory::Tables).to_vec(), ["a", "b"]);
        assert_eq!(map.get(CropCategory::Others).to_vec(), ["c"]);
        assert_eq!(map.total(), 3);
    }

    #[test]
    fn missing_keys_deserialize_as_empty_lists() {
        let map: CategoryUrls = serde_json::from_str(r#"{"tables":["u"]}"#).unwrap();
        assert_eq!(map.get(CropCategory::Tables).to_vec(), ["u"]);
        assert!(map.get(CropCategory::Equations).is_empty());
        assert_eq!(map.total(), 1);
    }
}
