use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::store::Document;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Backwaters,
    HillStation,
    Beach,
    Wildlife,
    Cultural,
    Wellness,
    Adventure,
    CompleteTour,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Backwaters,
        Category::HillStation,
        Category::Beach,
        Category::Wildlife,
        Category::Cultural,
        Category::Wellness,
        Category::Adventure,
        Category::CompleteTour,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Category::Backwaters => "backwaters",
            Category::HillStation => "hill-station",
            Category::Beach => "beach",
            Category::Wildlife => "wildlife",
            Category::Cultural => "cultural",
            Category::Wellness => "wellness",
            Category::Adventure => "adventure",
            Category::CompleteTour => "complete-tour",
        }
    }

    /// Label shown on the public category filter.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Backwaters => "Backwaters",
            Category::HillStation => "Hill Stations",
            Category::Beach => "Beaches",
            Category::Wildlife => "Wildlife",
            Category::Cultural => "Cultural",
            Category::Wellness => "Wellness",
            Category::Adventure => "Adventure",
            Category::CompleteTour => "Complete Tours",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.slug() == slug)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Difficulty {
    #[default]
    Easy,
    Moderate,
    Challenging,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Challenging => "Challenging",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Easy" => Some(Difficulty::Easy),
            "Moderate" => Some(Difficulty::Moderate),
            "Challenging" => Some(Difficulty::Challenging),
            _ => None,
        }
    }
}

/// Publication state. Only `Active` packages are visible in the public catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Active,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Status::Draft),
            "active" => Some(Status::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItineraryDay {
    pub day: u32,
    pub title: String,
    pub activities: Vec<String>,
}

impl ItineraryDay {
    /// A blank day as the admin form appends it.
    pub fn blank(day: u32) -> Self {
        Self {
            day,
            title: String::new(),
            activities: vec![String::new()],
        }
    }
}

/// A travel package as read back from the store, with every field normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub full_description: String,
    pub duration: String,
    pub location: String,
    pub category: Option<Category>,
    pub difficulty: Difficulty,
    pub status: Status,
    #[serde(serialize_with = "serialize_price")]
    pub price: Option<f64>,
    pub highlights: Vec<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub itinerary: Vec<ItineraryDay>,
    pub image: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PackageRecord {
    /// Maps a raw store document onto a record.
    ///
    /// Documents may have been written by older clients, so nothing is trusted:
    /// array fields that are missing or not arrays become empty, non-string
    /// entries are dropped, unknown enum values fall back to their defaults and
    /// `createdAt` resolves through native timestamp, then the document's own
    /// `createdAt` value, then the epoch.
    pub fn from_document(doc: &Document) -> Self {
        let empty = Map::new();
        let data = doc.data.as_object().unwrap_or(&empty);

        Self {
            id: doc.id,
            title: text(data, "title"),
            description: text(data, "description"),
            full_description: text(data, "fullDescription"),
            duration: text(data, "duration"),
            location: text(data, "location"),
            category: data
                .get("category")
                .and_then(Value::as_str)
                .and_then(Category::from_slug),
            difficulty: data
                .get("difficulty")
                .and_then(Value::as_str)
                .and_then(Difficulty::parse)
                .unwrap_or_default(),
            status: data
                .get("status")
                .and_then(Value::as_str)
                .and_then(Status::parse)
                .unwrap_or_default(),
            price: data.get("price").and_then(price_value),
            highlights: string_list(data.get("highlights")),
            includes: string_list(data.get("includes")),
            excludes: string_list(data.get("excludes")),
            itinerary: itinerary(data.get("itinerary")),
            image: text(data, "image"),
            images: string_list(data.get("images")),
            created_at: doc
                .created_at
                .or_else(|| data.get("createdAt").and_then(timestamp_value))
                .unwrap_or_default(),
            updated_at: doc
                .updated_at
                .or_else(|| data.get("updatedAt").and_then(timestamp_value)),
        }
    }
}

/// Newest first by `created_at`. Stable, so equal timestamps keep store order.
pub fn sort_newest_first(records: &mut [PackageRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// The normalized field set written to the store on create and update.
/// `id`, `createdAt` and `updatedAt` are never part of it; the store owns those.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageFields {
    pub title: String,
    pub description: String,
    pub full_description: String,
    pub duration: String,
    pub location: String,
    #[serde(serialize_with = "serialize_price")]
    pub price: Option<f64>,
    pub category: Option<Category>,
    pub difficulty: Difficulty,
    pub status: Status,
    pub highlights: Vec<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub itinerary: Vec<ItineraryDay>,
    pub image: String,
    pub images: Vec<String>,
}

impl PackageFields {
    pub fn to_document_data(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Ok(Map::from_iter([("value".to_string(), other)])),
        }
    }
}

fn text(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn itinerary(value: Option<&Value>) -> Vec<ItineraryDay> {
    let Some(days) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    days.iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(position, day)| ItineraryDay {
            day: day
                .get("day")
                .and_then(Value::as_u64)
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(position as u32 + 1),
            title: text(day, "title"),
            activities: string_list(day.get("activities")),
        })
        .collect()
}

/// Prices were historically saved both as numbers and as strings.
fn price_value(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Whole prices are written as integers, so `15999` stays `15999`.
fn serialize_price<S: Serializer>(price: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    match *price {
        Some(p) if p.fract() == 0.0 && p.abs() < MAX_EXACT => serializer.serialize_i64(p as i64),
        Some(p) => serializer.serialize_f64(p),
        None => serializer.serialize_none(),
    }
}

fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_string(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        // exported timestamps: {"seconds": .., "nanoseconds": ..}
        Value::Object(ts) => {
            let seconds = ts.get("seconds").and_then(Value::as_i64)?;
            let nanos = ts
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}

fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        Document {
            id: Uuid::new_v4(),
            created_at: None,
            updated_at: None,
            data,
        }
    }

    #[test]
    fn test_malformed_arrays_become_empty() {
        let record = PackageRecord::from_document(&doc(json!({
            "title": "Munnar Tea Trails",
            "highlights": null,
            "includes": "breakfast",
            "excludes": 42,
        })));
        assert!(record.highlights.is_empty());
        assert!(record.includes.is_empty());
        assert!(record.excludes.is_empty());
        assert!(record.itinerary.is_empty());
        assert!(record.images.is_empty());
    }

    #[test]
    fn test_non_string_entries_dropped() {
        let record = PackageRecord::from_document(&doc(json!({
            "highlights": ["Houseboat", 7, null, "Sunset"],
        })));
        assert_eq!(record.highlights, vec!["Houseboat", "Sunset"]);
    }

    #[test]
    fn test_unknown_enums_fall_back() {
        let record = PackageRecord::from_document(&doc(json!({
            "category": "space-tourism",
            "difficulty": "Extreme",
            "status": "archived",
        })));
        assert_eq!(record.category, None);
        assert_eq!(record.difficulty, Difficulty::Easy);
        assert_eq!(record.status, Status::Draft);
    }

    #[test]
    fn test_known_enums_parsed() {
        let record = PackageRecord::from_document(&doc(json!({
            "category": "hill-station",
            "difficulty": "Moderate",
            "status": "active",
        })));
        assert_eq!(record.category, Some(Category::HillStation));
        assert_eq!(record.difficulty, Difficulty::Moderate);
        assert_eq!(record.status, Status::Active);
    }

    #[test]
    fn test_price_accepts_numeric_strings() {
        let record = PackageRecord::from_document(&doc(json!({ "price": "15999" })));
        assert_eq!(record.price, Some(15999.0));
        let record = PackageRecord::from_document(&doc(json!({ "price": "" })));
        assert_eq!(record.price, None);
        let record = PackageRecord::from_document(&doc(json!({ "price": -10 })));
        assert_eq!(record.price, None);
    }

    #[test]
    fn test_itinerary_days_without_number_use_position() {
        let record = PackageRecord::from_document(&doc(json!({
            "itinerary": [
                { "title": "Arrival", "activities": ["Check-in"] },
                "garbage",
                { "day": 5, "title": "Alleppey" },
            ],
        })));
        assert_eq!(record.itinerary.len(), 2);
        assert_eq!(record.itinerary[0].day, 1);
        assert_eq!(record.itinerary[1].day, 5);
        assert!(record.itinerary[1].activities.is_empty());
    }

    #[test]
    fn test_created_at_fallback_chain() {
        let native = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut d = doc(json!({ "createdAt": "2020-01-01" }));
        d.created_at = Some(native);
        assert_eq!(PackageRecord::from_document(&d).created_at, native);

        let d = doc(json!({ "createdAt": "2020-01-01" }));
        assert_eq!(
            PackageRecord::from_document(&d).created_at.to_rfc3339(),
            "2020-01-01T00:00:00+00:00"
        );

        let d = doc(json!({ "createdAt": { "seconds": 1_700_000_000, "nanoseconds": 0 } }));
        assert_eq!(
            PackageRecord::from_document(&d).created_at.timestamp(),
            1_700_000_000
        );

        let d = doc(json!({ "createdAt": "not a date" }));
        assert_eq!(PackageRecord::from_document(&d).created_at.timestamp(), 0);
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let a = PackageRecord::from_document(&doc(json!({ "title": "a", "createdAt": "2024-01-01" })));
        let b = PackageRecord::from_document(&doc(json!({ "title": "b", "createdAt": "2024-01-01" })));
        let c = PackageRecord::from_document(&doc(json!({ "title": "c", "createdAt": "2025-01-01" })));
        let missing = PackageRecord::from_document(&doc(json!({ "title": "m" })));
        let mut records = vec![missing, a, c, b];
        sort_newest_first(&mut records);
        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b", "m"]);
    }

    #[test]
    fn test_fields_serialize_camel_case_without_identity() {
        let fields = PackageFields {
            title: "Kumarakom".into(),
            description: "Lakeside".into(),
            full_description: String::new(),
            duration: "2 Days".into(),
            location: "Kumarakom".into(),
            price: None,
            category: Some(Category::Backwaters),
            difficulty: Difficulty::Easy,
            status: Status::Draft,
            highlights: vec![],
            includes: vec![],
            excludes: vec![],
            itinerary: vec![],
            image: String::new(),
            images: vec![],
        };
        let data = fields.to_document_data().unwrap();
        assert_eq!(data["fullDescription"], json!(""));
        assert_eq!(data["category"], json!("backwaters"));
        assert_eq!(data["price"], Value::Null);
        assert!(!data.contains_key("id"));
        assert!(!data.contains_key("createdAt"));

        let whole = PackageFields { price: Some(15999.0), ..fields.clone() };
        assert_eq!(whole.to_document_data().unwrap()["price"], json!(15999));
        assert!(whole.to_document_data().unwrap()["price"].is_i64());
        let fractional = PackageFields { price: Some(12.5), ..fields };
        assert_eq!(fractional.to_document_data().unwrap()["price"], json!(12.5));
    }

    #[test]
    fn test_category_slugs_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_slug(category.slug()), Some(category));
        }
        assert_eq!(Category::from_slug("all"), None);
    }
}
