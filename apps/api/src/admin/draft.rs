//! Editable package draft.
//!
//! The draft mirrors the admin form: scalars are kept as typed (the price is a
//! string until submit) and list fields may hold blank rows. Every operation is
//! pure, returning a new draft or an error, so a failed edit never leaves a
//! half-applied draft behind. Nested itinerary edits go through the
//! `update_at` / `remove_at` helpers, addressed by index path.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::package::{
    Category, Difficulty, ItineraryDay, PackageFields, PackageRecord, Status,
};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("{path}: index {index} is out of bounds (length {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("A save is already in progress")]
    Busy,

    #[error("Package {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarField {
    Title,
    Description,
    FullDescription,
    Duration,
    Location,
    Price,
    Category,
    Difficulty,
    Status,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListField {
    Highlights,
    Includes,
    Excludes,
}

impl ListField {
    fn name(self) -> &'static str {
        match self {
            ListField::Highlights => "highlights",
            ListField::Includes => "includes",
            ListField::Excludes => "excludes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DayField {
    Title,
}

/// One edit, as sent by the admin screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DraftOp {
    SetField {
        field: ScalarField,
        value: String,
    },
    SetArrayItem {
        field: ListField,
        index: usize,
        value: String,
    },
    AddArrayItem {
        field: ListField,
    },
    RemoveArrayItem {
        field: ListField,
        index: usize,
    },
    AddItineraryDay,
    RemoveItineraryDay {
        index: usize,
    },
    SetItineraryDayField {
        day_index: usize,
        field: DayField,
        value: String,
    },
    AddItineraryActivity {
        day_index: usize,
    },
    SetItineraryActivity {
        day_index: usize,
        activity_index: usize,
        value: String,
    },
    RemoveItineraryActivity {
        day_index: usize,
        activity_index: usize,
    },
    AddImages {
        urls: Vec<String>,
    },
    RemoveImage {
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageDraft {
    pub title: String,
    pub description: String,
    pub full_description: String,
    pub duration: String,
    pub location: String,
    pub price: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub status: Status,
    pub highlights: Vec<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub itinerary: Vec<ItineraryDay>,
    pub image: String,
    pub images: Vec<String>,
}

/// A fresh "new package" form: one blank row per list, one blank day.
impl Default for PackageDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            full_description: String::new(),
            duration: String::new(),
            location: String::new(),
            price: String::new(),
            category: String::new(),
            difficulty: Difficulty::Easy,
            status: Status::Draft,
            highlights: vec![String::new()],
            includes: vec![String::new()],
            excludes: vec![String::new()],
            itinerary: vec![ItineraryDay::blank(1)],
            image: String::new(),
            images: Vec::new(),
        }
    }
}

impl PackageDraft {
    /// Draft for editing an existing record. Empty lists get a blank row so
    /// the form always has something to type into.
    pub fn from_record(record: &PackageRecord) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            full_description: record.full_description.clone(),
            duration: record.duration.clone(),
            location: record.location.clone(),
            price: record.price.map(|p| p.to_string()).unwrap_or_default(),
            category: record.category.map(|c| c.slug().to_string()).unwrap_or_default(),
            difficulty: record.difficulty,
            status: record.status,
            highlights: or_blank_row(&record.highlights),
            includes: or_blank_row(&record.includes),
            excludes: or_blank_row(&record.excludes),
            itinerary: if record.itinerary.is_empty() {
                vec![ItineraryDay::blank(1)]
            } else {
                record.itinerary.clone()
            },
            image: record.image.clone(),
            images: record.images.clone(),
        }
    }

    pub fn list(&self, field: ListField) -> &[String] {
        match field {
            ListField::Highlights => &self.highlights,
            ListField::Includes => &self.includes,
            ListField::Excludes => &self.excludes,
        }
    }

    fn with_list(&self, field: ListField, items: Vec<String>) -> Self {
        let mut next = self.clone();
        match field {
            ListField::Highlights => next.highlights = items,
            ListField::Includes => next.includes = items,
            ListField::Excludes => next.excludes = items,
        }
        next
    }

    fn with_itinerary(&self, itinerary: Vec<ItineraryDay>) -> Self {
        Self {
            itinerary,
            ..self.clone()
        }
    }

    pub fn set_field(&self, field: ScalarField, value: impl Into<String>) -> Result<Self, FormError> {
        let value = value.into();
        let mut next = self.clone();
        match field {
            ScalarField::Title => next.title = value,
            ScalarField::Description => next.description = value,
            ScalarField::FullDescription => next.full_description = value,
            ScalarField::Duration => next.duration = value,
            ScalarField::Location => next.location = value,
            ScalarField::Price => next.price = value,
            ScalarField::Category => next.category = value,
            ScalarField::Image => next.image = value,
            ScalarField::Difficulty => {
                next.difficulty = Difficulty::parse(&value).ok_or(FormError::InvalidValue {
                    field: "difficulty",
                    value,
                })?;
            }
            ScalarField::Status => {
                next.status = Status::parse(&value).ok_or(FormError::InvalidValue {
                    field: "status",
                    value,
                })?;
            }
        }
        Ok(next)
    }

    pub fn set_array_item(
        &self,
        field: ListField,
        index: usize,
        value: impl Into<String>,
    ) -> Result<Self, FormError> {
        let value = value.into();
        let items = update_at(self.list(field), index, field.name(), |_| Ok(value))?;
        Ok(self.with_list(field, items))
    }

    /// Appends a blank row.
    pub fn add_array_item(&self, field: ListField) -> Self {
        let mut items = self.list(field).to_vec();
        items.push(String::new());
        self.with_list(field, items)
    }

    pub fn remove_array_item(&self, field: ListField, index: usize) -> Result<Self, FormError> {
        let items = remove_at(self.list(field), index, field.name())?;
        Ok(self.with_list(field, items))
    }

    /// Appends a blank day numbered after the current last position.
    pub fn add_itinerary_day(&self) -> Self {
        let mut itinerary = self.itinerary.clone();
        itinerary.push(ItineraryDay::blank(itinerary.len() as u32 + 1));
        self.with_itinerary(itinerary)
    }

    /// Remaining days keep their numbers until the draft is normalized.
    pub fn remove_itinerary_day(&self, index: usize) -> Result<Self, FormError> {
        let itinerary = remove_at(&self.itinerary, index, "itinerary")?;
        Ok(self.with_itinerary(itinerary))
    }

    pub fn set_itinerary_day_field(
        &self,
        day_index: usize,
        field: DayField,
        value: impl Into<String>,
    ) -> Result<Self, FormError> {
        let value = value.into();
        let itinerary = update_at(&self.itinerary, day_index, "itinerary", |day| {
            let mut day = day.clone();
            match field {
                DayField::Title => day.title = value,
            }
            Ok(day)
        })?;
        Ok(self.with_itinerary(itinerary))
    }

    pub fn add_itinerary_activity(&self, day_index: usize) -> Result<Self, FormError> {
        let itinerary = update_at(&self.itinerary, day_index, "itinerary", |day| {
            let mut day = day.clone();
            day.activities.push(String::new());
            Ok(day)
        })?;
        Ok(self.with_itinerary(itinerary))
    }

    pub fn set_itinerary_activity(
        &self,
        day_index: usize,
        activity_index: usize,
        value: impl Into<String>,
    ) -> Result<Self, FormError> {
        let value = value.into();
        let itinerary = update_at(&self.itinerary, day_index, "itinerary", |day| {
            let path = format!("itinerary[{day_index}].activities");
            let activities = update_at(&day.activities, activity_index, &path, |_| Ok(value))?;
            Ok(ItineraryDay {
                activities,
                ..day.clone()
            })
        })?;
        Ok(self.with_itinerary(itinerary))
    }

    pub fn remove_itinerary_activity(
        &self,
        day_index: usize,
        activity_index: usize,
    ) -> Result<Self, FormError> {
        let itinerary = update_at(&self.itinerary, day_index, "itinerary", |day| {
            let path = format!("itinerary[{day_index}].activities");
            let activities = remove_at(&day.activities, activity_index, &path)?;
            Ok(ItineraryDay {
                activities,
                ..day.clone()
            })
        })?;
        Ok(self.with_itinerary(itinerary))
    }

    /// Appends uploaded gallery URLs.
    pub fn add_images(&self, urls: &[String]) -> Self {
        let mut images = self.images.clone();
        images.extend(urls.iter().cloned());
        Self {
            images,
            ..self.clone()
        }
    }

    pub fn remove_image(&self, index: usize) -> Result<Self, FormError> {
        let images = remove_at(&self.images, index, "images")?;
        Ok(Self {
            images,
            ..self.clone()
        })
    }

    pub fn apply(&self, op: &DraftOp) -> Result<Self, FormError> {
        match op {
            DraftOp::SetField { field, value } => self.set_field(*field, value.as_str()),
            DraftOp::SetArrayItem {
                field,
                index,
                value,
            } => self.set_array_item(*field, *index, value.as_str()),
            DraftOp::AddArrayItem { field } => Ok(self.add_array_item(*field)),
            DraftOp::RemoveArrayItem { field, index } => self.remove_array_item(*field, *index),
            DraftOp::AddItineraryDay => Ok(self.add_itinerary_day()),
            DraftOp::RemoveItineraryDay { index } => self.remove_itinerary_day(*index),
            DraftOp::SetItineraryDayField {
                day_index,
                field,
                value,
            } => self.set_itinerary_day_field(*day_index, *field, value.as_str()),
            DraftOp::AddItineraryActivity { day_index } => self.add_itinerary_activity(*day_index),
            DraftOp::SetItineraryActivity {
                day_index,
                activity_index,
                value,
            } => self.set_itinerary_activity(*day_index, *activity_index, value.as_str()),
            DraftOp::RemoveItineraryActivity {
                day_index,
                activity_index,
            } => self.remove_itinerary_activity(*day_index, *activity_index),
            DraftOp::AddImages { urls } => Ok(self.add_images(urls)),
            DraftOp::RemoveImage { index } => self.remove_image(*index),
        }
    }

    /// Applies ops in order. Either all succeed or the original draft stands.
    pub fn apply_all(&self, ops: &[DraftOp]) -> Result<Self, FormError> {
        ops.iter()
            .try_fold(self.clone(), |draft, op| draft.apply(op))
    }

    /// Checks the fields a package cannot be saved without.
    pub fn validate(&self) -> Result<(), FormError> {
        let mut problems = Vec::new();
        for (name, value) in [
            ("title", &self.title),
            ("duration", &self.duration),
            ("location", &self.location),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{name} is required"));
            }
        }
        if let Err(FormError::Validation(mut more)) = self.parsed_category() {
            problems.append(&mut more);
        }
        if let Err(FormError::Validation(mut more)) = coerce_price(&self.price) {
            problems.append(&mut more);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FormError::Validation(problems))
        }
    }

    /// Validates and produces the field set to store: text trimmed, blank list
    /// rows dropped, itinerary compacted and renumbered, price coerced.
    pub fn to_fields(&self) -> Result<PackageFields, FormError> {
        self.validate()?;
        Ok(PackageFields {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            full_description: self.full_description.trim().to_string(),
            duration: self.duration.trim().to_string(),
            location: self.location.trim().to_string(),
            price: coerce_price(&self.price)?,
            category: self.parsed_category()?,
            difficulty: self.difficulty,
            status: self.status,
            highlights: normalize_list(&self.highlights),
            includes: normalize_list(&self.includes),
            excludes: normalize_list(&self.excludes),
            itinerary: normalize_itinerary(&self.itinerary),
            image: self.image.trim().to_string(),
            images: normalize_list(&self.images),
        })
    }

    fn parsed_category(&self) -> Result<Option<Category>, FormError> {
        let slug = self.category.trim();
        if slug.is_empty() {
            return Ok(None);
        }
        Category::from_slug(slug)
            .map(Some)
            .ok_or_else(|| FormError::Validation(vec![format!("unknown category '{slug}'")]))
    }
}

/// Trims every entry and drops the blank ones.
pub fn normalize_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Drops days with neither a title nor a non-blank activity, then renumbers
/// the survivors 1..N in order.
pub fn normalize_itinerary(days: &[ItineraryDay]) -> Vec<ItineraryDay> {
    days.iter()
        .filter(|day| {
            !day.title.trim().is_empty() || day.activities.iter().any(|a| !a.trim().is_empty())
        })
        .enumerate()
        .map(|(position, day)| ItineraryDay {
            day: position as u32 + 1,
            title: day.title.trim().to_string(),
            activities: normalize_list(&day.activities),
        })
        .collect()
}

/// Blank → `None`; unparseable or non-finite → `None`; negative → error.
pub fn coerce_price(raw: &str) -> Result<Option<f64>, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(price) if !price.is_finite() => Ok(None),
        Ok(price) if price < 0.0 => Err(FormError::Validation(vec![
            "price cannot be negative".to_string(),
        ])),
        Ok(price) => Ok(Some(price)),
        Err(_) => Ok(None),
    }
}

fn or_blank_row(items: &[String]) -> Vec<String> {
    if items.is_empty() {
        vec![String::new()]
    } else {
        items.to_vec()
    }
}

/// Replaces the element at `index` with `f(element)`.
fn update_at<T: Clone>(
    items: &[T],
    index: usize,
    path: &str,
    f: impl FnOnce(&T) -> Result<T, FormError>,
) -> Result<Vec<T>, FormError> {
    let current = items.get(index).ok_or_else(|| out_of_bounds(path, index, items.len()))?;
    let replacement = f(current)?;
    let mut next = items.to_vec();
    next[index] = replacement;
    Ok(next)
}

fn remove_at<T: Clone>(items: &[T], index: usize, path: &str) -> Result<Vec<T>, FormError> {
    if index >= items.len() {
        return Err(out_of_bounds(path, index, items.len()));
    }
    let mut next = items.to_vec();
    next.remove(index);
    Ok(next)
}

fn out_of_bounds(path: &str, index: usize, len: usize) -> FormError {
    FormError::IndexOutOfBounds {
        path: path.to_string(),
        index,
        len,
    }
}
