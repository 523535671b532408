use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::filter::{categories, filter_packages, CategoryFilter, CategoryOption};
use crate::catalog::live::{load_snapshot, subscribe, CatalogQuery};
use crate::catalog::snapshot_sse;
use crate::contact::{
    booking_message, whatsapp_link, ContactLink, CUSTOM_PACKAGE_ENQUIRY, GENERAL_ENQUIRY,
};
use crate::errors::AppError;
use crate::models::package::{PackageRecord, Status};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl CatalogParams {
    fn parse(self) -> Result<(CategoryFilter, String), AppError> {
        let category = self
            .category
            .as_deref()
            .unwrap_or_default()
            .parse::<CategoryFilter>()
            .map_err(AppError::Validation)?;
        Ok((category, self.search.unwrap_or_default()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageListResponse {
    pub packages: Vec<PackageRecord>,
    /// Size of the unfiltered set, for "showing N of M".
    pub total: usize,
}

impl PackageListResponse {
    fn filtered(records: Vec<PackageRecord>, category: CategoryFilter, search: &str) -> Self {
        Self {
            total: records.len(),
            packages: filter_packages(&records, category, search),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetailResponse {
    pub package: PackageRecord,
    pub booking: ContactLink,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub general: ContactLink,
    pub custom_package: ContactLink,
}

/// GET /api/v1/categories
pub async fn handle_categories() -> Json<Vec<CategoryOption>> {
    Json(categories())
}

/// GET /api/v1/packages
pub async fn handle_list_packages(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<PackageListResponse>, AppError> {
    let (category, search) = params.parse()?;
    let records = load_snapshot(state.store.as_ref(), &CatalogQuery::public()).await?;
    Ok(Json(PackageListResponse::filtered(records, category, &search)))
}

/// GET /api/v1/packages/featured
pub async fn handle_featured_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<PackageRecord>>, AppError> {
    Ok(Json(
        load_snapshot(state.store.as_ref(), &CatalogQuery::featured()).await?,
    ))
}

/// GET /api/v1/packages/stream
/// Server-sent `snapshot` events, re-filtered on every change.
pub async fn handle_stream_packages(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (category, search) = params.parse()?;
    let subscription = subscribe(state.store.clone(), CatalogQuery::public());
    Ok(snapshot_sse(subscription, move |records| {
        PackageListResponse::filtered(records, category, &search)
    }))
}

/// GET /api/v1/packages/:id
/// Only active packages are public; anything else is indistinguishable from
/// a missing id.
pub async fn handle_get_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PackageDetailResponse>, AppError> {
    let not_found = || AppError::NotFound("Package not found".to_string());

    let id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;
    let document = state.store.get(id).await?.ok_or_else(not_found)?;
    let package = PackageRecord::from_document(&document);
    if package.status != Status::Active {
        return Err(not_found());
    }

    let booking = whatsapp_link(
        state.whatsapp_number.as_deref(),
        &booking_message(&package.title),
    );
    Ok(Json(PackageDetailResponse { package, booking }))
}

/// GET /api/v1/contact
pub async fn handle_contact(State(state): State<AppState>) -> Json<ContactResponse> {
    let phone = state.whatsapp_number.as_deref();
    Json(ContactResponse {
        general: whatsapp_link(phone, GENERAL_ENQUIRY),
        custom_package: whatsapp_link(phone, CUSTOM_PACKAGE_ENQUIRY),
    })
}
