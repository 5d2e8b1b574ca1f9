use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use bazaar_db::models::{ListingRow, NewListing};
use bazaar_db::{ListingFilter, SortSpec};
use bazaar_types::api::{CreateListingRequest, ListingPatch};
use bazaar_types::models::{Condition, Listing};

use crate::auth::AppState;
use crate::error::{ApiError, join_blocking};
use crate::extract::Auth;
use crate::pagination::{self, DEFAULT_PAGE_SIZE};
use crate::parse_created_at;

const LISTINGS_PATH: &str = "/api/listings";

/// Everything the listing list endpoint accepts, parsed and validated
/// before any query executes. `base_params` keeps the original pairs
/// (minus `page`) for pagination links.
#[derive(Debug)]
struct ListingQuery {
    filters: Vec<ListingFilter>,
    search: Option<String>,
    sort: Option<SortSpec>,
    page: usize,
    page_size: usize,
    base_params: Vec<(String, String)>,
}

fn parse_listing_query(pairs: &[(String, String)]) -> Result<ListingQuery, ApiError> {
    let mut parsed = ListingQuery {
        filters: Vec::new(),
        search: None,
        sort: None,
        page: 1,
        page_size: DEFAULT_PAGE_SIZE,
        base_params: Vec::new(),
    };

    for (key, value) in pairs {
        match key.as_str() {
            "search" => parsed.search = Some(value.clone()),
            "ordering" => parsed.sort = Some(value.parse::<SortSpec>()?),
            "page" => {
                parsed.page = value.parse().map_err(|_| {
                    ApiError::Validation(format!("Invalid page number: {value}"))
                })?;
                // Links regenerate this one
                continue;
            }
            "page_size" => {
                parsed.page_size = value.parse().map_err(|_| {
                    ApiError::Validation(format!("Invalid page_size: {value}"))
                })?;
            }
            _ => parsed
                .filters
                .push(ListingFilter::from_key_value(key, value)?),
        }
        parsed.base_params.push((key.clone(), value.clone()));
    }

    Ok(parsed)
}

/// GET /api/listings — public, filtered/searched/ordered, paginated.
pub async fn list_listings(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = parse_listing_query(&pairs)?;

    let db = state.clone();
    let filters = query.filters;
    let search = query.search;
    let sort = query.sort;
    let rows = join_blocking(
        tokio::task::spawn_blocking(move || {
            db.db.list_listings(&filters, search.as_deref(), sort)
        })
        .await,
    )?;

    let listings: Vec<Listing> = rows
        .into_iter()
        .map(|row| to_listing(row, &state.media_url))
        .collect();

    let page = pagination::paginate(
        listings,
        query.page,
        query.page_size,
        LISTINGS_PATH,
        &query.base_params,
    )?;
    Ok(Json(page))
}

/// GET /api/listings/{id} — public.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_listing_by_id(listing_id)?
        .ok_or(ApiError::NotFound("Listing with that id not found."))?;

    Ok(Json(to_listing(row, &state.media_url)))
}

/// POST /api/listings — author is the caller; likes/dislikes start at
/// zero and the store assigns the timestamp.
pub async fn create_listing(
    State(state): State<AppState>,
    Auth(claims): Auth,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_title(&req.title)?;
    validate_description(&req.description)?;
    validate_price(req.price)?;
    validate_tags(&req.tags)?;
    if req.image.is_empty() {
        return Err(ApiError::Validation("image is required.".into()));
    }

    let db = state.clone();
    let author_id = claims.sub;
    let row = join_blocking(
        tokio::task::spawn_blocking(move || {
            let id = db.db.create_listing(
                &NewListing {
                    title: &req.title,
                    condition: req.condition.as_str(),
                    description: &req.description,
                    price: req.price,
                    image: &req.image,
                    tags: &req.tags,
                },
                author_id,
            )?;
            db.db
                .get_listing_by_id(id)?
                .ok_or_else(|| anyhow::anyhow!("listing {id} vanished after insert"))
        })
        .await,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(to_listing(row, &state.media_url)),
    ))
}

/// PATCH /api/listings/{id} — owner only. The body must be a non-empty
/// JSON object; keys naming immutable fields are stripped, not applied.
pub async fn update_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(claims): Auth,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .db
        .get_listing_by_id(listing_id)?
        .ok_or(ApiError::NotFound("Listing with that id not found."))?;
    if existing.author_id != claims.sub {
        return Err(ApiError::Forbidden);
    }

    let patch = parse_patch_body::<ListingPatch>(body)?;

    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(description) = &patch.description {
        validate_description(description)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    if let Some(tags) = &patch.tags {
        validate_tags(tags)?;
    }

    let db = state.clone();
    join_blocking(
        tokio::task::spawn_blocking(move || db.db.partial_update_listing(listing_id, &patch))
            .await,
    )?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/listings/{id} — owner only.
pub async fn delete_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state
        .db
        .get_listing_by_id(listing_id)?
        .ok_or(ApiError::NotFound("Listing with that id not found."))?;
    if existing.author_id != claims.sub {
        return Err(ApiError::Forbidden);
    }

    state.db.delete_listing(listing_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/listings/{id}/like — any authenticated user, not
/// ownership-gated. The increment is atomic at the store level.
pub async fn like_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(_claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.like_listing(listing_id)? {
        return Err(ApiError::NotFound("Listing with that id not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/listings/{id}/dislike
pub async fn dislike_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(_claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.dislike_listing(listing_id)? {
        return Err(ApiError::NotFound("Listing with that id not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/listings/{id}/favorite — idempotent.
pub async fn favorite_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_listing_by_id(listing_id)?.is_none() {
        return Err(ApiError::NotFound("Listing with that id not found."));
    }
    state.db.add_favorite(claims.sub, listing_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/listings/{id}/unfavorite — removing a listing that was never
/// favorited still succeeds.
pub async fn unfavorite_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_listing_by_id(listing_id)?.is_none() {
        return Err(ApiError::NotFound("Listing with that id not found."));
    }
    state.db.remove_favorite(claims.sub, listing_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/listings/favorites — the caller's saved listings.
pub async fn list_favorites(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub;
    let rows = join_blocking(
        tokio::task::spawn_blocking(move || db.db.favorite_listings(user_id)).await,
    )?;

    let listings: Vec<Listing> = rows
        .into_iter()
        .map(|row| to_listing(row, &state.media_url))
        .collect();
    Ok(Json(listings))
}

/// Deserializes a partial-update body, rejecting anything that is not a
/// non-empty JSON object. Unknown and immutable keys are stripped by the
/// patch type itself.
pub(crate) fn parse_patch_body<T: serde::de::DeserializeOwned>(
    body: serde_json::Value,
) -> Result<T, ApiError> {
    match &body {
        serde_json::Value::Object(map) if !map.is_empty() => {}
        _ => {
            return Err(ApiError::Validation(
                "Request body must be a non-empty JSON object.".into(),
            ));
        }
    }
    serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))
}

pub(crate) fn to_listing(row: ListingRow, media_url: &str) -> Listing {
    let condition = Condition::parse(&row.condition).unwrap_or_else(|| {
        warn!("Corrupt condition '{}' on listing {}", row.condition, row.id);
        Condition::Fair
    });

    Listing {
        id: row.id,
        title: row.title,
        condition,
        description: row.description,
        price: row.price,
        image: format!("{}{}", media_url, row.image),
        likes: row.likes,
        dislikes: row.dislikes,
        tags: row.tags,
        created_at: parse_created_at(&row.created_at, "listing", row.id),
        author_id: row.author_id,
    }
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() || title.chars().count() > 50 {
        return Err(ApiError::Validation("title must be 1-50 characters.".into()));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() > 500 {
        return Err(ApiError::Validation(
            "description must be at most 500 characters.".into(),
        ));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::Validation(
            "price must be a non-negative number.".into(),
        ));
    }
    Ok(())
}

/// Tag names join the shared vocabulary; commas are reserved because the
/// tag list travels through GROUP_CONCAT on the way back out.
fn validate_tags(tags: &[String]) -> Result<(), ApiError> {
    for tag in tags {
        if tag.is_empty() || tag.chars().count() > 50 {
            return Err(ApiError::Validation(
                "tags must be 1-50 characters.".into(),
            ));
        }
        if tag.contains(',') {
            return Err(ApiError::Validation(
                "tags may not contain commas.".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_filters_search_ordering_and_paging() {
        let query = parse_listing_query(&pairs(&[
            ("min_price", "10"),
            ("condition", "Fair"),
            ("search", "chair"),
            ("ordering", "-likes"),
            ("page", "3"),
            ("page_size", "25"),
        ]))
        .unwrap();

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.search.as_deref(), Some("chair"));
        assert!(query.sort.unwrap().descending);
        assert_eq!(query.page, 3);
        assert_eq!(query.page_size, 25);
        // page is regenerated by the paginator, everything else survives
        assert!(query.base_params.iter().all(|(k, _)| k != "page"));
        assert_eq!(query.base_params.len(), 5);
    }

    #[test]
    fn unknown_query_key_is_a_client_error() {
        let err = parse_listing_query(&pairs(&[("color", "red")])).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn bogus_ordering_is_rejected_before_any_query() {
        let err = parse_listing_query(&pairs(&[("ordering", "bogus_field")])).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn patch_body_must_be_a_non_empty_object() {
        assert!(parse_patch_body::<ListingPatch>(serde_json::json!({})).is_err());
        assert!(parse_patch_body::<ListingPatch>(serde_json::json!([1, 2])).is_err());
        assert!(parse_patch_body::<ListingPatch>(serde_json::json!(null)).is_err());
    }

    #[test]
    fn patch_strips_server_controlled_fields() {
        let patch: ListingPatch = parse_patch_body(serde_json::json!({
            "likes": 999,
            "author_id": 1,
            "created_at": "2020-01-01",
            "id": 7,
        }))
        .unwrap();
        // Nothing mutable was named, so the patch is an effective no-op
        assert!(patch.is_empty());
    }

    #[test]
    fn patch_keeps_mutable_fields() {
        let patch: ListingPatch = parse_patch_body(serde_json::json!({
            "price": 40.0,
            "likes": 999,
        }))
        .unwrap();
        assert_eq!(patch.price, Some(40.0));
        assert!(patch.title.is_none());
    }

    #[test]
    fn comma_in_tag_is_rejected() {
        assert!(validate_tags(&["a,b".to_string()]).is_err());
        assert!(validate_tags(&["plain".to_string()]).is_ok());
    }

    #[test]
    fn media_url_prefix_is_applied() {
        let row = ListingRow {
            id: 1,
            title: "Chair".into(),
            condition: "Fair".into(),
            description: String::new(),
            price: 1.0,
            image: "chair.jpg".into(),
            likes: 0,
            dislikes: 0,
            author_id: 1,
            created_at: "2024-05-01 12:00:00".into(),
            tags: vec![],
        };
        let listing = to_listing(row, "/media/");
        assert_eq!(listing.image, "/media/chair.jpg");
        assert_eq!(listing.condition, Condition::Fair);
    }
}
