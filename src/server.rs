//! Web server for the configurator API

use anyhow::Result;
use arc_swap::ArcSwap;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::catalog::ConfigurationCatalog;
use crate::config::TextureConfig;
use crate::error::Error;
use crate::faces::{self, Corner, Corners, Face, FaceSet, Point};
use crate::price_book;
use crate::pricing::{self, DesignState, PriceCategory, PriceSummary, SizeRow};
use crate::sheet::{self, ImportReport};
use crate::transform;

/// Shared application state
pub struct AppState {
    /// Configuration catalog (sizes, options)
    catalog: ConfigurationCatalog,
    /// Texture defaults and limits
    texture: TextureConfig,
    /// Live price book; readers take a snapshot, edits publish a new value
    price_book: ArcSwap<Vec<PriceCategory>>,
    /// Serializes read-modify-write edits of the price book
    edit_lock: Mutex<()>,
    /// Path to save the price book
    price_book_path: PathBuf,
}

impl AppState {
    pub fn new(
        catalog: ConfigurationCatalog,
        texture: TextureConfig,
        price_book: Vec<PriceCategory>,
        price_book_path: PathBuf,
    ) -> Self {
        Self {
            catalog,
            texture,
            price_book: ArcSwap::from_pointee(price_book),
            edit_lock: Mutex::new(()),
            price_book_path,
        }
    }

    /// Current price book snapshot
    pub fn price_book(&self) -> Arc<Vec<PriceCategory>> {
        self.price_book.load_full()
    }

    /// Apply an edit to the price book and publish the result
    fn edit_price_book<T>(
        &self,
        edit: impl FnOnce(&[PriceCategory]) -> Result<(Vec<PriceCategory>, T), Error>,
    ) -> Result<(Arc<Vec<PriceCategory>>, T), Error> {
        let _guard = self.edit_lock.lock();
        let current = self.price_book.load_full();
        let (next, extra) = edit(&current)?;
        let next = Arc::new(next);
        self.price_book.store(next.clone());
        Ok((next, extra))
    }

    /// Save the price book to file
    pub fn save_price_book(&self) -> Result<()> {
        let book = self.price_book();
        price_book::save(&book, &self.price_book_path)
    }
}

/// Error body returned by every failing endpoint
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type of the API handlers
enum ApiError {
    Core(Error),
    Internal(anyhow::Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(e) => {
                if e.is_lookup() {
                    warn!("Lookup failed: {}", e);
                }
                let status = match &e {
                    Error::MissingPriceItem { .. } | Error::WidthOutOfRange { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    Error::UnknownItem(_) => StatusCode::NOT_FOUND,
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    Error::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, e.to_string())
            }
            ApiError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/info", get(get_info))
        .route("/api/catalog", get(get_catalog))
        // Price book
        .route("/api/prices", get(get_prices).put(replace_prices))
        .route("/api/prices/item/:id", post(update_item))
        .route("/api/prices/reset", post(reset_prices))
        .route("/api/prices/save", post(save_prices))
        .route("/api/prices/export", get(export_prices))
        .route("/api/prices/import", post(import_prices))
        // Quotes
        .route("/api/quote", post(quote))
        .route("/api/quote/sizes", post(quote_sizes))
        // Texture extraction
        .route("/api/texture/faces", post(seed_faces))
        .route("/api/texture/faces/corner", post(move_corner))
        .route("/api/texture/extract", post(extract_texture))
        .layer(cors)
        .with_state(state)
}

/// Run the web server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// System information response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    version: String,
    categories: usize,
    items: usize,
    sizes: usize,
}

async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let book = state.price_book();

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        categories: book.len(),
        items: book.iter().map(|c| c.items.len()).sum(),
        sizes: state.catalog.sizes.len(),
    })
}

async fn get_catalog(State(state): State<Arc<AppState>>) -> Json<ConfigurationCatalog> {
    Json(state.catalog.clone())
}

async fn get_prices(State(state): State<Arc<AppState>>) -> Json<Vec<PriceCategory>> {
    Json(state.price_book().as_ref().clone())
}

/// Replace the whole price book
async fn replace_prices(
    State(state): State<Arc<AppState>>,
    Json(book): Json<Vec<PriceCategory>>,
) -> ApiResult<Json<Vec<PriceCategory>>> {
    let (book, _) = state.edit_price_book(|_| Ok((pricing::replace_price_book(book)?, ())))?;
    info!("Price book replaced ({} categories)", book.len());
    Ok(Json(book.as_ref().clone()))
}

/// Request to edit one item's formula
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemRequest {
    constant: f64,
    base_price: u64,
    #[serde(default)]
    formula_string: String,
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<Vec<PriceCategory>>> {
    if !req.constant.is_finite() {
        return Err(Error::validation("constant must be a finite number").into());
    }

    let (book, _) = state.edit_price_book(|current| {
        let next = pricing::update_item(
            current,
            &id,
            req.constant,
            req.base_price,
            &req.formula_string,
        )?;
        Ok((next, ()))
    })?;

    info!(
        "Updated price item {}: constant={} base={}",
        id, req.constant, req.base_price
    );
    Ok(Json(book.as_ref().clone()))
}

/// Reset the price book to the built-in defaults
async fn reset_prices(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PriceCategory>>> {
    let (book, _) = state.edit_price_book(|_| Ok((price_book::default_price_book(), ())))?;
    info!("Price book reset to defaults");
    Ok(Json(book.as_ref().clone()))
}

async fn save_prices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.save_price_book() {
        Ok(_) => (StatusCode::OK, "Saved").into_response(),
        Err(e) => ApiError::Internal(e).into_response(),
    }
}

/// Tabular form of the price book
#[derive(Serialize, Deserialize)]
struct SheetRows {
    rows: Vec<Vec<String>>,
}

async fn export_prices(State(state): State<Arc<AppState>>) -> Json<SheetRows> {
    Json(SheetRows {
        rows: sheet::export_rows(&state.price_book()),
    })
}

async fn import_prices(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SheetRows>,
) -> ApiResult<Json<ImportReport>> {
    let (_, report) = state.edit_price_book(|current| Ok(sheet::import_rows(current, &req.rows)))?;
    Ok(Json(report))
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Json(design): Json<DesignState>,
) -> ApiResult<Json<PriceSummary>> {
    let book = state.price_book();
    let summary = pricing::evaluate(&book, &state.catalog, &design)?;
    Ok(Json(summary))
}

async fn quote_sizes(
    State(state): State<Arc<AppState>>,
    Json(design): Json<DesignState>,
) -> ApiResult<Json<Vec<SizeRow>>> {
    let book = state.price_book();
    let rows = pricing::size_table(&book, &state.catalog, &design)?;
    debug!("Size table with {} rows", rows.len());
    Ok(Json(rows))
}

/// Normalize a vision detector reply into a face set
async fn seed_faces(body: String) -> ApiResult<Json<FaceSet>> {
    let faces = faces::parse_detection(&body)?;
    debug!("Seeded {} visible faces", faces.visible_count());
    Ok(Json(faces))
}

/// Manual corner correction
#[derive(Deserialize)]
struct MoveCornerRequest {
    faces: FaceSet,
    face: Face,
    corner: Corner,
    point: Point,
}

async fn move_corner(Json(req): Json<MoveCornerRequest>) -> Json<FaceSet> {
    let mut faces = req.faces;
    faces.set_corner(req.face, req.corner, req.point);
    Json(faces)
}

/// Texture extraction request; `image` is base64 or a data URL
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest {
    image: String,
    /// Whole image when omitted
    corners: Option<Corners>,
    output_width: Option<u32>,
    output_height: Option<u32>,
}

async fn extract_texture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<Response> {
    let out_w = req.output_width.unwrap_or(state.texture.output_width);
    let out_h = req.output_height.unwrap_or(state.texture.output_height);
    let max = state.texture.max_output_dimension;
    if out_w > max || out_h > max {
        return Err(Error::validation(format!(
            "output {}x{} exceeds the {} pixel limit",
            out_w, out_h, max
        ))
        .into());
    }

    let source = decode_image(&req.image)?;
    let (src_w, src_h) = source.dimensions();
    info!(
        "Extracting texture {}x{} from {}x{} source",
        out_w, out_h, src_w, src_h
    );

    // CPU bound; keep it off the async workers
    let corners = req.corners.unwrap_or_else(Corners::full);
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, Error> {
        let out = transform::resample(&source, &corners, src_w, src_h, out_w, out_h)?;
        encode_png(&out)
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    Ok(([(axum::http::header::CONTENT_TYPE, "image/png")], Bytes::from(png)).into_response())
}

/// Decode a base64 (optionally data URL) image to RGBA
fn decode_image(data: &str) -> Result<image::RgbaImage, Error> {
    let payload = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::invalid_image(format!("bad base64 payload: {}", e)))?;

    let img = image::load_from_memory(&bytes).map_err(|e| {
        warn!("Failed to decode uploaded image: {}", e);
        Error::invalid_image(e.to_string())
    })?;

    Ok(img.to_rgba8())
}

/// Encode RGBA data to PNG
fn encode_png(img: &image::RgbaImage) -> Result<Vec<u8>, Error> {
    use image::ImageOutputFormat;
    use std::io::Cursor;

    let mut png_data = Vec::new();
    let mut cursor = Cursor::new(&mut png_data);
    img.write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| Error::invalid_image(format!("failed to encode png: {}", e)))?;

    Ok(png_data)
}
