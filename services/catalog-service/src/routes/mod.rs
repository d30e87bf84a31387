use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::{handlers::*, AppState};

pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health/detailed", get(detailed_health_check))
        .nest("/parts", part_routes())
        .nest("/imports", import_routes())
        .nest("/boms", bom_routes())
}

fn part_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search_parts))
        .route("/categories", get(category_options))
        .route("/:part_no", put(upsert_part).delete(delete_part))
}

fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_import))
        .route("/:id", get(get_import).delete(discard_import))
        .route("/:id/candidates/:index", patch(review_candidate))
        .route("/:id/commit", post(commit_import))
}

fn bom_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_boms).post(create_bom))
        .route("/:id/items", get(list_bom_items).post(bulk_add_items))
        .route(
            "/:id/items/:sequence",
            patch(update_bom_item_quantity).delete(remove_bom_item),
        )
        .route("/:id/total", get(bom_total))
        .route("/:id/export.csv", get(export_bom_csv))
}
