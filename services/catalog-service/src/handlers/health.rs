use axum::{extract::State, response::Json};
use bomwright_database::health_check;
use serde_json::{json, Value};

use crate::AppState;

pub async fn detailed_health_check(State(state): State<AppState>) -> Json<Value> {
    let mut health_status = json!({
        "status": "healthy",
        "service": "bomwright-catalog-service",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let sqlite_status = match health_check(&state.pool).await {
        Ok(_) => json!({"status": "healthy", "message": "Connected"}),
        Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
    };
    health_status["checks"]["sqlite"] = sqlite_status;

    let catalog_status = match state.store.count_parts().await {
        Ok(parts) => json!({"status": "healthy", "parts": parts}),
        Err(e) => json!({"status": "unhealthy", "message": e.to_string()}),
    };
    health_status["checks"]["catalog"] = catalog_status;

    let all_healthy = health_status["checks"]
        .as_object()
        .map(|checks| checks.values().all(|check| check["status"] == "healthy"))
        .unwrap_or(false);

    if !all_healthy {
        health_status["status"] = json!("degraded");
    }

    Json(health_status)
}
