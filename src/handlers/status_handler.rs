//! handlers/status_handler.rs
//! API de solo lectura: métricas y estado de operaciones.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::operation_model::OperationName;
use crate::services::metrics_service::DispatchMetrics;
use crate::services::operation_service::OperationService;

/// Umbral de bloqueo vigente, compartido con los handlers.
#[derive(Debug, Clone, Copy)]
pub struct BlockThreshold(pub u32);

/// GET /api/metrics
pub async fn metrics_endpoint(metrics: web::Data<DispatchMetrics>) -> HttpResponse {
    HttpResponse::Ok().json(metrics.snapshot())
}

/// GET /api/operations/blocked
pub async fn blocked_operations_endpoint(
    op_service: web::Data<OperationService>,
    threshold: web::Data<BlockThreshold>,
) -> HttpResponse {
    match op_service.list_blocked(threshold.0).await {
        Ok(list) => HttpResponse::Ok().json(json!({
            "total": list.len(),
            "operations": list
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Internal server error",
            "details": format!("{:?}", e)
        })),
    }
}

/// GET /api/operations/{event_id}
pub async fn event_operations_endpoint(
    op_service: web::Data<OperationService>,
    threshold: web::Data<BlockThreshold>,
    path: web::Path<i64>,
) -> HttpResponse {
    let event_id = path.into_inner();

    let operations = match op_service.list_for_event(event_id).await {
        Ok(list) => list,
        Err(e) => {
            return HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error",
                "details": format!("{:?}", e)
            }))
        }
    };

    if operations.is_empty() {
        return HttpResponse::NotFound().json(json!({
            "error": "Operation not found",
            "details": format!("Sin operaciones para la transacción {}", event_id)
        }));
    }

    let history = op_service
        .failure_history(event_id, OperationName::ApiProexsi)
        .await
        .unwrap_or_else(|e| {
            log::warn!("(event_operations_endpoint) historial no disponible: {:?}", e);
            Vec::new()
        });

    let operations: Vec<_> = operations
        .into_iter()
        .map(|record| {
            let blocked = record.operation.has_circuit_breaker() && record.is_blocked(threshold.0);
            json!({
                "operation": record.operation,
                "completed": record.completed,
                "attempts": record.attempts,
                "last_error": record.last_error,
                "blocked": blocked,
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "event_id": event_id,
        "operations": operations,
        "proexsi_failures": history
    }))
}
