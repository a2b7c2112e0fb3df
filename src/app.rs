//! app.rs
use crate::handlers::status_handler;
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/metrics", web::get().to(status_handler::metrics_endpoint))
            .service(
                web::scope("/operations")
                    // "/blocked" antes que "/{event_id}"
                    .route(
                        "/blocked",
                        web::get().to(status_handler::blocked_operations_endpoint),
                    )
                    .route(
                        "/{event_id}",
                        web::get().to(status_handler::event_operations_endpoint),
                    ),
            ),
    );
}
