use actix_web::web;

use super::handlers;

/// Register every REST route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error))
        .route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api")
                .route("/chat", web::post().to(handlers::chat))
                .route("/chat/guest", web::post().to(handlers::guest_chat))
                .route("/chat/health", web::get().to(handlers::chat_health))
                .service(
                    web::scope("/records")
                        .route("/summary", web::post().to(handlers::record_summary))
                        .route("/vitals", web::post().to(handlers::record_vitals))
                        .route("/prescriptions", web::post().to(handlers::record_prescriptions)),
                )
                .route("/session/{session_id}", web::delete().to(handlers::clear_session))
                .service(
                    web::scope("/patients")
                        .route("", web::post().to(handlers::create_patient))
                        .route("", web::get().to(handlers::list_patients))
                        .route("/search", web::get().to(handlers::search_patients))
                        .route("/{patient_id}", web::get().to(handlers::get_patient))
                        .route("/{patient_id}", web::put().to(handlers::update_patient))
                        .route("/{patient_id}", web::delete().to(handlers::delete_patient))
                        .route("/{patient_id}/vitals", web::post().to(handlers::record_vital))
                        .route("/{patient_id}/vitals", web::get().to(handlers::list_vitals)),
                )
                .service(
                    web::scope("/medical-history")
                        .route("", web::post().to(handlers::create_history))
                        .route("/patient/{patient_id}", web::get().to(handlers::patient_history))
                        .route("/{history_id}", web::get().to(handlers::get_history))
                        .route("/{history_id}", web::put().to(handlers::update_history))
                        .route("/{history_id}", web::delete().to(handlers::delete_history)),
                ),
        );
}
