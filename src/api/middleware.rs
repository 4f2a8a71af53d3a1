use actix_cors::Cors;
use actix_web::http::header;

use crate::config::ServerConfig;

/// CORS policy for the configured frontend origins.
pub fn cors(config: &ServerConfig) -> Cors {
    let cors = config
        .cors_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .supports_credentials()
        .max_age(3600)
}
