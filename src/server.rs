use crate::app_state::{ServiceConfig, ServiceState};
use crate::error::PredictError;
use actix_web::dev::Server;
use actix_web::{HttpRequest, HttpResponse, HttpServer, get, post, web};
use std::io::Write;

#[get("/")]
pub async fn home(_req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().body("API is running!")
}

#[post("/predict")]
pub async fn predict(
    _req: HttpRequest,
    payload: web::Payload,
    app_state: web::Data<ServiceState>,
) -> Result<HttpResponse, PredictError> {
    if !app_state.is_model_loaded() {
        return Err(PredictError::ModelUnavailable);
    }
    // Read the body here rather than through an extractor so an oversized
    // request still gets a JSON error body.
    let limit = app_state.max_payload_size;
    let body = payload
        .to_bytes_limited(limit)
        .await
        .map_err(|_| PredictError::PayloadTooLarge(limit))?
        .map_err(|e| PredictError::PredictionFailure(format!("failed to read body: {}", e)))?;
    let resp = app_state.predict(&body)?;
    Ok(HttpResponse::Ok().json(resp))
}

/// Install the global logger. Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: log::LevelFilter) {
    // RUST_LOG, when set, overrides the level given on the command line
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(home).service(predict);
}

/// Bind the listener and return the running server. actix handles SIGINT and
/// SIGTERM itself and drains in-flight requests before the future resolves.
pub fn build_server(config: ServiceConfig, state: ServiceState) -> std::io::Result<Server> {
    let app_state = web::Data::new(state);

    log::info!(
        "Starting server at {}:{} (model: {}, loaded: {})",
        config.host,
        config.port,
        app_state.model_path.display(),
        app_state.is_model_loaded()
    );

    let server = HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind((config.host, config.port))?
    .run();

    Ok(server)
}

pub async fn startup(config: ServiceConfig, state: ServiceState) -> std::io::Result<()> {
    build_server(config, state)?.await?;
    log::info!("Server stopped");
    std::io::Result::Ok(())
}
