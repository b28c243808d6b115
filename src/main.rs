mod certificate;
mod config;
mod db;
mod routes;
mod state;
mod storage;
mod watcher;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catedra=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    // Certificates cannot be issued without the template asset; refuse to
    // start without it rather than fail on the first completion.
    if !config.template_path.exists() {
        return Err(format!(
            "certificate template not found at {}",
            config.template_path.display()
        )
        .into());
    }

    let objects = Arc::new(storage::FsObjectStore::new(
        config.storage_root.clone(),
        config.public_base_url.clone(),
        config.url_signing_secret.clone(),
    ));
    objects.ensure_root()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let renderer = certificate::CertificateRenderer::new(config.template_path.clone());
    let records = Arc::new(db::PgRecordStore::new(pool.clone()));
    let pipeline = Arc::new(watcher::CertificatePipeline::new(
        records,
        objects.clone(),
        renderer.clone(),
    ));

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        objects,
        renderer,
        pipeline,
    });

    let app = Router::new()
        .route("/api/courses", get(routes::list_courses))
        .route("/api/courses/:course_id", get(routes::course_detail))
        .route(
            "/api/students/:student_id/enrollments",
            get(routes::list_enrollments).post(routes::enroll),
        )
        .route(
            "/api/students/:student_id/courses/:course_id/lessons/:lesson/complete",
            post(routes::complete_lesson),
        )
        .route(
            "/api/students/:student_id/courses/:course_id/position",
            post(routes::save_position),
        )
        .route(
            "/api/students/:student_id/courses/:course_id/certificate",
            get(routes::download_certificate),
        )
        .route("/files/*key", get(routes::serve_object))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Catedra listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
