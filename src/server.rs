use actix_cors::Cors;
use actix_web::{dev::Server, http::header, middleware, web, App, HttpServer};

use crate::{
    configuration::{AppState, State},
    controller::{chain_stats, explorer, misc},
    error::Error,
};

/// Provenance and echo headers set by the chain stats route.
pub const EXPOSED_HEADERS: [&str; 8] = [
    chain_stats::DATA_SOURCE_HEADER,
    "X-Cache-Timestamp",
    "X-Fetch-Duration",
    "X-Chain-Id",
    "X-Time-Range",
    "X-Start-Timestamp",
    "X-End-Timestamp",
    "X-Metrics",
];

pub async fn server_task(app_state: &AppState<State>) -> Result<(), Error> {
    let app = app_state.clone();
    tokio::spawn(async move {
        let server = init_server(app)?;
        server.await?;
        Ok(())
    })
    .await?
}

fn init_server(app_state: AppState<State>) -> Result<Server, Error> {
    let host = app_state.config.server_host.to_owned();
    let port = app_state.config.port;

    let server = HttpServer::new(move || {
        let cors = cors(app_state.clone());

        App::new()
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(app_state.clone()))
            .service(
                web::scope("/api")
                    .service(chain_stats::chain_stats)
                    .service(explorer::explorer)
                    .service(misc::chains)
                    .service(misc::version),
            )
    })
    .bind((host, port))?
    .disable_signals()
    .run();
    Ok(server)
}

fn cors(app: AppState<State>) -> Cors {
    let allowed_cors = String::from("*");
    let cors_access_all = app.config.allowed_origins.contains(&allowed_cors);

    Cors::default()
        .allowed_origin_fn(move |origin, _| {
            if cors_access_all {
                return true;
            }
            let allowed = &app.config.allowed_origins;
            if let Ok(origin) = origin.to_str() {
                return allowed.contains(&origin.to_owned());
            }
            false
        })
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
        .expose_headers(EXPOSED_HEADERS)
}
