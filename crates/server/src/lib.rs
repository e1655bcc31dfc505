//! HTTP Backend Server
//!
//! Assembles the authentication and settings routes behind CORS,
//! request logging, and per-client rate limiting.
//!
//! ## Submodules
//!
//! - [`config`] — Command line and environment configuration
//! - [`limiter`] — Per-client token buckets
mod config;
mod limiter;

pub use config::*;
pub use limiter::*;

use actix_cors::Cors;
use actix_web::App;
use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::middleware::Logger;
use actix_web::middleware::Next;
use actix_web::middleware::from_fn;
use actix_web::web;
use sk_auth::Envelope;
use sk_auth::Frontend;
use sk_auth::Identity;
use sk_auth::Member;
use sk_auth::Sessions;
use sk_database::Postgres;
use std::sync::Arc;
use std::time::Instant;

/// Client key for rate limiting: the first `X-Forwarded-For` entry,
/// otherwise the peer IP.
fn client(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
}

/// Rejects clients that exceed their token bucket with 429.
pub async fn throttle(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(limiter) = req.app_data::<web::Data<Limiter>>().cloned() else {
        return next.call(req).await.map(ServiceResponse::map_into_boxed_body);
    };
    match client(&req) {
        None => {
            log::error!("could not determine client address for {}", req.path());
            Ok(req.into_response(
                HttpResponse::InternalServerError()
                    .json(Envelope::<()>::failure("Could not determine client IP")),
            ))
        }
        Some(key) if !limiter.allow(&key, Instant::now()) => {
            log::debug!("rate limited {}", key);
            Ok(req.into_response(
                HttpResponse::TooManyRequests()
                    .json(Envelope::<()>::failure("Too many requests, please try again later")),
            ))
        }
        Some(_) => next.call(req).await.map(ServiceResponse::map_into_boxed_body),
    }
}

async fn health(db: web::Data<Postgres>) -> HttpResponse {
    match db
        .ping()
        .await
        .inspect_err(|e| log::error!("health check failed: {}", e))
    {
        Ok(()) => HttpResponse::Ok().body("OK"),
        Err(_) => HttpResponse::ServiceUnavailable().body("database unavailable"),
    }
}

#[rustfmt::skip]
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let providers = config.providers()?;
    log::info!("oauth providers: [{}]", providers.names().collect::<Vec<_>>().join(", "));
    let db = Postgres::new(config.db_url.clone(), config.pool);
    db.migrate::<Member>().await?;
    db.migrate::<Identity>().await?;
    let limiter = Arc::new(Limiter::new(config.rate, config.burst));
    limiter.clone().spawn();
    let frontend = config.frontend_base_url.trim_end_matches('/').to_string();
    let origin = frontend.clone();
    let db = web::Data::new(db);
    let limiter = web::Data::from(limiter);
    let providers = web::Data::new(providers);
    let frontend = web::Data::new(Frontend(frontend));
    let sessions = web::Data::new(Sessions::new(config.session_secret.as_bytes(), config.secure()));
    log::info!("starting server on {} ({})", config.bind, config.app_env);
    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(throttle))
            .wrap(
                Cors::default()
                    .allowed_origin(&origin)
                    .allow_any_method()
                    .allow_any_header()
                    .supports_credentials()
                    .max_age(3600),
            )
            .wrap(Logger::new("%a %r %s %Ts"))
            .app_data(db.clone())
            .app_data(limiter.clone())
            .app_data(providers.clone())
            .app_data(frontend.clone())
            .app_data(sessions.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health))
                    .configure(sk_auth::routes::<Postgres>),
            )
    })
    .workers(config.workers)
    .bind(&config.bind)?
    .run()
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use std::net::SocketAddr;

    macro_rules! app {
        ($burst:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(Limiter::new(0.001, $burst)))
                    .wrap(from_fn(throttle))
                    .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
            )
            .await
        };
    }

    fn peer(ip: &str) -> SocketAddr {
        format!("{}:40000", ip).parse().unwrap()
    }

    #[actix_web::test]
    async fn throttles_after_burst() {
        let app = app!(2);
        for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let req = test::TestRequest::get().uri("/").peer_addr(peer("10.0.0.1")).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), expected);
        }
    }
    #[actix_web::test]
    async fn forwarded_for_picks_first_hop() {
        let app = app!(1);
        let req = test::TestRequest::get()
            .uri("/")
            .peer_addr(peer("10.0.0.1"))
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::get().uri("/").peer_addr(peer("10.0.0.1")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
    #[actix_web::test]
    async fn unknown_client_is_an_error() {
        let app = app!(5);
        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
