use crate::{
    api::attendance,
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        // both values are clamped to >= 1 above, the only case finish() rejects
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Token endpoints. They talk to MySQL directly and need a `MySqlPool` in app data.
pub fn configure_auth(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));

    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            ),
    );
}

/// Authenticated attendance API. Needs `Config` and `AttendanceService` in app data.
pub fn configure_api(cfg: &mut web::ServiceConfig, config: &Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::check_in))
                            .route(web::put().to(attendance::check_out))
                            .route(web::get().to(attendance::attendance_list)),
                    )
                    // /attendance/pending must be matched before /attendance/{id}
                    .service(
                        web::resource("/pending").route(web::get().to(attendance::pending_queue)),
                    )
                    .service(
                        web::resource("/pending/count")
                            .route(web::get().to(attendance::pending_count)),
                    )
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}").route(web::get().to(attendance::get_attendance)),
                    )
                    .service(
                        web::resource("/{id}/history")
                            .route(web::get().to(attendance::attendance_history)),
                    )
                    .service(
                        web::resource("/{id}/edit").route(web::put().to(attendance::submit_edit)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(attendance::approve_edit)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(attendance::reject_edit)),
                    ),
            ),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    configure_auth(cfg, &config);
    configure_api(cfg, &config);
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token
