use crate::{
    api::{attendance, correction},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    // kiosk devices hammer the toggle endpoints; everything else shares
    // one generous limit
    let device_limiter = Arc::new(build_limiter(config.rate_device_per_min));
    let api_limiter = Arc::new(build_limiter(config.rate_api_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(api_limiter)
            .service(
                web::scope("/attendance")
                    // /attendance/sweep
                    .service(
                        web::resource("/sweep").route(web::post().to(attendance::run_sweep)),
                    )
                    // /attendance/badge/{badge_token}/toggle
                    .service(
                        web::resource("/badge/{badge_token}/toggle")
                            .wrap(device_limiter.clone())
                            .route(web::post().to(attendance::badge_toggle)),
                    )
                    // /attendance/{entity_type}/{entity_id}/...
                    .service(
                        web::resource("/{entity_type}/{entity_id}/check-in")
                            .wrap(device_limiter.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/check-out")
                            .route(web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/toggle")
                            .wrap(device_limiter)
                            .route(web::post().to(attendance::toggle)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/stats")
                            .route(web::get().to(attendance::get_stats)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/{year}/{month}")
                            .route(web::get().to(attendance::get_record)),
                    ),
            )
            .service(
                web::scope("/corrections")
                    // /corrections/{entity_type}/{entity_id}
                    .service(
                        web::resource("/{entity_type}/{entity_id}")
                            .route(web::post().to(correction::submit)),
                    )
                    // /corrections/{entity_type}/{entity_id}/{year}/{month}
                    .service(
                        web::resource("/{entity_type}/{entity_id}/{year}/{month}")
                            .route(web::get().to(correction::list)),
                    )
                    // .../{request_id}/approve | reject | apply
                    .service(
                        web::resource("/{entity_type}/{entity_id}/{year}/{month}/{request_id}/approve")
                            .route(web::put().to(correction::approve)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/{year}/{month}/{request_id}/reject")
                            .route(web::put().to(correction::reject)),
                    )
                    .service(
                        web::resource("/{entity_type}/{entity_id}/{year}/{month}/{request_id}/apply")
                            .route(web::put().to(correction::apply)),
                    ),
            ),
    );
}

// CHECK-IN
//  ├─ validates eligibility + duplicate window
//  └─ appends entry, flips projection, recomputes stats
//
// CHECK-OUT
//  ├─ classifies by duration + schedule
//  └─ refolds work-day counters, clears projection
//
// CORRECTION
//  └─ submit → approve|reject → apply (terminal)
