use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::address;
use crate::models::{
    CheckMatchResponse, ConnectQuery, ConnectResponse, CrushRequest, CrushResponse, ErrorResponse,
    HealthResponse, MatchNotification, PairQuery,
};
use crate::services::{CrushLedger, LedgerError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<CrushLedger>,
}

/// Configure all crush-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/connect", web::post().to(connect_wallet))
        .route("/crush/submit", web::post().to(submit_crush))
        .route("/stats/{wallet_address}", web::get().to(get_stats))
        .route("/matches/{wallet_address}", web::get().to(get_matches))
        .route("/check-match", web::get().to(check_match));
}

fn bad_request(error: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message: message.into(),
        status_code: 400,
    })
}

fn invalid_address(wallet: &str) -> Option<HttpResponse> {
    if address::validate(wallet) {
        None
    } else {
        Some(bad_request("Invalid wallet address", format!("{:?} is not a wallet address", wallet)))
    }
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Register a wallet
///
/// POST /api/connect?wallet_address={address}
async fn connect_wallet(state: web::Data<AppState>, query: web::Query<ConnectQuery>) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request("Invalid wallet address", errors.to_string());
    }

    match state.ledger.register(&query.wallet_address).await {
        Ok(wallet_address) => HttpResponse::Ok().json(ConnectResponse {
            success: true,
            message: "Wallet connected successfully!".to_string(),
            wallet_address,
        }),
        Err(e) => bad_request("Invalid wallet address", e.to_string()),
    }
}

/// Submit a crush
///
/// POST /api/crush/submit
///
/// Request body:
/// ```json
/// {
///   "crusher_address": "0x...",
///   "crush_address": "0x..."
/// }
/// ```
async fn submit_crush(state: web::Data<AppState>, req: web::Json<CrushRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for crush submission: {:?}", errors);
        return bad_request("Validation failed", errors.to_string());
    }

    let outcome = match state.ledger.record_crush(&req.crusher_address, &req.crush_address).await {
        Ok(outcome) => outcome,
        Err(LedgerError::SelfCrush) => {
            return bad_request(
                "Invalid crush",
                "You can't have a crush on yourself! (But self-love is important too)",
            );
        }
        Err(e) => return bad_request("Validation failed", e.to_string()),
    };

    tracing::info!("Crush recorded for {} (matched: {})", req.crusher_address, outcome.matched);

    let message = if outcome.matched {
        "Your secret love has been sent... and guess what? IT'S A MATCH!"
    } else {
        "Your secret love has been sent!"
    };

    HttpResponse::Ok().json(CrushResponse {
        success: true,
        message: message.to_string(),
        submission_id: Some(outcome.submission_id),
        matched: outcome.matched,
    })
}

/// GET /api/stats/{wallet_address}
async fn get_stats(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let wallet = path.into_inner();
    if let Some(response) = invalid_address(&wallet) {
        return response;
    }

    HttpResponse::Ok().json(state.ledger.stats(&wallet).await)
}

/// GET /api/matches/{wallet_address}
async fn get_matches(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let wallet = path.into_inner();
    if let Some(response) = invalid_address(&wallet) {
        return response;
    }

    let your_address = address::normalize(&wallet);
    let notifications: Vec<MatchNotification> = state
        .ledger
        .matches_for(&wallet)
        .await
        .into_iter()
        .map(|(matched_address, matched_at)| MatchNotification {
            your_address: your_address.clone(),
            matched_address,
            matched_at,
            message: Some("You both like each other!".to_string()),
        })
        .collect();

    tracing::debug!("Returning {} matches for {}", notifications.len(), your_address);
    HttpResponse::Ok().json(notifications)
}

/// GET /api/check-match?address1={a}&address2={b}
async fn check_match(state: web::Data<AppState>, query: web::Query<PairQuery>) -> impl Responder {
    if let Err(errors) = query.validate() {
        return bad_request("Validation failed", errors.to_string());
    }

    let response = if state.ledger.check_mutual(&query.address1, &query.address2).await {
        CheckMatchResponse {
            is_match: true,
            message: "It's a Match! You both like each other!".to_string(),
        }
    } else {
        CheckMatchResponse {
            is_match: false,
            message: "No match yet... keep hoping!".to_string(),
        }
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1111";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2222";

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState {
            ledger: Arc::new(CrushLedger::new()),
        })
    }

    #[actix_web::test]
    async fn test_self_crush_is_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/crush/submit")
            .set_json(CrushRequest {
                crusher_address: A.to_string(),
                crush_address: A.to_uppercase().replacen("0X", "0x", 1),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_invalid_stats_address_is_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/stats/not-a-wallet").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::get().uri(&format!("/stats/{}", B)).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_connect_normalizes_wallet() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/connect?wallet_address={}", A.to_uppercase().replacen("0X", "0x", 1)))
            .to_request();
        let body: ConnectResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.success);
        assert_eq!(body.wallet_address, A);
    }
}
