//! # Global Catalog Handlers
//!
//! The unauthenticated `/global/*` surface plus the health probe. All of
//! these serve from any region without proxying: the catalog is static
//! and the domain check reads the global directory, which every node can
//! see.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use shared::database::{self, StoreTier};
use shared::validation::{validated, SUPPORTED_LANGUAGES};
use shared::{ApiError, Region};

use crate::AppState;

use super::dto::{
    CheckDomainRequest, CheckDomainResponse, HealthResponse, RegionsResponse,
    SupportedLanguagesResponse,
};

/// `GET /health`
///
/// Probes both store tiers. A node that lost the global directory can
/// still serve local sessions, so the body says which half is gone and
/// the status degrades to 503 for the load balancer.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let global_ok = database::health_check(StoreTier::Global, &state.global_pool)
        .await
        .is_ok();
    let regional_ok = database::health_check(StoreTier::Regional, &state.regional_pool)
        .await
        .is_ok();

    let body = HealthResponse {
        status: if global_ok && regional_ok {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        service: "regional-api".to_string(),
        region: state.region.to_string(),
        global_store: store_label(global_ok),
        regional_store: store_label(regional_ok),
        timestamp: Utc::now().to_rfc3339(),
    };

    if global_ok && regional_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

fn store_label(ok: bool) -> String {
    if ok { "ok" } else { "unreachable" }.to_string()
}

/// `POST /global/regions` - the closed region catalog.
pub async fn regions() -> HttpResponse {
    HttpResponse::Ok().json(RegionsResponse {
        regions: Region::ALL.iter().map(|r| r.to_string()).collect(),
    })
}

/// `POST /global/supported-languages`
pub async fn supported_languages() -> HttpResponse {
    HttpResponse::Ok().json(SupportedLanguagesResponse {
        languages: SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect(),
    })
}

/// `POST /global/check-domain` - whether a domain is still claimable
/// (unowned in both families).
pub async fn check_domain(
    state: web::Data<AppState>,
    body: web::Json<CheckDomainRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let taken = state.directory.domain_taken(&body.domain).await?;

    Ok(HttpResponse::Ok().json(CheckDomainResponse {
        domain: body.domain,
        available: !taken,
    }))
}
