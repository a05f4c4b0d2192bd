//! Mandate routes

use std::sync::Arc;

use uuid::Uuid;
use warp::Filter;

use crate::application::services::{MandateOrchestrator, MandateReconciler};
use crate::infrastructure::adapters::TokenAuthenticator;
use crate::infrastructure::http::handlers::{
    handle_initiate_mandate, handle_load_report, handle_mandate_status, handle_mandate_sweep,
};
use crate::infrastructure::http::utils::{authenticated, json_body, with_state};

pub struct MandateRoutes;

impl MandateRoutes {
    pub fn create_routes(
        orchestrator: Arc<MandateOrchestrator>,
        reconciler: Arc<MandateReconciler>,
        authenticator: TokenAuthenticator,
        body_limit: u64,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let initiate = warp::path!("mandates")
            .and(warp::post())
            .and(authenticated(authenticator.clone()))
            .and(json_body(body_limit))
            .and(with_state(orchestrator.clone()))
            .and_then(handle_initiate_mandate);

        let status = warp::path!("mandates" / Uuid)
            .and(warp::get())
            .and(authenticated(authenticator.clone()))
            .and(with_state(orchestrator.clone()))
            .and_then(handle_mandate_status);

        let load_report = warp::path!("mandates" / Uuid / "load-report")
            .and(warp::get())
            .and(authenticated(authenticator.clone()))
            .and(with_state(orchestrator))
            .and_then(handle_load_report);

        let sweep = warp::path!("mandates" / "sweep")
            .and(warp::post())
            .and(authenticated(authenticator))
            .and(with_state(reconciler))
            .and_then(handle_mandate_sweep);

        sweep.or(initiate).or(status).or(load_report)
    }
}
