//! Patient handlers
//!
//! `patient.register` and `patient.update` validate and write through
//! [`RegistrationLens`]; the read methods go through [`PatientLens`] and
//! [`DashboardLens`].

use crate::database::{PatientPage, PatientRecord, PatientSummary};
use crate::lens::dashboard::{DashboardLens, PatientSearchArgs};
use crate::lens::patient::{PatientLens, PatientListArgs};
use crate::lens::registration::{PatientEditArgs, PatientForm, RegistrationLens};
use crate::server::handler::{WsContext, WsError, WsMethod, WsRequest, WsResult};
use crate::server::op_sink::WsOpSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response carrying one patient, or `null` when the id is unknown
#[derive(Debug, Clone, Serialize)]
pub struct PatientResponse {
    pub patient: Option<PatientRecord>,
}

fn require_id(id: i64) -> WsResult<()> {
    if id < 1 {
        return Err(WsError::invalid_params("id must be a positive integer"));
    }
    Ok(())
}

// =============================================================================
// patient.register
// =============================================================================

pub struct PatientRegisterHandler;

#[async_trait]
impl WsMethod for PatientRegisterHandler {
    const METHOD: &'static str = "patient.register";

    type Params = PatientForm;

    async fn handle(
        ctx: Arc<WsContext>,
        req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let notifier = ctx.notifier(req.origin);
        let record = RegistrationLens::new(&ctx.sessions, &notifier)
            .register(&params)
            .await?;
        sink.send_result(PatientResponse {
            patient: Some(record),
        })?;
        Ok(())
    }
}

// =============================================================================
// patient.update
// =============================================================================

/// Parameters for patient.update: the id plus the fields to change
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatientUpdateParams {
    pub id: i64,

    #[serde(flatten)]
    pub changes: PatientEditArgs,
}

pub struct PatientUpdateHandler;

#[async_trait]
impl WsMethod for PatientUpdateHandler {
    const METHOD: &'static str = "patient.update";

    type Params = PatientUpdateParams;

    fn validate(params: &Self::Params) -> WsResult<()> {
        require_id(params.id)?;
        if params.changes.is_empty() {
            return Err(WsError::invalid_params("no fields to update"));
        }
        Ok(())
    }

    async fn handle(
        ctx: Arc<WsContext>,
        req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let notifier = ctx.notifier(req.origin);
        let lens = RegistrationLens::new(&ctx.sessions, &notifier);

        let patient = match lens.load_form(params.id).await? {
            Some(form) => {
                let form = params.changes.apply_to(form);
                lens.edit(params.id, &form).await?
            }
            None => None,
        };
        sink.send_result(PatientResponse { patient })?;
        Ok(())
    }
}

// =============================================================================
// patient.get
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatientGetParams {
    pub id: i64,
}

pub struct PatientGetHandler;

#[async_trait]
impl WsMethod for PatientGetHandler {
    const METHOD: &'static str = "patient.get";

    type Params = PatientGetParams;

    fn validate(params: &Self::Params) -> WsResult<()> {
        require_id(params.id)
    }

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let patient = PatientLens::new(&ctx.sessions).get(params.id).await?;
        sink.send_result(PatientResponse { patient })?;
        Ok(())
    }
}

// =============================================================================
// patient.list
// =============================================================================

pub struct PatientListHandler;

#[async_trait]
impl WsMethod for PatientListHandler {
    const METHOD: &'static str = "patient.list";

    type Params = PatientListArgs;

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let page: PatientPage = PatientLens::new(&ctx.sessions)
            .list(&params, ctx.page_size())
            .await?;
        sink.send_result(page)?;
        Ok(())
    }
}

// =============================================================================
// patient.search
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PatientSearchResponse {
    pub results: Vec<PatientSummary>,
}

pub struct PatientSearchHandler;

#[async_trait]
impl WsMethod for PatientSearchHandler {
    const METHOD: &'static str = "patient.search";

    type Params = PatientSearchArgs;

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let results = DashboardLens::new(&ctx.sessions).search(&params).await?;
        sink.send_result(PatientSearchResponse { results })?;
        Ok(())
    }
}
