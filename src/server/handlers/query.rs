//! Query console handlers
//!
//! `query.execute` pages read statements and announces writes to the other
//! connections; `query.export` returns the whole result as CSV or JSON text.

use crate::lens::export::{ExportArgs, ExportLens};
use crate::lens::query::{QueryArgs, QueryLens};
use crate::server::handler::{WsContext, WsError, WsMethod, WsRequest, WsResult};
use crate::server::op_sink::WsOpSink;
use async_trait::async_trait;
use std::sync::Arc;

fn require_statement(sql: &str) -> WsResult<()> {
    if sql.trim().trim_end_matches(';').trim().is_empty() {
        return Err(WsError::invalid_params("sql is required"));
    }
    Ok(())
}

// =============================================================================
// query.execute
// =============================================================================

pub struct QueryExecuteHandler;

#[async_trait]
impl WsMethod for QueryExecuteHandler {
    const METHOD: &'static str = "query.execute";

    type Params = QueryArgs;

    fn validate(params: &Self::Params) -> WsResult<()> {
        require_statement(&params.sql)
    }

    async fn handle(
        ctx: Arc<WsContext>,
        req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let notifier = ctx.notifier(req.origin);
        let page = QueryLens::new(&ctx.sessions, &notifier)
            .execute(&params, ctx.page_size())
            .await?;
        sink.send_result(page)?;
        Ok(())
    }
}

// =============================================================================
// query.export
// =============================================================================

pub struct QueryExportHandler;

#[async_trait]
impl WsMethod for QueryExportHandler {
    const METHOD: &'static str = "query.export";

    type Params = ExportArgs;

    fn validate(params: &Self::Params) -> WsResult<()> {
        require_statement(&params.sql)
    }

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let output = ExportLens::new(&ctx.sessions).export(&params).await?;
        sink.send_result(output)?;
        Ok(())
    }
}
