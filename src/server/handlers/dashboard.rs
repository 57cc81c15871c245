//! Dashboard handler

use crate::lens::dashboard::DashboardLens;
use crate::server::handler::{WsContext, WsMethod, WsRequest, WsResult};
use crate::server::op_sink::WsOpSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for dashboard.stats (empty)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardStatsParams {}

pub struct DashboardStatsHandler;

#[async_trait]
impl WsMethod for DashboardStatsHandler {
    const METHOD: &'static str = "dashboard.stats";

    type Params = DashboardStatsParams;

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        _params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let stats = DashboardLens::new(&ctx.sessions).stats().await?;
        sink.send_result(stats)?;
        Ok(())
    }
}
