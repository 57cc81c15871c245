//! System handlers for introspection methods

use crate::server::handler::{WsContext, WsMethod, WsRequest, WsResult};
use crate::server::op_sink::WsOpSink;
use crate::server::protocol::SystemInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// system.info
// =============================================================================

/// Parameters for system.info (empty)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemInfoParams {}

pub struct SystemInfoHandler;

#[async_trait]
impl WsMethod for SystemInfoHandler {
    const METHOD: &'static str = "system.info";

    type Params = SystemInfoParams;

    async fn handle(
        ctx: Arc<WsContext>,
        _req: WsRequest,
        _params: Self::Params,
        sink: WsOpSink,
    ) -> WsResult<()> {
        let info = SystemInfo::new(
            ctx.sessions.options().location(),
            ctx.sessions.state().to_string(),
        );
        sink.send_result(info)?;
        Ok(())
    }
}
