//! JSON-RPC request handler for Unix socket transport

use tracing::debug;

use crate::{
    core::service::BridgeHandle,
    protocol::{
        DisconnectResponse, JsonRpcError, JsonRpcRequest, JsonRpcResponse, LogResponse, Request,
        RequestId, Response, ScanStartedResponse, StatusResponse,
    },
};

/// JSON-RPC request handler
#[derive(Debug, Clone)]
pub struct RequestHandler {
    bridge: BridgeHandle,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(bridge: BridgeHandle) -> Self {
        Self { bridge }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(request = ?request.request, id = ?request.id, "Handling request");

        match request.request {
            Request::StartScan => self.handle_start_scan(request.id).await,
            Request::Disconnect => self.handle_disconnect(request.id).await,
            Request::GetStatus => self.handle_get_status(request.id).await,
            Request::GetLog => self.handle_get_log(request.id).await,
        }
    }

    async fn handle_start_scan(&self, id: RequestId) -> JsonRpcResponse {
        match self.bridge.start_scan().await {
            Ok(state) => {
                JsonRpcResponse::success(Response::ScanStarted(ScanStartedResponse::ok(state)), id)
            }
            Err(e) => JsonRpcResponse::error(JsonRpcError::from(&e), id),
        }
    }

    async fn handle_disconnect(&self, id: RequestId) -> JsonRpcResponse {
        match self.bridge.disconnect().await {
            Ok(()) => JsonRpcResponse::success(Response::Disconnect(DisconnectResponse::ok()), id),
            Err(e) => JsonRpcResponse::error(JsonRpcError::from(&e), id),
        }
    }

    async fn handle_get_status(&self, id: RequestId) -> JsonRpcResponse {
        match self.bridge.status().await {
            Ok(status) => {
                JsonRpcResponse::success(Response::Status(StatusResponse::ok(status)), id)
            }
            Err(e) => JsonRpcResponse::error(JsonRpcError::from(&e), id),
        }
    }

    async fn handle_get_log(&self, id: RequestId) -> JsonRpcResponse {
        match self.bridge.log().await {
            Ok(lines) => JsonRpcResponse::success(Response::Log(LogResponse::ok(lines)), id),
            Err(e) => JsonRpcResponse::error(JsonRpcError::from(&e), id),
        }
    }
}
