//! Unix socket server implementation

use serde_json::Value;
use std::{os::unix::fs::PermissionsExt, path::Path};
use tokio::{
    fs,
    net::{UnixListener, UnixStream},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, error, info, warn};

use crate::{
    core::{error::TransportResult, service::BridgeHandle},
    display::DisplayUpdate,
    protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId},
    transport::unix_socket::{
        handler::RequestHandler,
        session::{SessionReader, UnixSocketSession},
    },
};

/// Unix socket server
///
/// Every client gets JSON-RPC request handling plus a push of each display
/// log update as a notification.
pub struct UnixSocketServer {
    socket_path: String,
    socket_mode: u32,
    handler: RequestHandler,
    bridge: BridgeHandle,
}

impl UnixSocketServer {
    /// Create a new Unix socket server
    pub fn new(socket_path: String, socket_mode: u32, bridge: BridgeHandle) -> Self {
        Self {
            socket_path,
            socket_mode,
            handler: RequestHandler::new(bridge.clone()),
            bridge,
        }
    }

    /// Bind the socket and serve clients until the task is dropped
    pub async fn start(&self) -> TransportResult<()> {
        // Remove a stale socket left by a previous run
        if Path::new(&self.socket_path).exists() {
            fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        fs::set_permissions(
            &self.socket_path,
            std::fs::Permissions::from_mode(self.socket_mode),
        )
        .await?;
        info!(
            "Unix socket server listening on {} (mode {:o})",
            self.socket_path, self.socket_mode
        );

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    let updates = self.bridge.subscribe_display();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, handler, updates).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                }
            }
        }
    }

    async fn handle_client(
        stream: UnixStream,
        handler: RequestHandler,
        mut updates: broadcast::Receiver<DisplayUpdate>,
    ) -> std::io::Result<()> {
        let (read_half, write_half) = stream.into_split();
        let session = UnixSocketSession::new(write_half);
        let mut reader = SessionReader::new(read_half);
        let mut forwarding = true;

        info!("New client connected: {}", session.id());

        loop {
            tokio::select! {
                line = reader.read_line() => {
                    let Some(line) = line? else {
                        info!("Client disconnected: {}", session.id());
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let response = match parse_request(&line) {
                        Ok(request) => handler.handle_request(request).await,
                        Err(response) => response,
                    };
                    session.send_response(&response).await?;
                }
                update = updates.recv(), if forwarding => match update {
                    Ok(update) => {
                        let notification = JsonRpcNotification::new(update.into());
                        session.send_notification(&notification).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(session = %session.id(), skipped, "Client fell behind display log");
                    }
                    Err(RecvError::Closed) => forwarding = false,
                },
            }
        }

        Ok(())
    }
}

/// Decode one request line, or build the error response for it
fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!("Unparseable request: {}", e);
        JsonRpcResponse::error(JsonRpcError::parse_error(), RequestId::Null)
    })?;

    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok())
        .unwrap_or(RequestId::Null);
    let method = value.get("method").and_then(Value::as_str).map(str::to_owned);
    // None of the methods take parameters
    let has_params = value.get("params").is_some_and(|p| !p.is_null());

    serde_json::from_value::<JsonRpcRequest>(value).map_err(|e| {
        warn!("Invalid JSON-RPC request: {}", e);
        let error = match method {
            Some(method) if !KNOWN_METHODS.contains(&method.as_str()) => {
                JsonRpcError::method_not_found()
            }
            Some(method) if has_params => {
                JsonRpcError::invalid_params(format!("{method} takes no parameters"))
            }
            _ => JsonRpcError::invalid_request(e.to_string()),
        };
        JsonRpcResponse::error(error, id)
    })
}

const KNOWN_METHODS: [&str; 4] = ["start_scan", "disconnect", "get_status", "get_log"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{events::BleEvent, types::PowerState},
        protocol::{Request, Response},
        transport::unix_socket::handler::tests::spawn_bridge,
    };
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn start_server(
        socket_path: &Path,
        bridge: BridgeHandle,
    ) -> tokio::task::JoinHandle<TransportResult<()>> {
        let server =
            UnixSocketServer::new(socket_path.to_string_lossy().into_owned(), 0o600, bridge);
        let task = tokio::spawn(async move { server.start().await });

        // Wait for the socket to appear
        for _ in 0..50 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }
        // Permissions are applied right after bind
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        task
    }

    #[tokio::test]
    async fn test_socket_permissions_applied() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bridge.sock");
        let (bridge, _events) = spawn_bridge();

        let task = start_server(&socket_path, bridge).await;
        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        task.abort();
    }

    #[tokio::test]
    async fn test_client_request_and_notifications() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bridge.sock");
        let (bridge, events) = spawn_bridge();
        let task = start_server(&socket_path, bridge).await;

        let client = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = client.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // Give the server a moment to subscribe this client to display updates
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        events
            .send(BleEvent::PowerStateChanged(PowerState::PoweredOn))
            .unwrap();

        let appended: JsonRpcNotification =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(
            appended,
            JsonRpcNotification::new(DisplayUpdate::Appended {
                index: 0,
                line: "Ready".into()
            }
            .into())
        );
        let scroll: JsonRpcNotification =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(
            scroll,
            JsonRpcNotification::new(DisplayUpdate::ScrollToLast { index: 0 }.into())
        );

        let request = JsonRpcRequest::new(Request::GetLog, RequestId::Number(1));
        let json = serde_json::to_string(&request).unwrap();
        write_half.write_all(json.as_bytes()).await.unwrap();
        write_half.write_all(b"\n").await.unwrap();

        let response: JsonRpcResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response.id, RequestId::Number(1));
        assert!(matches!(response.result, Some(Response::Log(_))));

        task.abort();
    }

    #[tokio::test]
    async fn test_malformed_request_gets_parse_error() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bridge.sock");
        let (bridge, _events) = spawn_bridge();
        let task = start_server(&socket_path, bridge).await;

        let client = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = client.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"{not json\n").await.unwrap();

        let response: JsonRpcResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response.id, RequestId::Null);
        assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        task.abort();
    }

    #[test]
    fn test_parse_request_errors() {
        let unknown = parse_request(r#"{"jsonrpc":"2.0","method":"reboot","id":7}"#).unwrap_err();
        assert_eq!(unknown.id, RequestId::Number(7));
        assert_eq!(unknown.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let missing_id = parse_request(r#"{"jsonrpc":"2.0","method":"get_log"}"#).unwrap_err();
        assert_eq!(missing_id.id, RequestId::Null);
        assert_eq!(missing_id.error.unwrap().code, JsonRpcError::INVALID_REQUEST);

        let with_params =
            parse_request(r#"{"jsonrpc":"2.0","method":"start_scan","params":{"x":1},"id":8}"#)
                .unwrap_err();
        assert_eq!(with_params.id, RequestId::Number(8));
        assert_eq!(
            with_params.error.unwrap().code,
            JsonRpcError::INVALID_PARAMS
        );

        let ok = parse_request(r#"{"jsonrpc":"2.0","method":"get_status","id":"a"}"#).unwrap();
        assert_eq!(ok.request, Request::GetStatus);
    }
}
