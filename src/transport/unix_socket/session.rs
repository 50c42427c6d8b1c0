//! Unix socket session management

use serde::Serialize;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::unix::{OwnedReadHalf, OwnedWriteHalf},
    sync::Mutex,
};

use crate::{
    core::types::SessionId,
    protocol::{JsonRpcNotification, JsonRpcResponse},
};

/// Unix socket client session
#[derive(Debug)]
pub struct UnixSocketSession {
    id: SessionId,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl UnixSocketSession {
    /// Create a new Unix socket session
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            id: SessionId::new(),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Send a JSON-RPC response
    pub async fn send_response(&self, response: &JsonRpcResponse) -> std::io::Result<()> {
        self.send_line(response).await
    }

    /// Send a JSON-RPC notification
    pub async fn send_notification(
        &self,
        notification: &JsonRpcNotification,
    ) -> std::io::Result<()> {
        self.send_line(notification).await
    }

    async fn send_line<T: Serialize>(&self, message: &T) -> std::io::Result<()> {
        let mut json = serde_json::to_vec(message)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        json.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&json).await?;
        writer.flush().await
    }
}

/// Session reader for processing incoming messages
///
/// Partially read lines stay buffered, so [`SessionReader::read_line`] can be
/// raced against other futures in `select!`.
pub struct SessionReader {
    reader: BufReader<OwnedReadHalf>,
    buffer: String,
}

impl SessionReader {
    /// Create a new session reader
    pub fn new(reader: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: String::new(),
        }
    }

    /// Read the next line from the socket, `None` on EOF
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let bytes_read = self.reader.read_line(&mut self.buffer).await?;

        if bytes_read == 0 && self.buffer.is_empty() {
            return Ok(None);
        }

        let mut line = std::mem::take(&mut self.buffer);
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcRequest, LogResponse, Request, RequestId, Response};
    use tokio::{io::AsyncReadExt, net::UnixStream};

    #[tokio::test]
    async fn test_session_creation() {
        let (client, server) = UnixStream::pair().unwrap();
        let (_, writer) = server.into_split();
        let session = UnixSocketSession::new(writer);

        let session2 = UnixSocketSession::new(client.into_split().1);

        assert_ne!(session.id(), session2.id());
    }

    #[tokio::test]
    async fn test_session_reads_crlf_lines() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _write_half) = server.into_split();
        let mut reader = SessionReader::new(read_half);

        let request = JsonRpcRequest::new(Request::GetStatus, RequestId::Number(1));
        let json = serde_json::to_string(&request).unwrap();
        let (_client_read, mut client_write) = client.into_split();

        client_write.write_all(json.as_bytes()).await.unwrap();
        client_write.write_all(b"\r\n").await.unwrap();
        client_write.flush().await.unwrap();

        let line = reader.read_line().await.unwrap().unwrap();
        let received: JsonRpcRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_partial_line_survives_cancellation() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _write_half) = server.into_split();
        let mut reader = SessionReader::new(read_half);
        let (_client_read, mut client_write) = client.into_split();

        client_write.write_all(b"{\"half\":").await.unwrap();
        let timed_out = tokio::time::timeout(
            tokio::time::Duration::from_millis(20),
            reader.read_line(),
        )
        .await;
        assert!(timed_out.is_err());

        client_write.write_all(b"1}\n").await.unwrap();
        let line = reader.read_line().await.unwrap();
        assert_eq!(line.as_deref(), Some("{\"half\":1}"));
    }

    #[tokio::test]
    async fn test_session_reader_eof() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _) = server.into_split();
        let mut reader = SessionReader::new(read_half);

        drop(client);

        let line = reader.read_line().await.unwrap();
        assert!(line.is_none());
    }

    #[tokio::test]
    async fn test_send_response_is_newline_delimited() {
        let (client, server) = UnixStream::pair().unwrap();
        let (_, write_half) = server.into_split();
        let session = UnixSocketSession::new(write_half);

        let response = JsonRpcResponse::success(
            Response::Log(LogResponse::ok(vec!["Ready".into()])),
            RequestId::Number(9),
        );
        session.send_response(&response).await.unwrap();
        drop(session);

        let mut received = String::new();
        let (mut client_read, _client_write) = client.into_split();
        client_read.read_to_string(&mut received).await.unwrap();

        assert!(received.ends_with('\n'));
        let parsed: JsonRpcResponse = serde_json::from_str(received.trim_end()).unwrap();
        assert_eq!(parsed, response);
    }
}
