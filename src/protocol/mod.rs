//! Protocol message definitions

pub mod jsonrpc;
pub mod notification;
pub mod request;
pub mod response;

pub use {
    jsonrpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId},
    notification::{LogAppendedParams, Notification, ScrollToLastParams},
    request::Request,
    response::{DisconnectResponse, LogResponse, Response, ScanStartedResponse, StatusResponse},
};
