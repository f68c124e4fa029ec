//! # Request Dispatch
//!
//! Maps one bridge request line to a [`SessionApi`] call and renders the
//! response line.
//!
//! ```text
//! {"id":1,"method":"sendText","args":{...}}
//!   → {"id":1,"result":...}
//!   → {"id":1,"error":{"code":"...","message":"...","details":"sendText"}}
//! ```

use mc_session::ports::{
    AddressRequest, CreateRequest, GetNonceRequest, GetSubscribersCountRequest,
    GetSubscribersRequest, GetSubscriptionRequest, PublishTextRequest, ReplyTextRequest,
    SendTextRequest, SubscribeRequest, UnsubscribeRequest,
};
use mc_session::{SessionApi, SessionError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Rendered when a response itself cannot be encoded.
const ENCODE_FAILURE: &str =
    r#"{"id":null,"error":{"code":"INTERNAL_ERROR","message":"encode response","details":""}}"#;

/// Dispatch failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The line is not a request object.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No handler for the method.
    #[error("method not implemented: {0}")]
    MethodNotImplemented(String),

    /// The arguments do not fit the method.
    #[error("invalid args: {0}")]
    InvalidArgs(String),

    /// The result could not be encoded.
    #[error("encode result: {0}")]
    Encode(String),

    /// The operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl DispatchError {
    /// Code reported to the consumer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "INVALID_REQUEST",
            Self::MethodNotImplemented(_) => "METHOD_NOT_IMPLEMENTED",
            Self::InvalidArgs(_) => "INVALID_PARAMS",
            Self::Encode(_) => "INTERNAL_ERROR",
            Self::Session(err) => err.code(),
        }
    }
}

/// One request line.
#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    /// Caller correlation id, echoed back.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method arguments.
    #[serde(default)]
    pub args: Value,
}

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeError {
    /// Machine-readable code.
    pub code: String,
    /// Description.
    pub message: String,
    /// Method that failed.
    pub details: String,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// Correlation id of the request.
    pub id: Value,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    fn failure(id: Value, err: &DispatchError, method: &str) -> Self {
        Self {
            id,
            result: None,
            error: Some(BridgeError {
                code: err.code().to_string(),
                message: err.to_string(),
                details: method.to_string(),
            }),
        }
    }
}

fn args<T: DeserializeOwned>(args: Value) -> Result<T, DispatchError> {
    // Absent args behave like an empty object so defaults apply.
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| DispatchError::InvalidArgs(e.to_string()))
}

fn encode<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| DispatchError::Encode(e.to_string()))
}

/// Routes requests to a [`SessionApi`].
pub struct Dispatcher<S: SessionApi> {
    api: Arc<S>,
}

impl<S: SessionApi> Dispatcher<S> {
    /// Create a dispatcher over `api`.
    pub fn new(api: Arc<S>) -> Self {
        Self { api }
    }

    /// Handle one request line and render the response line.
    pub async fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<BridgeRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "Malformed request line");
                let err = DispatchError::MalformedRequest(e.to_string());
                BridgeResponse::failure(Value::Null, &err, "")
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            warn!(error = %e, "Response encoding failed");
            ENCODE_FAILURE.to_string()
        })
    }

    /// Handle one parsed request.
    pub async fn handle(&self, request: BridgeRequest) -> BridgeResponse {
        let BridgeRequest { id, method, args } = request;
        match self.dispatch(&method, args).await {
            Ok(result) => {
                debug!(method = %method, "Request succeeded");
                BridgeResponse {
                    id,
                    result: Some(result),
                    error: None,
                }
            }
            Err(err) => {
                debug!(method = %method, code = err.code(), error = %err, "Request failed");
                BridgeResponse::failure(id, &err, &method)
            }
        }
    }

    /// Run `method` with raw JSON arguments.
    pub async fn dispatch(&self, method: &str, raw: Value) -> Result<Value, DispatchError> {
        let api = &self.api;
        match method {
            "create" => encode(api.create(args::<CreateRequest>(raw)?).await?),
            "recreate" => encode(api.recreate(args::<CreateRequest>(raw)?).await?),
            "reconnect" => {
                let AddressRequest { id } = args(raw)?;
                api.reconnect(&id).await?;
                Ok(Value::Null)
            }
            "close" => {
                let AddressRequest { id } = args(raw)?;
                api.close(&id).await?;
                Ok(Value::Null)
            }
            "replyText" => {
                api.reply_text(args::<ReplyTextRequest>(raw)?).await?;
                Ok(Value::Null)
            }
            "sendText" => encode(api.send_text(args::<SendTextRequest>(raw)?).await?),
            "publishText" => encode(api.publish_text(args::<PublishTextRequest>(raw)?).await?),
            "subscribe" => encode(api.subscribe(args::<SubscribeRequest>(raw)?).await?),
            "unsubscribe" => encode(api.unsubscribe(args::<UnsubscribeRequest>(raw)?).await?),
            "getSubscribers" => {
                encode(api.get_subscribers(args::<GetSubscribersRequest>(raw)?).await?)
            }
            "getSubscribersCount" => encode(
                api.get_subscribers_count(args::<GetSubscribersCountRequest>(raw)?)
                    .await?,
            ),
            "getSubscription" => {
                encode(api.get_subscription(args::<GetSubscriptionRequest>(raw)?).await?)
            }
            "getHeight" => {
                let AddressRequest { id } = args(raw)?;
                encode(api.get_height(&id).await?)
            }
            "getNonce" => encode(api.get_nonce(args::<GetNonceRequest>(raw)?).await?),
            other => Err(DispatchError::MethodNotImplemented(other.to_string())),
        }
    }
}
