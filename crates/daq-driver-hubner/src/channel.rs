//! JSON request/reply exchange over one [`Transport`] link.
//!
//! Requests are single objects:
//!
//! ```json
//! {"uid": 7, "cmd": "wlm_setpoint", "chan": null, "type": "set", "arg": 737.1}
//! ```
//!
//! Replies carry `res` (`"ok"` on success) and `arg`. A reply whose `uid`
//! is present and differs from the outstanding request belongs to an
//! earlier, abandoned request and is skipped.

use crate::error::{GtrError, Result};
use crate::transport::Transport;
use crate::types::Channel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Discriminator of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Read a value
    Get,
    /// Write a value or trigger an action
    Set,
}

/// A command addressed to the device, before a `uid` is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command name
    pub cmd: &'static str,
    /// Routing key
    pub chan: Option<&'static str>,
    /// Get or set
    pub kind: RequestKind,
    /// Argument payload
    pub arg: Value,
}

impl Request {
    /// A `get` request without channel or argument.
    #[must_use]
    pub fn get(cmd: &'static str) -> Self {
        Self {
            cmd,
            chan: None,
            kind: RequestKind::Get,
            arg: Value::Null,
        }
    }

    /// A `set` request carrying `arg`.
    #[must_use]
    pub fn set(cmd: &'static str, arg: impl Into<Value>) -> Self {
        Self {
            cmd,
            chan: None,
            kind: RequestKind::Set,
            arg: arg.into(),
        }
    }

    /// A `set` request whose argument is a serializable structure.
    pub fn set_with<T: Serialize>(cmd: &'static str, arg: &T) -> Result<Self> {
        let arg = serde_json::to_value(arg)
            .map_err(|e| GtrError::InvalidArgument(format!("{cmd}: {e}")))?;
        Ok(Self::set(cmd, arg))
    }

    /// Route the request to a channel.
    #[must_use]
    pub fn on(mut self, channel: impl Channel) -> Self {
        self.chan = Some(channel.key());
        self
    }

    /// Render the wire object for `uid`.
    pub fn to_json(&self, uid: u64) -> Result<String> {
        serde_json::to_string(&WireRequest {
            uid,
            cmd: self.cmd,
            chan: self.chan,
            kind: self.kind,
            arg: &self.arg,
        })
        .map_err(|e| GtrError::InvalidArgument(format!("{}: {e}", self.cmd)))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    uid: u64,
    cmd: &'a str,
    chan: Option<&'a str>,
    #[serde(rename = "type")]
    kind: RequestKind,
    arg: &'a Value,
}

/// Outcome of one exchange on a live link.
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    /// Successful reply payload (`arg`, `null` when absent)
    Reply(Value),
    /// The peer closed the link before answering
    Closed,
}

/// Classify one received frame against the outstanding `uid`.
///
/// Returns `Ok(None)` for a stale reply that must be skipped.
pub fn classify_reply(text: &str, expected_uid: u64) -> Result<Option<Value>> {
    let Ok(Value::Object(mut reply)) = serde_json::from_str::<Value>(text) else {
        return Err(GtrError::RequestFailed(format!("malformed reply: {text}")));
    };

    if let Some(uid) = reply.get("uid").and_then(Value::as_u64) {
        if uid != expected_uid {
            return Ok(None);
        }
    }

    let arg = reply.remove("arg").unwrap_or(Value::Null);
    match reply.get("res").and_then(Value::as_str) {
        Some("ok") => Ok(Some(arg)),
        Some(_) => Err(GtrError::RequestFailed(match arg {
            Value::String(message) => message,
            other => other.to_string(),
        })),
        None => Err(GtrError::RequestFailed(format!("malformed reply: {text}"))),
    }
}

/// Deserialize a reply payload into the caller's type.
pub fn decode_payload<T: DeserializeOwned>(cmd: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| GtrError::UnexpectedPayload {
        command: cmd.to_string(),
        reason: e.to_string(),
    })
}

/// A live link with request correlation.
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    next_uid: u64,
}

impl CommandChannel {
    /// Wrap an established transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            next_uid: 1,
        }
    }

    /// Send `request` and wait for its reply.
    ///
    /// Exactly one request is outstanding per call; the caller guarantees that
    /// calls are not overlapped.
    pub async fn exchange(&mut self, request: &Request) -> Result<Exchange> {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1);

        let text = request.to_json(uid)?;
        debug!(uid, cmd = request.cmd, chan = ?request.chan, kind = ?request.kind, "sending request");
        self.transport.send_text(text).await?;

        loop {
            let Some(frame) = self.transport.recv_text().await? else {
                debug!(uid, cmd = request.cmd, "link closed while awaiting reply");
                return Ok(Exchange::Closed);
            };
            match classify_reply(&frame, uid)? {
                Some(payload) => {
                    debug!(uid, cmd = request.cmd, "reply received");
                    return Ok(Exchange::Reply(payload));
                }
                None => warn!(uid, cmd = request.cmd, frame = %frame, "discarding stale reply"),
            }
        }
    }

    /// Close the underlying link.
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PiezoChannel;
    use serde_json::json;

    #[test]
    fn request_matches_wire_schema() {
        let text = Request::set("wlm_setpoint", 737.1).to_json(0).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"uid": 0, "cmd": "wlm_setpoint", "chan": null, "type": "set", "arg": 737.1})
        );
    }

    #[test]
    fn routed_get_carries_channel_key() {
        let text = Request::get("piezo_mode")
            .on(PiezoChannel::Etalon)
            .to_json(12)
            .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["chan"], "etalon");
        assert_eq!(value["type"], "get");
        assert_eq!(value["arg"], Value::Null);
        assert_eq!(value["uid"], 12);
    }

    #[test]
    fn ok_reply_returns_arg() {
        let payload = classify_reply(r#"{"res":"ok","arg":737.1}"#, 1).unwrap();
        assert_eq!(payload, Some(json!(737.1)));

        let payload = classify_reply(r#"{"res":"ok"}"#, 1).unwrap();
        assert_eq!(payload, Some(Value::Null));
    }

    #[test]
    fn error_reply_carries_device_text() {
        let err = classify_reply(r#"{"res":"error","arg":"out of range"}"#, 1).unwrap_err();
        match err {
            GtrError::RequestFailed(message) => assert_eq!(message, "out of range"),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = classify_reply(r#"{"res":"busy","arg":{"code":3}}"#, 1).unwrap_err();
        assert_eq!(err.to_string(), r#"Request failed: {"code":3}"#);
    }

    #[test]
    fn malformed_reply_is_request_failure() {
        for text in ["not json", "[1,2]", r#"{"arg":1}"#, r#"{"res":1}"#] {
            assert!(
                matches!(classify_reply(text, 1), Err(GtrError::RequestFailed(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn mismatched_uid_is_stale() {
        assert_eq!(classify_reply(r#"{"uid":3,"res":"ok","arg":1}"#, 4).unwrap(), None);
        // stale errors are skipped too
        assert_eq!(
            classify_reply(r#"{"uid":3,"res":"error","arg":"late"}"#, 4).unwrap(),
            None
        );
        assert_eq!(
            classify_reply(r#"{"uid":4,"res":"ok","arg":1}"#, 4).unwrap(),
            Some(json!(1))
        );
    }

    #[test]
    fn payload_shape_errors_name_the_command() {
        let err = decode_payload::<f64>("wlm_kp", json!("fast")).unwrap_err();
        match err {
            GtrError::UnexpectedPayload { command, .. } => assert_eq!(command, "wlm_kp"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
