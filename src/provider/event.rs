//! Provider lifecycle events and their wire payloads

use serde_json::Value;

/// The four subscriptions the session makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    ChainChanged,
    AccountsChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::ChainChanged,
        EventKind::AccountsChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::ChainChanged => "chainChanged",
            EventKind::AccountsChanged => "accountsChanged",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// Lifecycle message. Chain ids stay raw hex here; the projector parses them
/// so a malformed one is reported where the state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect { chain_id: String },
    Disconnect,
    ChainChanged(String),
    AccountsChanged(Vec<String>),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::Connect { .. } => EventKind::Connect,
            ProviderEvent::Disconnect => EventKind::Disconnect,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
            ProviderEvent::AccountsChanged(_) => EventKind::AccountsChanged,
        }
    }

    /// Decode an event from its name and JSON payload:
    ///
    /// - `connect`: `{"chainId": "0x1"}`
    /// - `disconnect`: anything
    /// - `chainChanged`: `"0x1"` (or a bare number)
    /// - `accountsChanged`: `["0xabc", ...]`
    pub fn from_wire(name: &str, payload: &Value) -> Option<Self> {
        match EventKind::from_str(name)? {
            EventKind::Connect => {
                let chain = payload.get("chainId").map(chain_string)?;
                Some(ProviderEvent::Connect { chain_id: chain? })
            }
            EventKind::Disconnect => Some(ProviderEvent::Disconnect),
            EventKind::ChainChanged => Some(ProviderEvent::ChainChanged(chain_string(payload)?)),
            EventKind::AccountsChanged => {
                let accounts = payload
                    .as_array()?
                    .iter()
                    .map(|v| v.as_str().map(String::from))
                    .collect::<Option<Vec<_>>>()?;
                Some(ProviderEvent::AccountsChanged(accounts))
            }
        }
    }
}

/// Some providers send numbers; normalize to hex.
fn chain_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_u64().map(|id| format!("{:#x}", id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_str("message"), None);
    }

    #[test]
    fn decodes_wire_payloads() {
        assert_eq!(
            ProviderEvent::from_wire("connect", &json!({"chainId": "0x1"})),
            Some(ProviderEvent::Connect { chain_id: "0x1".into() })
        );
        assert_eq!(
            ProviderEvent::from_wire("chainChanged", &json!(8453)),
            Some(ProviderEvent::ChainChanged("0x2105".into()))
        );
        assert_eq!(
            ProviderEvent::from_wire("accountsChanged", &json!(["0xa", "0xb"])),
            Some(ProviderEvent::AccountsChanged(vec!["0xa".into(), "0xb".into()]))
        );
        assert_eq!(
            ProviderEvent::from_wire("accountsChanged", &json!([])),
            Some(ProviderEvent::AccountsChanged(vec![]))
        );
        assert_eq!(ProviderEvent::from_wire("disconnect", &Value::Null), Some(ProviderEvent::Disconnect));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(ProviderEvent::from_wire("connect", &json!({})), None);
        assert_eq!(ProviderEvent::from_wire("accountsChanged", &json!("0xa")), None);
        assert_eq!(ProviderEvent::from_wire("accountsChanged", &json!([1, 2])), None);
        assert_eq!(ProviderEvent::from_wire("session_update", &json!({})), None);
    }
}
