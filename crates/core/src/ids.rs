// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newtype identifiers used across the coordination daemon.
//!
//! Every id that crosses a JSON boundary (hook requests, persisted state,
//! the remote chat's own message ids) is modeled as a string newtype rather
//! than a raw integer, so it can key a map without a custom serializer.

crate::define_id! {
    /// Identifies a host session (one per coding-assistant process the hooks
    /// are attached to). Opaque; supplied by the caller on every request.
    pub struct HostSessionId;
}

crate::define_id! {
    /// Identifies a pending request by the remote chat message id it was sent
    /// as. The remote API hands back a 64-bit integer; it is stringified here
    /// so it can be used as a map key in both Rust and the persisted JSON.
    pub struct MessageId;
}

crate::define_id! {
    /// Opaque platform-specific terminal identifier (see terminal binding
    /// resolution). The daemon only ever compares these for equality.
    pub struct TerminalId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_round_trips_through_json() {
        let id = MessageId::new("12345");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"12345\"");
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn host_session_id_usable_as_map_key_by_str() {
        use std::collections::HashMap;
        let mut map: HashMap<HostSessionId, u32> = HashMap::new();
        map.insert(HostSessionId::new("s1"), 1);
        assert_eq!(map.get("s1"), Some(&1));
    }
}
