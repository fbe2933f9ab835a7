//! Fuzz target for session message parsing
//!
//! Parse arbitrary JSON payloads as out-of-band session messages
//!
//! # Invariants
//!
//! - Parsing never panics
//! - An accepted message has a non-empty token taken verbatim from `data`
//! - The origin tag is the sender origin

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealgate_core::{InboundMessage, SessionMessage};

fuzz_target!(|input: (String, &[u8])| {
    let (origin, data) = input;
    let Ok(data) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let message = InboundMessage::new(origin.clone(), data.clone(), ());
    if let Some(session) = SessionMessage::parse(&message) {
        assert!(!session.token.is_empty());
        assert_eq!(data.get("token").and_then(|t| t.as_str()), Some(session.token.as_str()));
        assert_eq!(session.origin_tag, origin);
    }
});
