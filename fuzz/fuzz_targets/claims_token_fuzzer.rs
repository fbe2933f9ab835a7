//! Fuzz target for session token verification
//!
//! Feed arbitrary and mutated tokens to claims verification
//!
//! # Strategy
//!
//! - Raw strings: arbitrary segment counts and bytes
//! - Mutations: a genuine token with one byte flipped or truncated
//!
//! # Invariants
//!
//! - Verification never panics
//! - Every failure is a fatal claims error
//! - A mutated token never verifies with a different session id

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealgate_core::Environment;
use sealgate_crypto::{KeyringSecrets, TokenIssuer, verify_claims};
use sealgate_harness::SimEnv;

const ISSUER: &str = "https://parent";

#[derive(Debug, Arbitrary)]
enum TokenInput {
    Raw(String),
    Mutated { index: u16, byte: u8 },
    Truncated { len: u16 },
}

fuzz_target!(|input: TokenInput| {
    let env = SimEnv::with_seed(0);
    let secrets = KeyringSecrets::generate(&env, "server", "client");
    let genuine = TokenIssuer::new(ISSUER, [7; 32], 60)
        .issue_session_token(&env, "session", &secrets)
        .expect("issuing a token succeeds");

    let token = match input {
        TokenInput::Raw(raw) => raw,
        TokenInput::Mutated { index, byte } => {
            let mut bytes = genuine.clone().into_bytes();
            let i = usize::from(index) % bytes.len();
            bytes[i] = byte;
            String::from_utf8_lossy(&bytes).into_owned()
        },
        TokenInput::Truncated { len } => {
            genuine.chars().take(usize::from(len)).collect()
        },
    };

    match verify_claims(ISSUER, &token, None, env.wall_clock_secs()) {
        Ok(claims) => {
            assert_eq!(claims.session_id(), "session");
            assert_eq!(claims.secrets(), &secrets);
        },
        Err(err) => assert!(err.is_fatal(), "non-fatal claims error: {err}"),
    }
});
