//! [`CryptoFacade`] over the shared keyring and session token claims.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use sealgate_core::{CryptoError, CryptoFacade, Environment};

use crate::{
    claims::{self, SessionClaims},
    keyring::SharedKeyring,
};

/// Reference crypto façade.
///
/// Models a primitive module that finishes loading asynchronously:
/// [`CryptoFacade::is_loaded`] stays false until the paired
/// [`FacadeLoader`] reports the module ready.
#[derive(Debug, Clone)]
pub struct SealgateFacade<E> {
    env: E,
    loaded: Arc<AtomicBool>,
}

/// Handle held by whatever loads the primitives.
#[derive(Debug, Clone)]
pub struct FacadeLoader {
    loaded: Arc<AtomicBool>,
}

impl FacadeLoader {
    /// Report the primitives as available.
    pub fn mark_loaded(&self) {
        if !self.loaded.swap(true, Ordering::AcqRel) {
            tracing::debug!("crypto primitives loaded");
        }
    }
}

impl<E: Environment> SealgateFacade<E> {
    /// Façade that is not yet loaded, and the handle that loads it.
    pub fn new(env: E) -> (Self, FacadeLoader) {
        let loaded = Arc::new(AtomicBool::new(false));
        (Self { env, loaded: Arc::clone(&loaded) }, FacadeLoader { loaded })
    }

    /// Façade whose primitives are available immediately.
    pub fn preloaded(env: E) -> Self {
        Self { env, loaded: Arc::new(AtomicBool::new(true)) }
    }
}

impl<E: Environment> CryptoFacade for SealgateFacade<E> {
    type Claims = SessionClaims;
    type Keyring = SharedKeyring<E>;

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn verify_claims(
        &self,
        origin: &str,
        token: &str,
        pubkey: Option<&str>,
    ) -> Result<SessionClaims, CryptoError> {
        if !self.is_loaded() {
            return Err(CryptoError::NotLoaded);
        }
        claims::verify_claims(origin, token, pubkey, self.env.wall_clock_secs())
    }

    fn keyring(&self, claims: SessionClaims) -> Result<SharedKeyring<E>, CryptoError> {
        Ok(SharedKeyring::from_secrets(self.env.clone(), claims.secrets())?)
    }
}

#[cfg(test)]
mod tests {
    use sealgate_core::Keyring;

    use super::*;
    use crate::{claims::TokenIssuer, keyring::KeyringSecrets, test_env::CountingEnv};

    const ORIGIN: &str = "https://parent";

    #[test]
    fn not_loaded_until_loader_fires() {
        let (facade, loader) = SealgateFacade::new(CountingEnv::at(100));
        assert!(!facade.is_loaded());
        assert_eq!(facade.verify_claims(ORIGIN, "a.b.c", None).unwrap_err(), CryptoError::NotLoaded);

        loader.mark_loaded();
        loader.mark_loaded();
        assert!(facade.is_loaded());
    }

    #[test]
    fn verifies_and_builds_client_keyring() {
        let env = CountingEnv::at(100);
        let secrets = KeyringSecrets::generate(&env, "server-pk", "client");
        let token = TokenIssuer::new(ORIGIN, [1; 32], 60)
            .issue_session_token(&env, "sid", &secrets)
            .unwrap();
        let server = SharedKeyring::from_secrets(env.clone(), &secrets).unwrap().mirrored();

        let facade = SealgateFacade::preloaded(env);
        let claims = facade.verify_claims(ORIGIN, &token, Some("server-pk")).unwrap();
        let client = facade.keyring(claims).unwrap();

        let fragment = server.encrypt("<p>hi</p>").unwrap();
        assert_eq!(client.decrypt(&fragment).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn expiry_uses_environment_wall_clock() {
        let env = CountingEnv::at(100);
        let secrets = KeyringSecrets::generate(&env, "a", "b");
        let token =
            TokenIssuer::new(ORIGIN, [1; 32], 60).issue_session_token(&env, "sid", &secrets).unwrap();

        let late = SealgateFacade::preloaded(CountingEnv::at(200));
        assert!(late.verify_claims(ORIGIN, &token, None).unwrap_err().is_fatal());
    }
}
