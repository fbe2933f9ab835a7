//! Host trait for the out-of-band message channel.
//!
//! The host is whatever owns the real channel: a browser window's message
//! listener in production, a recording stub in simulation.

/// Out-of-band channel operations the session needs.
pub trait Host {
    /// Reply handle of a message sender.
    type Source;

    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Post `message` to `source`, restricted to `target_origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered.
    fn post_message(
        &mut self,
        source: &Self::Source,
        message: &str,
        target_origin: &str,
    ) -> Result<(), Self::Error>;

    /// Unregister the session message listener.
    ///
    /// The session calls this at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be removed.
    fn stop_listening(&mut self) -> Result<(), Self::Error>;
}
