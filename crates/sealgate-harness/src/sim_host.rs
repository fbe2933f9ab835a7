//! Recording host for the out-of-band channel.

use sealgate_client::Host;
use thiserror::Error;

/// Reply handle of a simulated sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u8);

/// An acknowledgment the session posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Recipient
    pub source: SourceId,
    /// Posted message
    pub message: String,
    /// Target origin the post was restricted to
    pub origin: String,
}

/// Simulated host failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimHostError {
    /// The host was configured to refuse posts
    #[error("post to {0:?} refused")]
    Refused(SourceId),
}

/// Host that records everything the session asks of it.
#[derive(Debug, Clone)]
pub struct SimHost {
    acks: Vec<Ack>,
    refused: u32,
    stop_calls: u32,
    refuse_posts: bool,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Listening host that accepts every post.
    pub fn new() -> Self {
        Self { acks: Vec::new(), refused: 0, stop_calls: 0, refuse_posts: false }
    }

    /// Host whose posts always fail.
    pub fn refusing() -> Self {
        Self { refuse_posts: true, ..Self::new() }
    }

    /// Fail every post from now on.
    pub fn refuse_posts(&mut self) {
        self.refuse_posts = true;
    }

    /// Whether posts currently fail.
    pub fn is_refusing(&self) -> bool {
        self.refuse_posts
    }

    /// Posts that were refused.
    pub fn refused(&self) -> u32 {
        self.refused
    }

    /// Acknowledgments posted so far.
    pub fn acks(&self) -> &[Ack] {
        &self.acks
    }

    /// Times the session unregistered its listener.
    pub fn stop_calls(&self) -> u32 {
        self.stop_calls
    }
}

impl Host for SimHost {
    type Source = SourceId;
    type Error = SimHostError;

    fn post_message(
        &mut self,
        source: &SourceId,
        message: &str,
        target_origin: &str,
    ) -> Result<(), SimHostError> {
        if self.refuse_posts {
            self.refused += 1;
            return Err(SimHostError::Refused(*source));
        }
        self.acks.push(Ack {
            source: *source,
            message: message.to_string(),
            origin: target_origin.to_string(),
        });
        Ok(())
    }

    fn stop_listening(&mut self) -> Result<(), SimHostError> {
        self.stop_calls += 1;
        Ok(())
    }
}
