//! Operations applied to a [`crate::SimWorld`].
//!
//! Small closed enums rather than free-form strings, so generated sequences
//! hit the interesting cases (right origin, valid payload) often.

use arbitrary::Arbitrary;

/// One step of a simulated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// A message arrives on the out-of-band channel
    Deliver {
        /// Claimed sender origin
        origin: OriginChoice,
        /// Message payload shape
        payload: PayloadChoice,
        /// Sender reply handle
        source: u8,
    },
    /// An animation frame passes
    Tick,
    /// Virtual time moves without a frame
    AdvanceTime {
        /// How far
        millis: u16,
    },
    /// The crypto primitives finish loading
    LoadPrimitives,
    /// A completion subscriber registers
    Subscribe,
    /// The UI engine sends a request with one parameter
    Request {
        /// Selects the parameter value
        value: u8,
    },
    /// A response arrives for the swap target
    Response {
        /// Carries a rotated auth token
        rotate: bool,
        /// Body is an encrypted fragment
        fragment: bool,
    },
    /// The host starts refusing posts
    HostRefuses,
}

/// Sender origin of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum OriginChoice {
    /// The expected parent origin
    Parent,
    /// The parent origin with a trailing slash (not equal)
    ParentWithSlash,
    /// Some other site
    Foreign,
}

/// Shape of a delivered message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum PayloadChoice {
    /// `{ token }` with the session token
    Valid,
    /// `{ token, pubkey }` with the session token
    WithPubkey,
    /// `{ token }` that fails claims verification
    Rejected,
    /// `{}`
    MissingToken,
    /// `{ token: "" }`
    EmptyToken,
    /// A bare string
    NotObject,
}

impl OriginChoice {
    /// Whether a message from this origin can be accepted.
    pub fn is_expected(self) -> bool {
        matches!(self, Self::Parent)
    }
}

impl PayloadChoice {
    /// Whether this payload parses as a session message.
    pub fn is_well_formed(self) -> bool {
        matches!(self, Self::Valid | Self::WithPubkey | Self::Rejected)
    }
}
