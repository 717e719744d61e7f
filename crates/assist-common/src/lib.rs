pub mod api;
pub mod errors;
pub mod protocol;

pub use api::{
    CloseRequest, CloseResponse, CreateRequest, CreateResponse, ErrorResponse, HealthResponse,
    JoinRequest, JoinResponse, StatusResponse,
};
pub use errors::{AuthError, PairingError, SendError, TransitionError};
pub use protocol::{AuthRequest, CloseReason, Envelope, Role, ServerEvent, SessionStatus};
