/// Session lifecycle client.
///
/// Everything a front end embeds to manage its authentication session:
/// persisted-credential access, the session state machine, scheduled token
/// refresh with a re-entrancy guard and throttle, and the HTTP clients that
/// talk to the auth endpoints.
///
/// The session is a single shared object (`SessionManager`), not ambient
/// state: the timer handle, guard flag, and throttle stamp are private
/// fields with process lifetime.

mod api;
mod error;
mod manager;
mod scheduler;
mod token_store;

pub use api::{ApiClient, AuthApi, AuthPayload, HttpAuthApi};
pub use error::{DecodeError, SessionError};
pub use manager::{RefreshOutcome, SessionConfig, SessionManager, SessionState};
pub use scheduler::{compute_refresh_delay, RefreshScheduler};
pub use token_store::{
    decode_claims, is_expired, remaining_lifetime, ClientClaims, CredentialStorage, MemoryStorage,
    TokenStore, UserProfile,
};
