//! Session identity for the marketplace client: the signed-in user's profile,
//! the authentication wire types, the shared `Session` state and the controller
//! that moves it between anonymous and authenticated.

mod profile;
mod provider;
mod session;
mod controller;

pub use profile::{Role, UserProfile};
pub use provider::{AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest, TokenResponse};
pub use session::{Session, SessionState};
pub use controller::SessionController;
