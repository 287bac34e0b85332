//! Client-certificate authentication.
//!
//! ```text
//! request → Evidence::collect() → authenticate() → Outcome
//!             proxy headers         ├─ Authenticated(ClientIdentity) → handler
//!             peer certificate      ├─ Rejected(Rejection)           → 401
//!             nothing               └─ Unauthenticated               → handler
//! ```

pub mod dn;
pub mod gate;
pub mod identity;

pub use dn::{parse_dn, DnAttributes};
pub use gate::{authenticate, mtls_gate, Evidence, MtlsGate, Outcome, Rejection, PROXY_VERIFY_SUCCESS};
pub use identity::{ClientIdentity, ClientSummary, IdentitySource};
