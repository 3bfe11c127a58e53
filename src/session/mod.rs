//! Session handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → strip.rs (URL marked? drop Cookie before proxying)
//!
//! Outbound response
//!     → Cache-Control: strip-session → strip.rs (mark URL, refresh timestamp)
//!
//! ESI directive with partitioner="member"
//!     → store.rs (PHPSESSID → session file → member id)
//!     → php.rs (decode PHP session payload)
//! ```

pub mod php;
pub mod store;
pub mod strip;

pub use php::{decode_session, PhpDecodeError, PhpValue};
pub use store::{PhpSessionStore, SessionError, SessionStore};
pub use strip::StripSessionRegistry;
