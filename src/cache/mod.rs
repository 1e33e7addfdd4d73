//! Local artifact cache
//!
//! Installed artifacts live at `<root>/<kind>/<version>/<country>/`, each
//! with a `lastused` stamp that drives age-based eviction.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`local`] | enumerate and address entries |
//! | [`stamp`] | read and write `lastused` |
//! | [`staging`] | scratch names, atomic removal, leftover sweeps |
//! | [`janitor`] | evict entries not used recently |

pub mod janitor;
pub mod local;
pub mod staging;
pub mod stamp;

pub use janitor::{CacheJanitor, CleanupReport};
pub use local::{CacheEntry, LocalCache};
