//! Data types of the engagement domain: addressing, interactions, state, and the
//! messages pushed to live subscribers.

pub mod entity_id;
pub mod interaction;
pub mod live;
pub mod request;
pub mod state;

pub use entity_id::*;
pub use interaction::*;
pub use live::*;
pub use request::*;
pub use state::*;
