//! Harvest core: identifiers, the session state machine and range assembly.
//!
//! Nothing here performs IO; the engine crate drives these types.
mod assemble;
mod context;
mod message;
mod range;
mod request;
mod session;
mod snowflake;

pub use assemble::{assemble, AssembleError};
pub use context::{ChannelContext, DIRECT_MESSAGES_GUILD};
pub use message::{Author, Message};
pub use range::{Anchors, Range, RangeEnd};
pub use request::{
    AnchorSlot, CallerError, Credential, HarvestInput, HarvestRequest, DEFAULT_MAX_ATTEMPTS,
    MAX_PAGE_SIZE,
};
pub use session::{Collected, HarvestSession, PageVerdict, SessionState, StopReason};
pub use snowflake::{compare_ids, IdError, Snowflake};
