//! Interactive formula editing on top of the tokenizer.

pub mod autocomplete;
pub mod colors;
pub mod cycle;
pub mod env;
pub mod error;
pub mod memory;
pub mod session;
pub mod style;

pub use autocomplete::{FunctionProposals, Proposal, ProposalKind, ProposalProvider};
pub use env::{
    Capabilities, Collaborators, EditTarget, Notification, NotificationLevel, NotificationSink, OwnerId,
    SelectionEvent, SelectionEventMode, SelectionSource, ZoneResolver,
};
pub use error::SessionError;
pub use memory::MemoryWorkbook;
pub use session::{CommitOutcome, ComposerSession, EditionMode, Highlight, SessionOptions, StructureChange};
