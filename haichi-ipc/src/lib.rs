pub mod command;
pub mod event;
pub mod outcome;
pub mod profile;

pub use command::{Command, DisplayStatus, Response, StatusInfo};
pub use event::{EventFilter, StateEvent, SubscribeRequest};
pub use outcome::{RestoreOutcome, RestoreTrigger};
pub use profile::{DisplayLayoutProfile, DisplayNode};
