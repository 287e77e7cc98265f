//! Inputs flowing in, payloads flowing out, and what handlers report

mod input;
mod payload;
mod response;
mod stream;

pub use input::{
    Identity, Input, ProjectAction, ProjectInput, RepresentationAction, RepresentationInput,
};
pub use payload::Payload;
pub use response::{ChangeDescription, ChangeKind, EventHandlerResponse, RefreshPredicate};
pub use stream::{PayloadBroadcaster, PayloadStream, DEFAULT_CHANNEL_CAPACITY};
