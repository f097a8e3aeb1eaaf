pub mod event;
pub mod metadata;
pub mod relay;
pub mod service_state;

pub use event::Event;
pub use metadata::{EventRelay, Metadata, RelayMetadata};
pub use relay::Relay;
pub use service_state::{CandidateState, EventScanCursor, RelayCursor, ServiceStateRow};
