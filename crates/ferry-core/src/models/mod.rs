pub mod plan;
pub mod record;
pub mod session;

pub use plan::{DestinationProtocol, DestinationSpec, Secret, SourceLocation, TransferPlan};
pub use record::{RecordedError, TransferRecord, TransferState, TransferStrategy};
pub use session::{ApprovalReference, Credentials, Session};
