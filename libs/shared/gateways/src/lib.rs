pub mod directory;
pub mod error;
pub mod notify;

pub use directory::{
    HttpStaffDirectory, InMemoryStaffDirectory, StaffDirectory, StaffMember, StaffPage, StaffType,
};
pub use error::GatewayError;
pub use notify::{NotificationEvent, NotificationSink, RecordingNotifier, TracingNotifier};
