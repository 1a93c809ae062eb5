mod domain;
mod registry;
mod version;

pub use domain::{
    Channel, ContentItem, EarningsSummary, Notification, NotificationKind, SnapshotDocument,
};
pub use registry::{MigrationKind, VersionDescriptor, VersionRegistry};
pub use version::Version;
