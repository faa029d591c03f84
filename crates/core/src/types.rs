/// Key under which a pipeline job is tracked (the project identifier, or a
/// `uuid_planId` composite when the caller supplies no project).
pub type JobKey = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
