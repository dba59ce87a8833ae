//! Hand-off of a finished record to whoever follows up with the family.

use std::future::Future;

use crate::record::ComprehensiveRecord;

/// Receives the comprehensive record once an email address is collected.
///
/// Called fire-and-forget: the conversation never waits on the result and a
/// failure is only logged.
pub trait RecordExporter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn export(
    &self,
    email: String,
    record: ComprehensiveRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
