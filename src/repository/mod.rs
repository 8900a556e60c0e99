// ==========================================
// Roofline Ops - repository layer
// ==========================================
// Data access only; business logic stays in the engines. All queries are
// parameterized. Nested collections are JSON-encoded here and nowhere else.
// ==========================================

pub mod alert_repo;
pub mod billing_repo;
pub mod error;
pub mod reconciliation_repo;
pub mod ticket_repo;
pub mod vendor_repo;

pub use alert_repo::AlertRepository;
pub use billing_repo::BillingRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use reconciliation_repo::ReconciliationReportRepository;
pub use ticket_repo::TicketRepository;
pub use vendor_repo::VendorPurchaseRepository;

use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

/// Decode a JSON column inside a row mapper.
pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Build a column conversion error for enum parse failures inside row mappers.
pub(crate) fn invalid_col(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}
