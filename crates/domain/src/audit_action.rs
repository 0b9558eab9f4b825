use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shopkeep_core::AppError;

/// Stable audit actions emitted by shop use-cases.
///
/// Producers may still enqueue free-form action strings; this enum only names
/// the ones the shop itself records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A sale was recorded.
    SaleCreated,
    /// A recorded sale was edited.
    SaleUpdated,
    /// A recorded sale was removed.
    SaleDeleted,
    /// A product was added to the catalogue.
    ProductCreated,
    /// A catalogue product was edited.
    ProductUpdated,
    /// A product was removed from the catalogue.
    ProductDeleted,
    /// Stock on hand was corrected outside a sale.
    StockAdjusted,
    /// An invoice was issued.
    InvoiceCreated,
    /// An issued invoice was voided.
    InvoiceVoided,
    /// An employee advance was granted.
    AdvanceCreated,
    /// An employee advance was settled.
    AdvanceSettled,
    /// Employee details were changed.
    EmployeeUpdated,
    /// A user signed in.
    AuthLogin,
    /// A user signed out.
    AuthLogout,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaleCreated => "sale.create",
            Self::SaleUpdated => "sale.update",
            Self::SaleDeleted => "sale.delete",
            Self::ProductCreated => "product.create",
            Self::ProductUpdated => "product.update",
            Self::ProductDeleted => "product.delete",
            Self::StockAdjusted => "stock.adjust",
            Self::InvoiceCreated => "invoice.create",
            Self::InvoiceVoided => "invoice.void",
            Self::AdvanceCreated => "advance.create",
            Self::AdvanceSettled => "advance.settle",
            Self::EmployeeUpdated => "employee.update",
            Self::AuthLogin => "auth.login",
            Self::AuthLogout => "auth.logout",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditAction] = &[
            AuditAction::SaleCreated,
            AuditAction::SaleUpdated,
            AuditAction::SaleDeleted,
            AuditAction::ProductCreated,
            AuditAction::ProductUpdated,
            AuditAction::ProductDeleted,
            AuditAction::StockAdjusted,
            AuditAction::InvoiceCreated,
            AuditAction::InvoiceVoided,
            AuditAction::AdvanceCreated,
            AuditAction::AdvanceSettled,
            AuditAction::EmployeeUpdated,
            AuditAction::AuthLogin,
            AuditAction::AuthLogout,
        ];

        ALL
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl From<AuditAction> for String {
    fn from(value: AuditAction) -> Self {
        value.as_str().to_owned()
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown audit action value '{value}'")))
    }
}
