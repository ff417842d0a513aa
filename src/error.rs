use thiserror::Error;

use crate::types::FieldKind;

/// SQLState reported for numeric values outside the declared column domain.
pub const SQLSTATE_OUT_OF_RANGE: &str = "22003";

/// Vendor codes that mean the server refused the credentials or the grant.
const ACCESS_DENIED_CODES: &[i32] = &[
    1044, // ER_DBACCESS_DENIED_ERROR
    1045, // ER_ACCESS_DENIED_ERROR
    1130, // ER_HOST_NOT_PRIVILEGED
    1227, // ER_SPECIFIC_ACCESS_DENIED_ERROR
    1396, // ER_CANNOT_USER
    1698, // ER_ACCESS_DENIED_NO_PASSWORD_ERROR
];

/// Error reported by a driver collaborator (cursor, connection, statement).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (vendor code {vendor_code}, SQLState {})", .sql_state.as_deref().unwrap_or("-"))]
pub struct DriverError {
    pub vendor_code: i32,
    pub sql_state: Option<String>,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            vendor_code: 0,
            sql_state: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_vendor_code(mut self, vendor_code: i32) -> Self {
        self.vendor_code = vendor_code;
        self
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// True when the driver is reporting an authentication or authorization failure.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        ACCESS_DENIED_CODES.contains(&self.vendor_code)
            || self
                .sql_state
                .as_deref()
                .is_some_and(|state| state.starts_with("28"))
    }
}

/// Failure of a cross-kind value conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Unable to convert a {from} value to a {to} value")]
    Incompatible { from: FieldKind, to: FieldKind },

    #[error("{target} overflow: {value} is not exactly representable")]
    Overflow { target: FieldKind, value: String },

    #[error("Unable to parse {text:?} as {target}")]
    Parse { target: FieldKind, text: String },
}

impl ConversionError {
    /// The kind the conversion was aiming at.
    #[must_use]
    pub fn target(&self) -> FieldKind {
        match self {
            Self::Incompatible { to, .. } => *to,
            Self::Overflow { target, .. } | Self::Parse { target, .. } => *target,
        }
    }

    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. })
    }
}

#[derive(Debug, Error)]
pub enum StealthDbError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Data range error [{sql_state}]: {message}")]
    DataRange {
        message: String,
        sql_state: &'static str,
    },

    #[error("Unable to initialize the connection: {0}")]
    ResourceInit(#[source] Box<StealthDbError>),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Access denied: {0}")]
    AccessDenied(DriverError),

    #[error("Driver error: {0}")]
    Driver(DriverError),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field index {index} out of range for {count} fields")]
    FieldIndexOutOfRange { index: usize, count: usize },

    #[error("{primary}; additionally failed to release the connection: {secondary}")]
    Chained {
        primary: Box<StealthDbError>,
        secondary: Box<StealthDbError>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl From<DriverError> for StealthDbError {
    fn from(err: DriverError) -> Self {
        if err.is_access_denied() {
            StealthDbError::AccessDenied(err)
        } else {
            StealthDbError::Driver(err)
        }
    }
}

impl StealthDbError {
    /// Attach a teardown failure to a primary error without hiding the primary.
    #[must_use]
    pub fn chain(primary: StealthDbError, secondary: StealthDbError) -> Self {
        StealthDbError::Chained {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }

    /// The error that decided the outcome, looking through any chained teardown failures.
    #[must_use]
    pub fn primary(&self) -> &StealthDbError {
        match self {
            StealthDbError::Chained { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// The teardown failure attached to this error, if any.
    #[must_use]
    pub fn secondary(&self) -> Option<&StealthDbError> {
        match self {
            StealthDbError::Chained { secondary, .. } => Some(secondary),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        match self {
            StealthDbError::AccessDenied(_) => true,
            StealthDbError::ResourceInit(inner) => inner.is_access_denied(),
            StealthDbError::Chained { primary, .. } => primary.is_access_denied(),
            _ => false,
        }
    }

    pub(crate) fn out_of_range(message: String) -> Self {
        StealthDbError::DataRange {
            message,
            sql_state: SQLSTATE_OUT_OF_RANGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mysql_access_codes() {
        let err: StealthDbError = DriverError::new("Access denied for user 'x'")
            .with_vendor_code(1045)
            .into();
        assert!(matches!(err, StealthDbError::AccessDenied(_)));
    }

    #[test]
    fn classifies_invalid_authorization_state() {
        let err: StealthDbError = DriverError::new("password authentication failed")
            .with_sql_state("28P01")
            .into();
        assert!(err.is_access_denied());
    }

    #[test]
    fn other_driver_failures_stay_generic() {
        let err: StealthDbError = DriverError::new("syntax error")
            .with_vendor_code(1064)
            .with_sql_state("42000")
            .into();
        assert!(matches!(err, StealthDbError::Driver(_)));
    }

    #[test]
    fn chained_keeps_primary() {
        let err = StealthDbError::chain(
            StealthDbError::ExecutionError("commit failed".into()),
            StealthDbError::ExecutionError("close failed".into()),
        );
        assert!(matches!(err.primary(), StealthDbError::ExecutionError(m) if m == "commit failed"));
        assert!(err.secondary().is_some());
    }
}
