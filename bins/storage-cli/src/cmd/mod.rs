pub mod batch;
pub mod blob;
pub mod insert;
pub mod query;

use storage_core::{AuthenticatedTransport, StorageConfig};
use table_client::PropertyValue;
use table_client::value::parse_datetime;

use crate::error::CliError;

const DATETIME_PREFIX: &str = "datetime:";

pub(crate) fn transport(settings: &StorageConfig) -> Result<AuthenticatedTransport, CliError> {
    Ok(AuthenticatedTransport::from_config(settings)?)
}

/// `name=value` into its two halves.
pub(crate) fn split_assignment(arg: &'static str, raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(CliError::Argument {
            arg,
            detail: format!("expected name=value, got '{raw}'"),
        }),
    }
}

/// Filter argument: `datetime:` prefix selects a date-time literal.
pub(crate) fn filter_arg(raw: &str) -> Result<PropertyValue, CliError> {
    match raw.strip_prefix(DATETIME_PREFIX) {
        Some(dt) => Ok(PropertyValue::DateTime(parse_datetime(dt)?)),
        None => Ok(PropertyValue::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_splits_on_first_equals() {
        assert_eq!(
            split_assignment("--prop", "Expr=a=b").unwrap(),
            ("Expr".to_string(), "a=b".to_string())
        );
        assert!(split_assignment("--prop", "novalue").is_err());
        assert!(split_assignment("--prop", "=x").is_err());
    }

    #[test]
    fn datetime_prefix_selects_literal_kind() {
        assert!(matches!(filter_arg("datetime:2020-01-01T00:00:00Z").unwrap(), PropertyValue::DateTime(_)));
        assert_eq!(filter_arg("plain").unwrap(), PropertyValue::from("plain"));
        assert!(filter_arg("datetime:yesterday").is_err());
    }
}
