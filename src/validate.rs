//! The validation capability and the `Options` trait bound options types share.
//!
//! Validation is opaque to the rest of the crate: an options type reports a
//! list of failures, each a message plus the field names it concerns, and an
//! empty list means the instance may be persisted. Nothing here inspects how a
//! type arrives at its verdict.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::LivefigError;

/// A typed, nested options record that can be bound from and saved to a store.
///
/// `Default` supplies the values that survive when a path is missing from the
/// store, and also the baseline used to decide that a bound section is empty.
pub trait Options: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Check the instance before it is persisted or handed out as valid.
    fn validate(&self) -> Vec<ValidationFailure> {
        Vec::new()
    }
}

/// One failed rule: a message and the fields it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub message: String,
    pub fields: Vec<String>,
}

impl ValidationFailure {
    pub fn new<I, S>(message: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: message.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// All failures reported for one instance, labelled with its type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub type_name: String,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn new(type_name: impl Into<String>, failures: Vec<ValidationFailure>) -> Self {
        Self {
            type_name: type_name.into(),
            failures,
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.type_name)?;
        for failure in &self.failures {
            write!(f, "\n{} [{}]", failure.message, failure.fields.join(", "))?;
        }
        Ok(())
    }
}

/// Short type name used in messages (`DbOptions` rather than `my_app::config::DbOptions`).
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Run validation and collect the result for type `T`.
pub fn check<T: Options>(instance: &T) -> Result<(), ValidationErrors> {
    let failures = instance.validate();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors::new(short_type_name::<T>(), failures))
    }
}

/// Like [`check`] but shaped as a crate error, for callers that propagate with `?`.
pub fn ensure_valid<T: Options>(instance: &T) -> Result<(), LivefigError> {
    check(instance).map_err(LivefigError::ValidationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::DbOptions;

    #[test]
    fn valid_instance_passes() {
        let db = DbOptions {
            host: "localhost".into(),
            port: 5432,
        };
        assert!(check(&db).is_ok());
    }

    #[test]
    fn invalid_instance_reports_fields() {
        let db = DbOptions {
            host: String::new(),
            port: 5432,
        };
        let errors = check(&db).unwrap_err();
        assert_eq!(errors.type_name, "DbOptions");
        assert_eq!(errors.failures.len(), 1);
        assert_eq!(errors.failures[0].fields, vec!["host".to_string()]);
    }

    #[test]
    fn ensure_valid_maps_to_crate_error() {
        let db = DbOptions {
            host: String::new(),
            port: 0,
        };
        let err = ensure_valid(&db).unwrap_err();
        match err {
            LivefigError::ValidationFailed(errors) => assert_eq!(errors.failures.len(), 2),
            other => panic!("Expected ValidationFailed, got: {other:?}"),
        }
    }

    #[test]
    fn display_lists_each_failure() {
        let errors = ValidationErrors::new(
            "Server",
            vec![
                ValidationFailure::new("host is required", ["host"]),
                ValidationFailure::new("ports overlap", ["http_port", "https_port"]),
            ],
        );
        assert_eq!(
            errors.to_string(),
            "Server:\nhost is required [host]\nports overlap [http_port, https_port]"
        );
    }

    #[test]
    fn short_type_name_strips_module_path() {
        assert_eq!(short_type_name::<DbOptions>(), "DbOptions");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
