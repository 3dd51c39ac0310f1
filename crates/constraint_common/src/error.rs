// SPDX-License-Identifier: Apache-2.0

//! Shared error plumbing used by every crate that defines its own `Error`
//! enum: a `WeaverError` trait for flattening multiple errors into one
//! compound error, plus the free functions built on top of it.

use std::error::Error;

/// A trait implemented by crate-local `Error` enums so that generic code
/// (e.g. [`crate::result::WResult`]) can build a single error out of many.
pub trait WeaverError<E: Error> {
    /// Builds a single error from a list of errors.
    ///
    /// Implementations are expected to flatten nested compound errors so
    /// that `compound(vec![compound(vec![a, b]), c])` is equivalent to
    /// `compound(vec![a, b, c])`.
    fn compound(errors: Vec<E>) -> E;
}

/// Handles a list of errors, returning `Ok(())` if the list is empty or a
/// single compound error otherwise.
pub fn handle_errors<E: WeaverError<E> + Error>(errors: Vec<E>) -> Result<(), E> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(E::compound(errors))
    }
}

/// Formats a list of errors into a single human-readable string, one error
/// per paragraph.
#[must_use]
pub fn format_errors<E: Error>(errors: &[E]) -> String {
    errors
        .iter()
        .map(std::string::ToString::to_string)
        .collect::<Vec<String>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug, Clone, PartialEq)]
    enum TestError {
        #[error("single: {0}")]
        Single(String),
        #[error("{}", format_errors(.0))]
        Compound(Vec<TestError>),
    }

    impl WeaverError<TestError> for TestError {
        fn compound(errors: Vec<TestError>) -> TestError {
            TestError::Compound(
                errors
                    .into_iter()
                    .flat_map(|e| match e {
                        TestError::Compound(errors) => errors,
                        e => vec![e],
                    })
                    .collect(),
            )
        }
    }

    #[test]
    fn empty_list_is_ok() {
        assert!(handle_errors::<TestError>(vec![]).is_ok());
    }

    #[test]
    fn single_error_is_preserved() {
        let err = TestError::Single("boom".to_owned());
        let result = handle_errors(vec![err.clone()]);
        assert_eq!(result.unwrap_err(), TestError::Compound(vec![err]));
    }

    #[test]
    fn nested_compounds_are_flattened() {
        let a = TestError::Single("a".to_owned());
        let b = TestError::Single("b".to_owned());
        let nested = TestError::Compound(vec![a.clone(), b.clone()]);
        let result = handle_errors(vec![nested, TestError::Single("c".to_owned())]);
        match result {
            Err(TestError::Compound(errs)) => assert_eq!(errs.len(), 3),
            other => panic!("expected flattened compound error, got {other:?}"),
        }
    }
}
