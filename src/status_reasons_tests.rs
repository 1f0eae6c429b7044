// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_reasons` module

#[cfg(test)]
mod tests {
    use crate::status_reasons::*;

    #[test]
    fn test_condition_constants() {
        assert_eq!(CONDITION_TYPE_READY, "Ready");
        assert_eq!(CONDITION_STATUS_TRUE, "True");
        assert_eq!(CONDITION_STATUS_FALSE, "False");
    }

    #[test]
    fn test_reasons_are_camel_case() {
        for reason in [
            REASON_BINDINGS_REALIZED,
            REASON_DEPENDENCY_NOT_READY,
            REASON_INVALID_SPEC,
            REASON_UNSUPPORTED_TARGET,
            REASON_VPC_MISMATCH,
            REASON_NESTED_BINDING_CONFLICT,
            REASON_BACKEND_WRITE_FAILED,
            REASON_BACKEND_LIST_FAILED,
        ] {
            assert!(
                reason.chars().next().is_some_and(char::is_uppercase),
                "{reason} should start with an uppercase letter"
            );
            assert!(
                reason.chars().all(char::is_alphanumeric),
                "{reason} should not contain separators"
            );
        }
    }

    #[test]
    fn test_dependency_not_ready_value() {
        assert_eq!(REASON_DEPENDENCY_NOT_READY, "DependencyNotReady");
    }
}
