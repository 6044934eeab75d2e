//! Tests for error constants
//! This ensures all error codes are unique and sit in their documented ranges

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use wlm_error::{ErrorKind, codes};

    fn check_range(seen: &mut HashSet<u16>, group: &[u16], range: std::ops::Range<u16>, name: &str) {
        for code in group {
            assert!(seen.insert(*code), "Duplicate error code: {}", code);
            assert!(range.contains(code), "{} error code {} out of range", name, code);
        }
    }

    #[test]
    fn test_all_error_constants_are_unique() {
        let mut seen_codes = HashSet::new();

        check_range(
            &mut seen_codes,
            &[
                codes::INVALID_MODULE,
                codes::UNSUPPORTED_FEATURE,
                codes::UNEXPECTED_END,
                codes::INVALID_HEADER,
                codes::INVALID_LEB128,
                codes::VALIDATION_LIMIT_EXCEEDED,
            ],
            1000..2000,
            "Module",
        );
        check_range(
            &mut seen_codes,
            &[
                codes::UNRESOLVED_IMPORT,
                codes::TYPE_MISMATCH,
                codes::LINK_ERROR,
                codes::ELEMENT_SEGMENT_OUT_OF_BOUNDS,
                codes::DATA_SEGMENT_OUT_OF_BOUNDS,
            ],
            2000..3000,
            "Linking",
        );
        check_range(
            &mut seen_codes,
            &[
                codes::INSTANTIATION_TRAP,
                codes::EXPORT_NOT_FOUND,
                codes::ARITY_MISMATCH,
                codes::TRAP,
                codes::ENGINE_FAULT,
            ],
            3000..4000,
            "Execution",
        );
        check_range(
            &mut seen_codes,
            &[codes::ILLEGAL_STATE, codes::IN_USE, codes::USE_AFTER_FREE, codes::BUSY],
            4000..5000,
            "Lifecycle",
        );
        check_range(
            &mut seen_codes,
            &[codes::RESOURCE_LIMIT_EXCEEDED, codes::MEMORY_ALLOCATION_FAILED],
            5000..6000,
            "Resource",
        );
    }

    #[test]
    fn test_every_lifecycle_kind_has_a_code() {
        let kinds: HashSet<ErrorKind> = [
            codes::INVALID_MODULE,
            codes::UNRESOLVED_IMPORT,
            codes::TYPE_MISMATCH,
            codes::LINK_ERROR,
            codes::INSTANTIATION_TRAP,
            codes::EXPORT_NOT_FOUND,
            codes::ARITY_MISMATCH,
            codes::TRAP,
            codes::ENGINE_FAULT,
            codes::ILLEGAL_STATE,
            codes::IN_USE,
            codes::USE_AFTER_FREE,
            codes::BUSY,
            codes::RESOURCE_LIMIT_EXCEEDED,
        ]
        .into_iter()
        .map(ErrorKind::from_code)
        .collect();
        assert_eq!(kinds.len(), 14);
    }
}
