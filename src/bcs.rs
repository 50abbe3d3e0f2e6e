//! Body-condition scoring: a pure function of the questionnaire total.

use crate::error::{AppError, AppResult};

/// Ascending thresholds mapping an answer total to a stage. Policy data,
/// not a validated veterinary scale.
const THRESHOLDS: &[(f64, i64, &str)] = &[
    (3.0, 3, "underweight"),
    (5.0, 4, "slightly thin"),
    (7.0, 5, "ideal"),
    (9.0, 6, "slightly overweight"),
];

const OVER_LIMIT: (i64, &str) = (8, "obese");

pub fn stage_for_total(total: f64) -> (i64, &'static str) {
    for (limit, number, text) in THRESHOLDS {
        if total <= *limit {
            return (*number, text);
        }
    }
    OVER_LIMIT
}

/// Validate the raw `answers` payload: it must be present, must be a list,
/// and every element must be numeric. No silent coercion.
pub fn parse_answers(raw: Option<&serde_json::Value>) -> AppResult<Vec<f64>> {
    let value = raw.ok_or_else(|| AppError::Validation("answers is required".into()))?;
    let list = value
        .as_array()
        .ok_or_else(|| AppError::Validation("answers must be a list".into()))?;

    list.iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| AppError::Validation("answers must contain only numbers".into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boundary_totals_map_to_expected_stages() {
        assert_eq!(stage_for_total(3.0), (3, "underweight"));
        assert_eq!(stage_for_total(5.0), (4, "slightly thin"));
        assert_eq!(stage_for_total(7.0), (5, "ideal"));
        assert_eq!(stage_for_total(9.0), (6, "slightly overweight"));
        assert_eq!(stage_for_total(10.0), (8, "obese"));
    }

    #[test]
    fn stage_depends_only_on_the_sum() {
        let a: f64 = parse_answers(Some(&json!([1, 2]))).unwrap().iter().sum();
        let b: f64 = parse_answers(Some(&json!([3, 0]))).unwrap().iter().sum();
        assert_eq!(stage_for_total(a), stage_for_total(b));
    }

    #[test]
    fn missing_answers_is_a_validation_error() {
        let err = parse_answers(None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_list_answers_is_a_validation_error() {
        let err = parse_answers(Some(&json!("1,2,3"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_numeric_element_is_a_validation_error() {
        let err = parse_answers(Some(&json!([1, "two", 3]))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn null_answers_is_a_validation_error() {
        let err = parse_answers(Some(&json!(null))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
