//! jq filters (via jaq) and JSONPath expressions over decoded documents.
//!
//! Both engines share the same result shaping: exactly one match is
//! returned as that value, anything else is wrapped in an array.

mod jq;
mod jsonpath;

use crate::value::DecodedValue;

pub use jq::{JqFilter, run_jq};
pub use jsonpath::{JsonPath, run_jsonpath};

pub fn shape_results(mut results: Vec<DecodedValue>) -> DecodedValue {
    if results.len() == 1 {
        results.remove(0)
    } else {
        DecodedValue::Sequence(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_result_is_unwrapped() {
        let one = shape_results(vec![DecodedValue::from(json!(1))]);
        assert_eq!(one, DecodedValue::from(json!(1)));
        assert_eq!(shape_results(vec![]), DecodedValue::Sequence(vec![]));
        assert_eq!(
            shape_results(vec![DecodedValue::from(json!(1)), DecodedValue::from(json!(2))]),
            DecodedValue::from(json!([1, 2]))
        );
    }
}
