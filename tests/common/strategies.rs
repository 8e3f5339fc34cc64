use proptest::prelude::*;
use workcell_core::models::ComparisonOperator;

/// Strategy for generating comparison operators
pub fn operator_strategy() -> impl Strategy<Value = ComparisonOperator> {
    prop_oneof![
        Just(ComparisonOperator::GreaterThan),
        Just(ComparisonOperator::LessThan),
        Just(ComparisonOperator::EqualTo),
        Just(ComparisonOperator::GreaterThanOrEqual),
        Just(ComparisonOperator::LessThanOrEqual),
    ]
}

/// Strategy for generating resource quantities
pub fn quantity_strategy() -> impl Strategy<Value = f64> {
    (0u32..500).prop_map(|value| f64::from(value) / 4.0)
}

/// Strategy for generating non-negative edge weights
pub fn weight_strategy() -> impl Strategy<Value = f64> {
    (0u32..1000).prop_map(|value| f64::from(value) / 10.0)
}

/// Strategy for generating fill ratios, including overfull locations
pub fn utilization_strategy() -> impl Strategy<Value = f64> {
    (0u32..150).prop_map(|value| f64::from(value) / 100.0)
}

/// Strategy for generating workflow step counts
pub fn step_count_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}
