/// Specifies the direction for a view primary-sort field.
///
/// # Purpose
/// Defines whether a search view orders documents by a sort field in ascending
/// (low to high) or descending (high to low) order. Used by the `AddSort`
/// subcommand and the `View` target's sort list.
///
/// # Variants
/// - `Ascending`: Sort from smallest to largest value (A to Z, 0 to 9)
/// - `Descending`: Sort from largest to smallest value (Z to A, 9 to 0)
///
/// # Characteristics
/// - **Copy**: Can be copied instead of cloned
/// - **Comparable**: Can be compared for equality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SortDirection {
    /// Sort in ascending order (smallest to largest, A-Z)
    Ascending,
    /// Sort in descending order (largest to smallest, Z-A)
    Descending,
}

impl SortDirection {
    /// Returns the wire name of this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction_names() {
        assert_eq!(SortDirection::Ascending.as_str(), "asc");
        assert_eq!(SortDirection::Descending.as_str(), "desc");
    }
}
