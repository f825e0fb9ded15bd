//! Common value types shared across the migration engine.

mod sort_direction;
mod value;

pub use sort_direction::SortDirection;
pub use value::Value;
