//! Value objects - immutable identifiers carried by gateway events

mod snowflake;

pub use snowflake::{Snowflake, SnowflakeParseError};
