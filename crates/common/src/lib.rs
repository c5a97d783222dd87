pub mod interval;
pub mod persistence;
pub mod point;
pub mod query;
pub mod schema;
pub mod time_codec;
pub mod types;

pub use interval::{
    IntervalSet,
    MergeOutcome,
};
pub use persistence::BackingStore;
pub use point::{
    Point,
    PointBatch,
};
pub use query::Query;
pub use schema::Schema;
pub use time_codec::TimeCodec;
pub use types::{
    CacheSetup,
    DownsamplingLevel,
    FilterType,
};
pub use value::{
    ColumnType,
    PointValue,
};
