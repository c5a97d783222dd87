mod interval_set;

pub use interval_set::{
    IntervalSet,
    MergeOutcome,
};
