use errors::ErrorMetadata;
use serde::Deserialize;

/// The downsampling algorithm selected for a cache instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterType {
    /// Stride over raw points, averaging fixed-size runs.
    Points,
    /// Bucket by time, but downsample a bucket's leaves by point count.
    TimeWeightedPoints,
    /// Recursively bucket by time at every downsampling level.
    TimeWeightedTime,
}

impl Default for FilterType {
    fn default() -> Self {
        FilterType::TimeWeightedPoints
    }
}

impl FilterType {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "POINTS" => Ok(FilterType::Points),
            "TIME_WEIGHTED_POINTS" => Ok(FilterType::TimeWeightedPoints),
            "TIME_WEIGHTED_TIME" => Ok(FilterType::TimeWeightedTime),
            other => Err(ErrorMetadata::invalid_filter(format!("unknown downsampling filter {other:?}")).into()),
        }
    }
}

/// One level of the downsampling ladder: points coarser than `duration_secs`
/// apart are stored pre-averaged, `num_of_points` deep.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DownsamplingLevel {
    #[serde(rename = "duration")]
    pub duration_secs: i64,
    #[serde(rename = "numOfPoints")]
    pub num_of_points: usize,
}

/// The parsed `cacheSetup` argument to `init`. An empty or whitespace-only
/// string is equivalent to `{"useCache": false}`.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheSetup {
    pub use_cache: bool,
    pub cache_raw_data: bool,
    pub fetch_ahead: i64,
    pub fetch_behind: i64,
    pub downsampling_filter: FilterType,
    pub downsampling_levels: Vec<DownsamplingLevel>,
}

impl Default for CacheSetup {
    fn default() -> Self {
        Self {
            use_cache: false,
            cache_raw_data: false,
            fetch_ahead: 0,
            fetch_behind: 0,
            downsampling_filter: FilterType::default(),
            downsampling_levels: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCacheSetup {
    #[serde(default, rename = "useCache")]
    use_cache: bool,
    #[serde(default, rename = "cacheRawData")]
    cache_raw_data: bool,
    #[serde(default, rename = "fetchAhead")]
    fetch_ahead: i64,
    #[serde(default, rename = "fetchBehind")]
    fetch_behind: i64,
    #[serde(default, rename = "downsamplingFilter")]
    downsampling_filter: Option<String>,
    #[serde(default, rename = "downsamplingLevels")]
    downsampling_levels: Vec<DownsamplingLevel>,
}

impl CacheSetup {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawCacheSetup = serde_json::from_str(json).map_err(|e| {
            anyhow::Error::new(e)
                .context(ErrorMetadata::malformed_input("InvalidCacheSetup", "cacheSetup is not valid JSON"))
        })?;
        let downsampling_filter = match raw.downsampling_filter {
            Some(s) => FilterType::parse(&s)?,
            None => FilterType::default(),
        };
        Ok(Self {
            use_cache: raw.use_cache,
            cache_raw_data: raw.cache_raw_data,
            fetch_ahead: raw.fetch_ahead,
            fetch_behind: raw.fetch_behind,
            downsampling_filter,
            downsampling_levels: raw.downsampling_levels,
        })
    }
}
