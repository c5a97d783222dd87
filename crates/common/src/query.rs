use errors::ErrorMetadata;
use serde::Deserialize;

/// A `getData` request: the inclusive date range, the target point budget,
/// and the metrics to project onto. `num_of_points <= 0` is valid wire input
/// -- it means "return the raw points, no downsampling".
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Query {
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    #[serde(rename = "numOfPoints", default)]
    pub num_of_points: i64,
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl Query {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            anyhow::Error::new(e)
                .context(ErrorMetadata::malformed_input("InvalidQuery", "query is not valid JSON"))
        })
    }

    pub fn wants_downsampling(&self) -> bool {
        self.num_of_points > 0
    }
}
