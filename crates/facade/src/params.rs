use common::Schema;
use errors::ErrorMetadata;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// The `addData` wire payload: `{"startDate", "endDate", "points": [...]}`.
/// Points are decoded against the instance's `Schema` rather than derived
/// generically, since each column's JSON shape depends on its declared type.
#[derive(Deserialize)]
pub struct AddDataParams {
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    #[serde(default)]
    pub points: Vec<JsonValue>,
}

impl AddDataParams {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            anyhow::Error::new(e).context(ErrorMetadata::malformed_input("InvalidAddData", "addData params are not valid JSON"))
        })
    }

    pub fn into_batch(self, schema: &Schema) -> anyhow::Result<common::PointBatch> {
        let mut points = Vec::with_capacity(self.points.len());
        for value in &self.points {
            let obj = value.as_object().ok_or_else(|| {
                ErrorMetadata::malformed_input("InvalidAddData", "every element of points must be a JSON object")
            })?;
            points.push(common::Point::from_json(obj, schema));
        }
        Ok(common::PointBatch::new(self.start_date, self.end_date, points))
    }
}
