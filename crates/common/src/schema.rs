use std::collections::BTreeMap;

use errors::ErrorMetadata;
use serde::Deserialize;
use value::ColumnType;

/// `(table_name, date_key_column, columns)`. Invariants: `date_key_column`
/// must be a key of `columns`, and its declared type must be `TEXT`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Schema {
    pub table: String,
    pub date_key_column: String,
    pub columns: BTreeMap<String, ColumnType>,
}

impl Schema {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let schema: Schema = serde_json::from_str(json).map_err(|e| {
            anyhow::Error::new(e)
                .context(ErrorMetadata::malformed_input("InvalidSchema", "data_schema is not valid JSON"))
        })?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.columns.get(&self.date_key_column) {
            Some(ColumnType::Text) => Ok(()),
            Some(other) => Err(ErrorMetadata::invalid_schema(format!(
                "date key column {:?} must be TEXT, got {other}",
                self.date_key_column
            ))
            .into()),
            None => Err(ErrorMetadata::invalid_schema(format!(
                "date key column {:?} not found in columns",
                self.date_key_column
            ))
            .into()),
        }
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn all_metrics(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_json() -> &'static str {
        r#"{"table":"readings","date_key_column":"date","columns":{"date":"TEXT","heart_rate":"INT"}}"#
    }

    #[test]
    fn parses_valid_schema() {
        let schema = Schema::parse(schema_json()).unwrap();
        assert_eq!(schema.table, "readings");
        assert_eq!(schema.column_type("heart_rate"), Some(ColumnType::Int));
    }

    #[test]
    fn rejects_missing_date_key() {
        let json = r#"{"table":"t","date_key_column":"date","columns":{"heart_rate":"INT"}}"#;
        assert!(Schema::parse(json).is_err());
    }

    #[test]
    fn rejects_non_text_date_key() {
        let json = r#"{"table":"t","date_key_column":"date","columns":{"date":"INT"}}"#;
        assert!(Schema::parse(json).is_err());
    }
}
