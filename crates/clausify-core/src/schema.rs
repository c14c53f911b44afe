/// Arrow schema definitions for clause tables.
pub mod clauses {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const TEXT: &str = "text";
    pub const LABEL: &str = "label";

    /// Schema of `clauses_clean.csv`: one row per extracted clause.
    pub fn clause_table_schema() -> Schema {
        Schema::new(vec![
            Field::new(TEXT, DataType::Utf8, false),
            Field::new(LABEL, DataType::Utf8, false),
        ])
    }

    /// Schema for a contract table where every column is read as text.
    pub fn all_text_schema<'a>(columns: impl IntoIterator<Item = &'a str>) -> Schema {
        Schema::new(
            columns
                .into_iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        )
    }
}
