//! Schema descriptors for the per-category product tables
//!
//! One generic store and one generic parser are driven by these tables
//! instead of five hand-written implementations. A descriptor lists, in
//! column order, every field of a record kind together with the header label
//! used by the remote sheet and the field's semantic type.

use crate::domain::category::ProductCategory;

/// Semantic type of a field, shared by parsing and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    OptionalText,
    Integer,
    Flag,
}

impl FieldKind {
    /// SQLite column definition used when creating or extending a table.
    pub const fn sql_definition(self) -> &'static str {
        match self {
            Self::Text => "TEXT NOT NULL DEFAULT ''",
            Self::OptionalText => "TEXT",
            Self::Integer | Self::Flag => "INTEGER NOT NULL DEFAULT 0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name in the local table.
    pub column: &'static str,
    /// Header label in row 0 of the remote sheet.
    pub header: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(column: &'static str, header: &'static str, kind: FieldKind) -> Self {
        Self { column, header, kind }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub category: ProductCategory,
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    /// Column whose value derives the record identity.
    pub identity_column: &'static str,
}

impl SchemaDescriptor {
    /// Header labels that must all be present for a grid to be accepted.
    pub fn required_headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.header)
    }

    /// Number of cells a data row must have to be accepted.
    pub fn expected_cell_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, column: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.column == column)
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.column == column)
    }
}

pub const NAME: FieldSpec = FieldSpec::new("name", "name", FieldKind::Text);
pub const PRICE: FieldSpec = FieldSpec::new("price", "price", FieldKind::Integer);
pub const URL: FieldSpec = FieldSpec::new("url", "url", FieldKind::OptionalText);
pub const IMAGE_URL: FieldSpec = FieldSpec::new("image_url", "img", FieldKind::OptionalText);

pub static HEADPHONES: SchemaDescriptor = SchemaDescriptor {
    category: ProductCategory::Headphones,
    table: "headphones",
    fields: &[
        NAME,
        URL,
        IMAGE_URL,
        PRICE,
        FieldSpec::new("amp_required", "amp", FieldKind::Flag),
        FieldSpec::new("back_type", "back_type", FieldKind::Text),
        FieldSpec::new("frequency_response_type", "category", FieldKind::Text),
        FieldSpec::new("review_url", "review", FieldKind::OptionalText),
    ],
    identity_column: "name",
};

pub static IN_EAR_MONITORS: SchemaDescriptor = SchemaDescriptor {
    category: ProductCategory::InEars,
    table: "in_ear_monitors",
    fields: &[
        NAME,
        URL,
        IMAGE_URL,
        PRICE,
        FieldSpec::new("frequency_response_type", "category", FieldKind::Text),
    ],
    identity_column: "name",
};

pub static SPEAKERS: SchemaDescriptor = SchemaDescriptor {
    category: ProductCategory::Speakers,
    table: "speakers",
    fields: &[
        NAME,
        URL,
        IMAGE_URL,
        PRICE,
        FieldSpec::new("self_powered", "powered", FieldKind::Flag),
    ],
    identity_column: "name",
};

pub static SUBWOOFERS: SchemaDescriptor = SchemaDescriptor {
    category: ProductCategory::Subwoofers,
    table: "subwoofers",
    fields: &[
        NAME,
        URL,
        IMAGE_URL,
        PRICE,
        FieldSpec::new("style", "style", FieldKind::Text),
    ],
    identity_column: "name",
};

pub static HEADPHONE_SOURCES: SchemaDescriptor = SchemaDescriptor {
    category: ProductCategory::HeadphoneSources,
    table: "headphone_sources",
    fields: &[
        NAME,
        URL,
        IMAGE_URL,
        PRICE,
        FieldSpec::new("form_factor", "form_factor", FieldKind::Text),
        FieldSpec::new("unit_type", "type", FieldKind::Text),
        FieldSpec::new("topology", "topology", FieldKind::Text),
        FieldSpec::new("balanced", "balanced", FieldKind::Flag),
    ],
    identity_column: "name",
};

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    Integer(i64),
    Flag(bool),
}

impl FieldValue {
    pub const fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Text(String::new()),
            FieldKind::OptionalText => Self::OptionalText(None),
            FieldKind::Integer => Self::Integer(0),
            FieldKind::Flag => Self::Flag(false),
        }
    }
}

/// One record laid out in its descriptor's column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    schema: &'static SchemaDescriptor,
    values: Vec<FieldValue>,
}

impl FieldRow {
    /// A row with every field at its type default.
    pub fn new(schema: &'static SchemaDescriptor) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|field| FieldValue::default_for(field.kind))
            .collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &'static SchemaDescriptor {
        self.schema
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Unknown columns are ignored.
    pub fn set(&mut self, column: &str, value: FieldValue) {
        if let Some(index) = self.schema.position(column) {
            self.values[index] = value;
        }
    }

    pub fn with(mut self, column: &str, value: FieldValue) -> Self {
        self.set(column, value);
        self
    }

    fn get(&self, column: &str) -> Option<&FieldValue> {
        self.schema.position(column).map(|index| &self.values[index])
    }

    pub fn text(&self, column: &str) -> String {
        match self.get(column) {
            Some(FieldValue::Text(text) | FieldValue::OptionalText(Some(text))) => text.clone(),
            _ => String::new(),
        }
    }

    pub fn optional_text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            Some(FieldValue::OptionalText(text)) => text.clone(),
            Some(FieldValue::Text(text)) if !text.is_empty() => Some(text.clone()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> i64 {
        match self.get(column) {
            Some(FieldValue::Integer(value)) => *value,
            _ => 0,
        }
    }

    pub fn flag(&self, column: &str) -> bool {
        matches!(self.get(column), Some(FieldValue::Flag(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headphone_schema_requires_the_eight_sheet_labels() {
        let mut headers: Vec<_> = HEADPHONES.required_headers().collect();
        headers.sort_unstable();
        assert_eq!(
            headers,
            vec!["amp", "back_type", "category", "img", "name", "price", "review", "url"]
        );
        assert_eq!(HEADPHONES.expected_cell_count(), 8);
    }

    #[test]
    fn descriptors_start_with_the_common_fields() {
        for category in ProductCategory::ALL {
            let schema = category.schema();
            assert!(schema.field("name").is_some());
            assert!(schema.field("price").is_some());
            assert!(schema.field("url").is_some());
            assert!(schema.field("image_url").is_some());
            assert_eq!(schema.identity_column, "name");
        }
    }

    #[test]
    fn field_row_defaults_and_setters() {
        let row = FieldRow::new(&SPEAKERS)
            .with("name", FieldValue::Text("LS50".into()))
            .with("self_powered", FieldValue::Flag(true))
            .with("not_a_column", FieldValue::Integer(7));

        assert_eq!(row.text("name"), "LS50");
        assert!(row.flag("self_powered"));
        assert_eq!(row.integer("price"), 0);
        assert_eq!(row.optional_text("url"), None);
        assert_eq!(row.values().len(), SPEAKERS.fields.len());
    }
}
