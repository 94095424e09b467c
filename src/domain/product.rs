use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::category::ProductCategory;
use crate::domain::schema::{FieldRow, FieldValue};

/// Record identity, derived from the product name alone.
///
/// Two records with the same name are the same entity whatever their other
/// fields say, so a name collision upstream silently overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl ProductId {
    /// First eight bytes (little endian) of the BLAKE3 digest of `name`.
    /// Stable across processes and platforms.
    pub fn from_name(name: &str) -> Self {
        let digest = blake3::hash(name.as_bytes());
        let mut bytes = [0_u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        Self(i64::from_le_bytes(bytes))
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headphone {
    pub name: String,
    pub price: i64,
    pub url: Option<String>,
    pub review_url: Option<String>,
    pub image_url: Option<String>,
    pub amp_required: bool,
    pub back_type: String,
    pub frequency_response_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InEarMonitor {
    pub name: String,
    pub price: i64,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub frequency_response_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    pub name: String,
    pub price: i64,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub self_powered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subwoofer {
    pub name: String,
    pub price: i64,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadphoneSource {
    pub name: String,
    pub price: i64,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub form_factor: String,
    pub unit_type: String,
    pub topology: String,
    pub balanced: bool,
}

/// A catalog entry of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProductRecord {
    Headphone(Headphone),
    InEarMonitor(InEarMonitor),
    Speaker(Speaker),
    Subwoofer(Subwoofer),
    HeadphoneSource(HeadphoneSource),
}

macro_rules! common_field {
    ($self:ident, $field:ident) => {
        match $self {
            Self::Headphone(r) => &r.$field,
            Self::InEarMonitor(r) => &r.$field,
            Self::Speaker(r) => &r.$field,
            Self::Subwoofer(r) => &r.$field,
            Self::HeadphoneSource(r) => &r.$field,
        }
    };
}

impl ProductRecord {
    pub const fn category(&self) -> ProductCategory {
        match self {
            Self::Headphone(_) => ProductCategory::Headphones,
            Self::InEarMonitor(_) => ProductCategory::InEars,
            Self::Speaker(_) => ProductCategory::Speakers,
            Self::Subwoofer(_) => ProductCategory::Subwoofers,
            Self::HeadphoneSource(_) => ProductCategory::HeadphoneSources,
        }
    }

    pub fn name(&self) -> &str {
        common_field!(self, name)
    }

    pub fn price(&self) -> i64 {
        *common_field!(self, price)
    }

    pub fn url(&self) -> Option<&str> {
        common_field!(self, url).as_deref()
    }

    pub fn image_url(&self) -> Option<&str> {
        common_field!(self, image_url).as_deref()
    }

    pub fn id(&self) -> ProductId {
        ProductId::from_name(self.name())
    }

    /// Build the record kind selected by the row's schema.
    pub fn from_field_row(row: &FieldRow) -> Self {
        let name = row.text("name");
        let price = row.integer("price").max(0);
        let url = row.optional_text("url");
        let image_url = row.optional_text("image_url");

        match row.schema().category {
            ProductCategory::Headphones => Self::Headphone(Headphone {
                name,
                price,
                url,
                review_url: row.optional_text("review_url"),
                image_url,
                amp_required: row.flag("amp_required"),
                back_type: row.text("back_type"),
                frequency_response_type: row.text("frequency_response_type"),
            }),
            ProductCategory::InEars => Self::InEarMonitor(InEarMonitor {
                name,
                price,
                url,
                image_url,
                frequency_response_type: row.text("frequency_response_type"),
            }),
            ProductCategory::Speakers => Self::Speaker(Speaker {
                name,
                price,
                url,
                image_url,
                self_powered: row.flag("self_powered"),
            }),
            ProductCategory::Subwoofers => Self::Subwoofer(Subwoofer {
                name,
                price,
                url,
                image_url,
                style: row.text("style"),
            }),
            ProductCategory::HeadphoneSources => Self::HeadphoneSource(HeadphoneSource {
                name,
                price,
                url,
                image_url,
                form_factor: row.text("form_factor"),
                unit_type: row.text("unit_type"),
                topology: row.text("topology"),
                balanced: row.flag("balanced"),
            }),
        }
    }

    /// Lay the record out in its category's column order.
    pub fn to_field_row(&self) -> FieldRow {
        let row = FieldRow::new(self.category().schema())
            .with("name", FieldValue::Text(self.name().to_string()))
            .with("price", FieldValue::Integer(self.price()))
            .with("url", FieldValue::OptionalText(self.url().map(str::to_string)))
            .with("image_url", FieldValue::OptionalText(self.image_url().map(str::to_string)));

        match self {
            Self::Headphone(r) => row
                .with("review_url", FieldValue::OptionalText(r.review_url.clone()))
                .with("amp_required", FieldValue::Flag(r.amp_required))
                .with("back_type", FieldValue::Text(r.back_type.clone()))
                .with("frequency_response_type", FieldValue::Text(r.frequency_response_type.clone())),
            Self::InEarMonitor(r) => {
                row.with("frequency_response_type", FieldValue::Text(r.frequency_response_type.clone()))
            }
            Self::Speaker(r) => row.with("self_powered", FieldValue::Flag(r.self_powered)),
            Self::Subwoofer(r) => row.with("style", FieldValue::Text(r.style.clone())),
            Self::HeadphoneSource(r) => row
                .with("form_factor", FieldValue::Text(r.form_factor.clone()))
                .with("unit_type", FieldValue::Text(r.unit_type.clone()))
                .with("topology", FieldValue::Text(r.topology.clone()))
                .with("balanced", FieldValue::Flag(r.balanced)),
        }
    }
}
