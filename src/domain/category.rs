//! Product categories
//!
//! Closed set of product kinds served by the catalog. Every category maps to
//! exactly one record kind, one local table and one remote sheet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::schema::{self, SchemaDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductCategory {
    Headphones,
    InEars,
    Speakers,
    Subwoofers,
    HeadphoneSources,
}

impl ProductCategory {
    pub const ALL: [Self; 5] = [
        Self::Headphones,
        Self::InEars,
        Self::Speakers,
        Self::Subwoofers,
        Self::HeadphoneSources,
    ];

    /// Position in [`Self::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sheet (tab) name in the remote spreadsheet. Not URL-safe as-is.
    pub const fn sheet_name(self) -> &'static str {
        match self {
            Self::Headphones => "Headphones",
            Self::InEars => "In-Ears",
            Self::Speakers => "Speakers",
            Self::Subwoofers => "Subwoofers",
            Self::HeadphoneSources => "Headphone sources",
        }
    }

    pub fn schema(self) -> &'static SchemaDescriptor {
        match self {
            Self::Headphones => &schema::HEADPHONES,
            Self::InEars => &schema::IN_EAR_MONITORS,
            Self::Speakers => &schema::SPEAKERS,
            Self::Subwoofers => &schema::SUBWOOFERS,
            Self::HeadphoneSources => &schema::HEADPHONE_SOURCES,
        }
    }

    pub fn table_name(self) -> &'static str {
        self.schema().table
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    /// Accepts the sheet name, the table name or the variant name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| {
                wanted.eq_ignore_ascii_case(category.sheet_name())
                    || wanted.eq_ignore_ascii_case(category.table_name())
                    || wanted.eq_ignore_ascii_case(&format!("{category:?}"))
            })
            .ok_or_else(|| format!("unknown product category: {wanted}"))
    }
}
