//! Offer data structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::parse_number;

/// A single real-estate offer extracted by a crawler.
///
/// Fields beyond the guaranteed minimum are extraction-site-specific and
/// kept in `extra`, so the pipeline never has to assume a closed field set.
/// Identity is `id`: two offers with equal ids are the same listing even if
/// the sites re-render the other fields between crawls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    /// Listing identifier, unique per real-world offer
    pub id: u64,

    /// Full URL of the listing
    pub url: String,

    /// Listing title
    pub title: String,

    /// Price as rendered by the site (e.g. "1.200 €")
    #[serde(default)]
    pub price: String,

    /// Living space as rendered by the site (e.g. "70 m²")
    #[serde(default)]
    pub size: String,

    /// Room count as rendered by the site
    #[serde(default)]
    pub rooms: String,

    /// Street address or district
    #[serde(default)]
    pub address: String,

    /// Preview image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Move-in or posting date as rendered by the site
    #[serde(default, rename = "from", skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,

    /// Computed time-on-market summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations: Option<String>,

    /// Name of the crawler that produced this offer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawler: Option<String>,

    /// Site-specific fields outside the guaranteed minimum
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Offer {
    /// Create an offer with the minimum field set.
    pub fn new(id: u64, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            price: String::new(),
            size: String::new(),
            rooms: String::new(),
            address: String::new(),
            image: None,
            from_date: None,
            durations: None,
            crawler: None,
            extra: Map::new(),
        }
    }

    /// Numeric price, if the rendered field parses.
    pub fn price_value(&self) -> Option<f64> {
        parse_number(&self.price)
    }

    /// Numeric living space, if the rendered field parses.
    pub fn size_value(&self) -> Option<f64> {
        parse_number(&self.size)
    }

    /// Numeric room count, if the rendered field parses.
    pub fn rooms_value(&self) -> Option<f64> {
        parse_number(&self.rooms)
    }

    /// Format the offer for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{url}`, `{title}`, `{price}`, `{size}`, `{rooms}`
    /// - `{address}`, `{durations}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id.to_string())
            .replace("{url}", &self.url)
            .replace("{title}", &self.title)
            .replace("{price}", &self.price)
            .replace("{size}", &self.size)
            .replace("{rooms}", &self.rooms)
            .replace("{address}", &self.address)
            .replace("{durations}", self.durations.as_deref().unwrap_or(""))
    }
}
