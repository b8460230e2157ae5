//! Search bundle wire model.
//!
//! Only the parts of the envelope the harness reads are modelled: entry
//! resources, the reported total, and paging links. Servers decorate
//! bundles with plenty more, so unknown fields pass through undeclared
//! rather than being rejected.

use serde::Deserialize;
use serde_json::Value;

/// A searchset bundle as returned by `GET /{type}?...`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Bundle {
    /// Server-reported match count. Some servers omit it on paged results.
    #[serde(default)]
    pub total: Option<u64>,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,

    #[serde(default)]
    pub link: Vec<BundleLink>,
}

/// One entry in a bundle.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BundleEntry {
    #[serde(default, rename = "fullUrl")]
    pub full_url: Option<String>,

    #[serde(default)]
    pub resource: Option<Value>,
}

/// A paging or self link.
#[derive(Clone, Debug, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

impl Bundle {
    /// Number of entries actually present in this page.
    pub fn entry_count(&self) -> usize {
        self.entry.len()
    }

    /// True when the page holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    /// The entry resources, skipping entries without one.
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entry.iter().filter_map(|entry| entry.resource.as_ref())
    }

    /// The resource of the entry at `index`.
    pub fn resource(&self, index: usize) -> Option<&Value> {
        self.entry.get(index).and_then(|entry| entry.resource.as_ref())
    }

    /// The `id` of the resource at `index`.
    pub fn resource_id(&self, index: usize) -> Option<&str> {
        self.resource(index)
            .and_then(|resource| resource.get("id"))
            .and_then(Value::as_str)
    }

    /// URL of the next page, when the server offers one.
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|link| link.relation == "next")
            .map(|link| link.url.as_str())
    }
}
