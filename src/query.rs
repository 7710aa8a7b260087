//! Query descriptions checked against route tables.
//!
//! A query is either an exact-identifier lookup (URNs), a plain keyword
//! search, or a keyword search refined by structured metadata. The table
//! only ever sees this type; parsing query text out of wire packets is
//! the transport's job.

/// A query to test against a [`crate::table::RouteTable`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Keyword-bearing search text.
    pub text: String,
    /// Exact-match identifiers. When non-empty these take precedence
    /// over the text: one identifier hit is enough.
    pub urns: Vec<String>,
    /// Optional structured-metadata refinement.
    pub rich: Option<RichQuery>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Query {
            text: text.into(),
            urns: Vec::new(),
            rich: None,
        }
    }

    pub fn with_urn(mut self, urn: impl Into<String>) -> Self {
        self.urns.push(urn.into());
        self
    }

    pub fn with_rich(mut self, rich: RichQuery) -> Self {
        self.rich = Some(rich);
        self
    }
}

/// Structured-metadata part of a query: a schema identifier plus the
/// text of each populated field.
///
/// Fields come in two flavors. Free-text fields (title, artist) are
/// tokenized into keywords; enumerated fields (genre, bitrate) are
/// looked up whole, the same way the table indexed them. Both count
/// toward the match threshold.
#[derive(Debug, Clone)]
pub struct RichQuery {
    /// Schema identifier, hashed whole (never tokenized).
    pub schema_uri: String,
    /// Field values; each is tokenized into keywords for matching.
    pub fields: Vec<String>,
    /// Field values matched whole, one keyword each.
    pub exact_fields: Vec<String>,
}

impl RichQuery {
    pub fn new(schema_uri: impl Into<String>, fields: Vec<String>) -> Self {
        RichQuery {
            schema_uri: schema_uri.into(),
            fields,
            exact_fields: Vec::new(),
        }
    }

    pub fn with_exact_field(mut self, value: impl Into<String>) -> Self {
        self.exact_fields.push(value.into());
        self
    }
}
