//! Service model: what a seller advertises and what a buyer discovers.
//!
//! A service definition is a reply under the seller's `svp-services` item:
//! title = service title, body = description, metadata =
//! `{"tags": ["svp-tag", ...], "terms": {"cost": n}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{AccountName, ContentItem, Permlink, Result, SvpError, constants};

/// Commercial terms of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceTerms {
    /// Number of payment tokens (votables) a buyer must vote on.
    pub cost: u32,
}

impl ServiceTerms {
    /// # Errors
    /// Returns `InvalidTerms` for a zero cost.
    pub fn new(cost: u32) -> Result<Self> {
        let terms = Self { cost };
        terms.validate()?;
        Ok(terms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cost == 0 {
            return Err(SvpError::InvalidTerms {
                reason: "cost must be at least one payment token".to_string(),
            });
        }
        Ok(())
    }

    /// Terms embedded in a service definition's metadata.
    #[must_use]
    pub fn from_metadata(metadata: &Value) -> Option<Self> {
        serde_json::from_value(metadata.get("terms")?.clone()).ok()
    }
}

impl Default for ServiceTerms {
    fn default() -> Self {
        Self { cost: 1 }
    }
}

/// Seller-side configuration of one advertised service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub title: String,
    pub description: String,
    /// Extra tags; the protocol tag is always added on publish.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub terms: ServiceTerms,
    /// Permlink of the definition item.
    pub permlink: Permlink,
}

impl Default for ServiceConfig {
    /// The echo service: replies to each buyer with their own name.
    fn default() -> Self {
        Self {
            title: "Echo".to_string(),
            description: "Echo Service".to_string(),
            tags: Vec::new(),
            terms: ServiceTerms::default(),
            permlink: Permlink::new("echo-service"),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        self.terms.validate()?;
        if self.permlink.as_str().is_empty() {
            return Err(SvpError::Configuration(
                "service permlink must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Protocol tag followed by the configured tags, without duplicates.
    #[must_use]
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = vec![constants::SVP_TAG.to_string()];
        for tag in &self.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Metadata attached to the definition item.
    #[must_use]
    pub fn definition_metadata(&self) -> Value {
        json!({
            "tags": self.all_tags(),
            "terms": self.terms,
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self
                .tags
                .iter()
                .filter(|t| t.as_str() != constants::SVP_TAG)
                .cloned()
                .collect(),
            terms: self.terms,
            permlink: self.permlink.clone(),
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl ServiceConfig {
    /// Create a service with the given permlink and cost.
    #[must_use]
    pub fn dummy(permlink: &str, cost: u32) -> Self {
        Self {
            title: format!("Test {permlink}"),
            description: format!("test service {permlink}"),
            tags: vec!["test".to_string()],
            terms: ServiceTerms { cost },
            permlink: Permlink::new(permlink),
        }
    }
}

/// Public view of a service, handed to providers along with the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub title: String,
    pub description: String,
    /// Tags without the protocol tag.
    pub tags: Vec<String>,
    pub terms: ServiceTerms,
    pub permlink: Permlink,
}

/// A service found through discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceListing {
    pub seller: AccountName,
    pub service_permlink: Permlink,
    pub title: String,
    pub description: String,
    /// `None` when the definition metadata carries no parsable terms.
    pub terms: Option<ServiceTerms>,
}

impl ServiceListing {
    #[must_use]
    pub fn from_definition(item: &ContentItem) -> Self {
        Self {
            seller: item.author.clone(),
            service_permlink: item.permlink.clone(),
            title: item.title.clone(),
            description: item.body.clone(),
            terms: item.metadata.as_ref().and_then(ServiceTerms::from_metadata),
        }
    }
}
