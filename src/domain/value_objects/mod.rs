//! Value Objects for the catalog document model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root collection holding one document per category.
pub const CATEGORIES: &str = "categories";
/// Subcollection name under each category document.
pub const PRODUCTS: &str = "products";

/// Canonical category slug value object (`bags`, `outer-wear`, ...)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategorySlug(String);

impl CategorySlug {
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > 64 { return Err(SlugError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(SlugError::InvalidCharacter);
        }
        if value.starts_with('-') || value.ends_with('-') { return Err(SlugError::InvalidCharacter); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CategorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty, TooLong, InvalidCharacter }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "slug empty"),
            Self::TooLong => write!(f, "slug too long"),
            Self::InvalidCharacter => write!(f, "slug may only contain a-z, 0-9 and inner dashes"),
        }
    }
}

/// A single path segment (document id) is valid when it is non-empty and has no `/`.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/')
}

/// Path of a collection, e.g. `categories` or `categories/bags/products`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn categories() -> Self { Self(CATEGORIES.to_string()) }
    pub fn products(category_id: &str) -> Self { Self(format!("{CATEGORIES}/{category_id}/{PRODUCTS}")) }
    pub fn doc(&self, id: impl Into<String>) -> DocumentPath { DocumentPath { collection: self.clone(), id: id.into() } }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Path of a single document: its parent collection plus the document id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// `categories/{category_id}`
    pub fn category(category_id: &str) -> Self { CollectionPath::categories().doc(category_id) }

    /// `categories/{category_id}/products/{product_id}`
    pub fn product(category_id: &str, product_id: &str) -> Self { CollectionPath::products(category_id).doc(product_id) }

    pub fn collection(&self) -> &CollectionPath { &self.collection }
    pub fn id(&self) -> &str { &self.id }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.collection, self.id) }
}
