//! The catalog side channel.

use async_trait::async_trait;

/// A product surfaced by the catalog keyword lookup.
///
/// Hits are ephemeral: they are consumed to build the product
/// introduction block and the augmented prompt for one turn, then
/// discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductHit {
    /// Catalog identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Price in the catalog's currency unit.
    pub price: u64,
}

/// A best-effort keyword lookup against the product catalog.
///
/// Implementations are infallible at this boundary: a transport or
/// decode failure must resolve to an empty list (logging the cause)
/// rather than propagate, so a broken catalog only ever costs a turn
/// its product suggestions. No retries.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Returns the products matching the raw user text.
    async fn search(&self, keyword: &str) -> Vec<ProductHit>;
}

/// The lookup used when no catalog is wired in; never returns hits.
pub struct NoLookup;

#[async_trait]
impl ProductLookup for NoLookup {
    async fn search(&self, _keyword: &str) -> Vec<ProductHit> {
        Vec::new()
    }
}
