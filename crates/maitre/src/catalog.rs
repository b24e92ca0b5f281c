use async_trait::async_trait;
use maitre_core::lookup::{ProductHit, ProductLookup};
use reqwest::Client;
use serde::Deserialize;

/// HTTP client for the catalog search endpoint.
///
/// The raw user text goes out as the `keyword` query parameter
/// (URL-encoded by the HTTP layer) and hits come back as a JSON array
/// of products, either bare or wrapped in a `data` object.
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    /// Creates a client for the catalog service at `base_url`.
    #[inline]
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch(
        &self,
        keyword: &str,
    ) -> Result<Vec<ProductHit>, reqwest::Error> {
        let payload: SearchPayload = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("keyword", keyword)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payload.into_hits())
    }
}

#[async_trait]
impl ProductLookup for CatalogClient {
    async fn search(&self, keyword: &str) -> Vec<ProductHit> {
        match self.fetch(keyword).await {
            Ok(hits) => hits,
            Err(err) => {
                // Best effort: a broken catalog never fails the turn,
                // it only costs the product suggestions.
                warn!("catalog lookup failed: {err}");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchPayload {
    Bare(Vec<RawProduct>),
    Wrapped {
        #[serde(default)]
        data: Vec<RawProduct>,
    },
}

impl SearchPayload {
    fn into_hits(self) -> Vec<ProductHit> {
        let products = match self {
            SearchPayload::Bare(products) => products,
            SearchPayload::Wrapped { data } => data,
        };
        products.into_iter().map(RawProduct::into_hit).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(default)]
    id: u64,
    name: String,
    #[serde(default)]
    price: u64,
}

impl RawProduct {
    fn into_hit(self) -> ProductHit {
        ProductHit {
            id: self.id,
            name: self.name,
            price: self.price,
        }
    }
}
