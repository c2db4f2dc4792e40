use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::source::ListingSource;
use crate::types::{Category, ListingRecord, NewListing, ProfileRecord};

/// PostgREST-backed listing source (a Supabase project's REST endpoint).
pub struct RestSource {
    client: Client,
    base: Url,
    anon_key: String,
}

impl RestSource {
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Result<Self, FetchError> {
        let base = Url::parse(project_url)
            .and_then(|u| u.join("rest/v1/"))
            .map_err(|e| FetchError::Transport(format!("invalid project url {project_url}: {e}")))?;
        let client = Client::builder()
            .user_agent(concat!("reelmart/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base, anon_key: anon_key.into() })
    }

    fn table(&self, name: &str) -> Result<Url, FetchError> {
        self.base.join(name).map_err(|e| FetchError::Transport(e.to_string()))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key).bearer_auth(&self.anon_key)
    }
}

async fn check(resp: Response) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() { return Ok(resp); }
    let body = resp.text().await.unwrap_or_default();
    Err(FetchError::Status { status: status.as_u16(), body })
}

/// Query string for the feed listing request.
pub(crate) fn listings_url(mut url: Url, category: Category) -> Url {
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("select", "*");
        q.append_pair("status", "eq.active");
        if let Some(c) = category.filter_value() {
            q.append_pair("category", &format!("eq.{c}"));
        }
        q.append_pair("order", "created_at.desc");
    }
    url
}

pub(crate) fn profiles_url(mut url: Url, ids: &[String]) -> Url {
    let list = ids.iter().map(|id| format!("\"{}\"", id.replace('"', ""))).collect::<Vec<_>>().join(",");
    url.query_pairs_mut()
        .append_pair("select", "id,display_name")
        .append_pair("id", &format!("in.({list})"));
    url
}

#[async_trait]
impl ListingSource for RestSource {
    async fn active_listings(&self, category: Category) -> Result<Vec<ListingRecord>, FetchError> {
        let url = listings_url(self.table("listings")?, category);
        debug!(%category, "fetching listings");
        let resp = check(self.authed(self.client.get(url)).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn display_names(&self, seller_ids: &[String]) -> Result<HashMap<String, String>, FetchError> {
        if seller_ids.is_empty() { return Ok(HashMap::new()); }
        let url = profiles_url(self.table("profiles")?, seller_ids);
        let resp = check(self.authed(self.client.get(url)).send().await?).await?;
        let rows: Vec<ProfileRecord> = resp.json().await?;
        Ok(rows.into_iter().filter_map(|p| p.display_name.map(|n| (p.id, n))).collect())
    }

    async fn insert_listing(&self, listing: &NewListing) -> Result<ListingRecord, FetchError> {
        let req = self
            .authed(self.client.post(self.table("listings")?))
            .header("Prefer", "return=representation")
            .json(&[listing]);
        let resp = check(req.send().await?).await?;
        let mut rows: Vec<ListingRecord> = resp.json().await?;
        rows.pop().ok_or_else(|| FetchError::Decode("insert returned no rows".into()))
    }
}
