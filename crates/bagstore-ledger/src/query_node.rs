//! GraphQL client for the query node that indexes chain state.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use bagstore_types::{
    AcceptanceState, BagId, ContentHash, DataObject, DataObjectId, StorageBucketId, WorkerId,
};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{Indexer, OperatorEndpoint};

const DATA_OBJECTS_QUERY: &str = r#"
query GetStorageDataObjects($bagIds: [ID!], $limit: Int!, $offset: Int!) {
  storageDataObjects(
    where: { storageBag: { id_in: $bagIds } }
    limit: $limit
    offset: $offset
    orderBy: id_ASC
  ) {
    id
    size
    contentHash
    isAccepted
    storageBag { id }
  }
}"#;

const BAG_OPERATORS_QUERY: &str = r#"
query GetBagOperators($bagId: ID!) {
  storageBuckets(where: { bags_some: { id_eq: $bagId } }) {
    id
    operatorMetadata { nodeEndpoint }
    operatorStatus {
      __typename
      ... on StorageBucketOperatorStatusActive { workerId }
    }
  }
}"#;

/// [`Indexer`] backed by a query node's GraphQL endpoint.
#[derive(Clone, Debug)]
pub struct QueryNodeClient {
    endpoint: String,
    client: Client,
    page_size: u32,
}

impl QueryNodeClient {
    pub const DEFAULT_PAGE_SIZE: u32 = 1000;

    /// `endpoint` is the full GraphQL URL, e.g. `http://localhost:8081/graphql`.
    pub fn new(endpoint: impl Into<String>) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            page_size: Self::DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> LedgerResult<T> {
        let body = json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Unavailable(format!("query node returned {status}: {text}")));
        }
        let envelope: GraphQlResponse<T> = resp
            .json()
            .await
            .map_err(|e| LedgerError::Indexer(e.to_string()))?;
        envelope.into_data()
    }
}

#[async_trait]
impl Indexer for QueryNodeClient {
    async fn bag_objects(&self, bags: &[BagId]) -> LedgerResult<Vec<DataObject>> {
        if bags.is_empty() {
            return Ok(Vec::new());
        }
        let bag_ids: Vec<String> = bags.iter().map(ToString::to_string).collect();
        let mut objects = Vec::new();
        let mut offset = 0u32;
        loop {
            let page: DataObjectsPage = self
                .query(
                    DATA_OBJECTS_QUERY,
                    json!({ "bagIds": bag_ids, "limit": self.page_size, "offset": offset }),
                )
                .await?;
            let count = page.storage_data_objects.len() as u32;
            objects.extend(page.into_objects());
            debug!(offset, count, "fetched data object page");
            if count < self.page_size {
                break;
            }
            offset += count;
        }
        Ok(objects)
    }

    async fn bag_operators(&self, bag: &BagId) -> LedgerResult<Vec<OperatorEndpoint>> {
        let page: BucketsPage = self
            .query(BAG_OPERATORS_QUERY, json!({ "bagId": bag.to_string() }))
            .await?;
        Ok(page.into_endpoints())
    }
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl<T> GraphQlResponse<T> {
    fn into_data(self) -> LedgerResult<T> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(LedgerError::Indexer(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| LedgerError::Indexer("response carried no data".into()))
    }
}

/// Query nodes render big integers as strings; accept either form.
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Text(String),
}

impl Number {
    fn get(&self, field: &str) -> LedgerResult<u64> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Text(s) => s
                .parse()
                .map_err(|_| LedgerError::Indexer(format!("{field} is not an integer: {s:?}"))),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataObjectsPage {
    storage_data_objects: Vec<RawDataObject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataObject {
    id: Number,
    size: Number,
    content_hash: String,
    is_accepted: bool,
    storage_bag: RawBagRef,
}

#[derive(Deserialize)]
struct RawBagRef {
    id: String,
}

impl DataObjectsPage {
    /// Rows that fail to parse are logged and skipped so one bad record
    /// cannot hide the rest of the page.
    fn into_objects(self) -> Vec<DataObject> {
        self.storage_data_objects
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.get("data object id").ok();
                raw.into_object()
                    .map_err(|e| warn!(?id, error = %e, "skipping malformed data object"))
                    .ok()
            })
            .collect()
    }
}

impl RawDataObject {
    fn into_object(self) -> LedgerResult<DataObject> {
        let bag_id = BagId::parse(&self.storage_bag.id)
            .map_err(|e| LedgerError::Indexer(e.to_string()))?;
        let content_hash = ContentHash::from_hex(&self.content_hash)
            .map_err(|e| LedgerError::Indexer(format!("data object hash: {e}")))?;
        Ok(DataObject {
            id: DataObjectId(self.id.get("data object id")?),
            bag_id,
            content_hash,
            size: self.size.get("data object size")?,
            state: if self.is_accepted {
                AcceptanceState::Accepted
            } else {
                AcceptanceState::Pending
            },
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketsPage {
    storage_buckets: Vec<RawBucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBucket {
    id: Number,
    operator_metadata: Option<RawOperatorMetadata>,
    operator_status: Option<RawOperatorStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperatorMetadata {
    node_endpoint: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperatorStatus {
    #[serde(rename = "__typename")]
    typename: String,
    worker_id: Option<Number>,
}

impl BucketsPage {
    /// Buckets with an active operator that published an endpoint.
    /// Malformed buckets are skipped.
    fn into_endpoints(self) -> Vec<OperatorEndpoint> {
        self.storage_buckets
            .into_iter()
            .filter_map(|bucket| match bucket.into_endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!(error = %e, "skipping malformed storage bucket");
                    None
                }
            })
            .collect()
    }
}

impl RawBucket {
    fn into_endpoint(self) -> LedgerResult<Option<OperatorEndpoint>> {
        let Some(status) = self.operator_status else {
            return Ok(None);
        };
        if status.typename != "StorageBucketOperatorStatusActive" {
            return Ok(None);
        }
        let Some(url) = self
            .operator_metadata
            .and_then(|m| m.node_endpoint)
            .filter(|u| !u.trim().is_empty())
        else {
            return Ok(None);
        };
        let worker_id = match status.worker_id {
            Some(n) => Some(WorkerId(n.get("worker id")?)),
            None => None,
        };
        Ok(Some(OperatorEndpoint {
            bucket_id: StorageBucketId(self.id.get("bucket id")?),
            worker_id,
            url: url.trim().trim_end_matches('/').to_string(),
        }))
    }
}
