use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::models::{AppConfigEntity, RoomKeyPage};
use crate::dao::room_store::{Revision, RoomStore};
use crate::dao::storage::StorageResult;
use crate::state::room::RoomState;

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CONFIG_DOC_ID, CouchConfigDocument, CouchRoomDocument, END_SUFFIX,
        ROOM_PREFIX, WriteResponse, room_doc_id, room_key_from_doc_id,
    },
};

/// [`RoomStore`] backed by CouchDB. Document revisions (`_rev`) are surfaced
/// as the store's conditional-write token: a PUT carrying a stale revision is
/// answered with `409 Conflict` by the server, which maps onto
/// [`CouchDaoError::Conflict`].
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);
        let mut builder = self.client.get(&url);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let mut builder = self.client.put(&url);
                if let Some((ref user, ref pass)) = self.auth {
                    builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
                }
                let create =
                    builder
                        .send()
                        .await
                        .map_err(|source| CouchDaoError::DatabaseCreate {
                            database: database.clone(),
                            source,
                        })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document and return the revision CouchDB assigned. A missing or
    /// stale `_rev` in the body earns a 409, surfaced as a conflict.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<String>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => {
                let body = response.json::<WriteResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(body.rev)
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// DELETE a specific revision of a document. Returns whether a document
    /// was actually removed.
    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<bool> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_room_ids(
        &self,
        limit: usize,
        cursor: Option<String>,
    ) -> CouchResult<RoomKeyPage> {
        const ALL_DOCS: &str = "_all_docs";

        // Resume one key past the cursor by appending the lowest code point.
        let start = match cursor {
            Some(last_key) => format!("{}\u{0000}", room_doc_id(&last_key)),
            None => ROOM_PREFIX.to_string(),
        };
        let query = [
            ("startkey", json_string(&start)),
            ("endkey", json_string(&format!("{ROOM_PREFIX}{END_SUFFIX}"))),
            ("limit", (limit + 1).to_string()),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut keys: Vec<String> = payload
            .rows
            .into_iter()
            .filter_map(|row| room_key_from_doc_id(&row.id).map(str::to_string))
            .collect();

        let has_more = keys.len() > limit;
        keys.truncate(limit);
        let next_cursor = if has_more { keys.last().cloned() } else { None };

        Ok(RoomKeyPage { keys, next_cursor })
    }
}

/// JSON-quote a key for CouchDB range query parameters.
fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

impl RoomStore for CouchRoomStore {
    fn find_room(
        &self,
        room_key: &str,
    ) -> BoxFuture<'static, StorageResult<Option<(RoomState, Revision)>>> {
        let store = self.clone();
        let doc_id = room_doc_id(room_key);
        Box::pin(async move {
            let maybe_doc = store.get_document::<CouchRoomDocument>(&doc_id).await?;
            Ok(maybe_doc.and_then(|doc| doc.rev.map(|rev| (doc.room, rev))))
        })
    }

    fn save_room(
        &self,
        room: RoomState,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&room.room_key);
            let doc = CouchRoomDocument {
                id: doc_id.clone(),
                rev: expected,
                room,
            };
            let rev = store.put_document(&doc_id, &doc).await?;
            Ok(rev)
        })
    }

    fn delete_room(&self, room_key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let doc_id = room_doc_id(room_key);
        Box::pin(async move {
            let Some(doc) = store.get_document::<CouchRoomDocument>(&doc_id).await? else {
                return Ok(false);
            };
            let Some(rev) = doc.rev else {
                return Ok(false);
            };
            Ok(store.delete_document(&doc_id, &rev).await?)
        })
    }

    fn list_room_keys(
        &self,
        limit: usize,
        cursor: Option<String>,
    ) -> BoxFuture<'static, StorageResult<RoomKeyPage>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_room_ids(limit, cursor).await?) })
    }

    fn find_config(
        &self,
    ) -> BoxFuture<'static, StorageResult<Option<(AppConfigEntity, Revision)>>> {
        let store = self.clone();
        Box::pin(async move {
            let maybe_doc = store
                .get_document::<CouchConfigDocument>(CONFIG_DOC_ID)
                .await?;
            Ok(maybe_doc.and_then(|doc| doc.rev.map(|rev| (doc.config, rev))))
        })
    }

    fn save_config(
        &self,
        config: AppConfigEntity,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = CouchConfigDocument {
                id: CONFIG_DOC_ID.to_string(),
                rev: expected,
                config,
            };
            let rev = store.put_document(CONFIG_DOC_ID, &doc).await?;
            Ok(rev)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", store.base_url, store.database);
            let mut builder = store.client.get(&url);
            if let Some((ref user, ref pass)) = store.auth {
                builder = builder.basic_auth(user.as_ref(), Some(pass.as_ref()));
            }

            let response = builder
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
