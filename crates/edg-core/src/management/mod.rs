//! # Management API
//!
//! Request/reply handlers for the `platform.meta.*` subjects.
//!
//! Every operation decodes a JSON request, runs one typed handler, and
//! encodes a `{success, data?, error?}` reply. The transport only has to
//! route a subject to an [`Operation`] and call [`ManagementApi::handle`].

pub mod types;

pub use types::{
    CreateAssetRequest, CreateRelationRequest, Direction, GetAssetRequest, IdRequest,
    ListRelationsRequest, Response,
};

use crate::primitives::{FALLBACK_RESPONSE, SUBJECT_META_PREFIX};
use crate::schema::SchemaRegistry;
use crate::storage::MetadataStore;
use crate::{Asset, AssetRelation, AssetTemplate, EdgError, RelationType};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const INVALID_REQUEST: &str = "invalid request format";

// =============================================================================
// OPERATIONS
// =============================================================================

/// One named management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AssetCreate,
    AssetGet,
    AssetList,
    AssetDelete,
    TemplateList,
    RelationCreate,
    RelationGet,
    RelationList,
    RelationDelete,
}

impl Operation {
    pub const ALL: [Self; 9] = [
        Self::AssetCreate,
        Self::AssetGet,
        Self::AssetList,
        Self::AssetDelete,
        Self::TemplateList,
        Self::RelationCreate,
        Self::RelationGet,
        Self::RelationList,
        Self::RelationDelete,
    ];

    /// Full subject this operation listens on.
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::AssetCreate => "platform.meta.asset.create",
            Self::AssetGet => "platform.meta.asset.get",
            Self::AssetList => "platform.meta.asset.list",
            Self::AssetDelete => "platform.meta.asset.delete",
            Self::TemplateList => "platform.meta.template.list",
            Self::RelationCreate => "platform.meta.relation.create",
            Self::RelationGet => "platform.meta.relation.get",
            Self::RelationList => "platform.meta.relation.list",
            Self::RelationDelete => "platform.meta.relation.delete",
        }
    }

    /// Resolve a subject. Accepts the full subject or the part after
    /// `platform.meta.` (`asset.create`).
    #[must_use]
    pub fn from_subject(subject: &str) -> Option<Self> {
        let full = subject.strip_prefix(SUBJECT_META_PREFIX).unwrap_or(subject);
        Self::ALL.into_iter().find(|op| {
            op.subject()
                .strip_prefix(SUBJECT_META_PREFIX)
                .is_some_and(|short| short == full)
        })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Management handlers over a shared store and registry.
#[derive(Debug, Clone)]
pub struct ManagementApi {
    store: Arc<MetadataStore>,
    registry: Arc<SchemaRegistry>,
}

impl ManagementApi {
    pub fn new(store: Arc<MetadataStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self { store, registry }
    }

    /// Run one operation on a raw JSON request and return the encoded reply.
    ///
    /// `asset.list` and `template.list` ignore the payload.
    pub fn handle(&self, op: Operation, payload: &[u8]) -> Vec<u8> {
        match op {
            Operation::AssetCreate => decode_then(payload, |req| Ok(Some(self.create_asset(req)?))),
            Operation::AssetGet => decode_then(payload, |req| match self.get_asset(req)? {
                Some(asset) => Ok(Some(asset)),
                None => Err(Failure::message("asset not found")),
            }),
            Operation::AssetList => finish(self.list_assets().map(Some).map_err(Failure::from)),
            Operation::AssetDelete => decode_then(payload, |req| {
                self.delete_asset(req)?;
                Ok(None::<()>)
            }),
            Operation::TemplateList => reply(&Response::ok(self.list_templates())),
            Operation::RelationCreate => {
                decode_then(payload, |req| Ok(Some(self.create_relation(req)?)))
            }
            Operation::RelationGet => decode_then(payload, |req| match self.get_relation(req)? {
                Some(relation) => Ok(Some(relation)),
                None => Err(Failure::message("relation not found")),
            }),
            Operation::RelationList => {
                decode_then(payload, |req| Ok(Some(self.list_relations(req)?)))
            }
            Operation::RelationDelete => decode_then(payload, |req| {
                self.delete_relation(req)?;
                Ok(None::<()>)
            }),
        }
    }

    // -------------------------------------------------------------------------
    // assets
    // -------------------------------------------------------------------------

    /// Checks, in order: name present, name free, template known. The new
    /// asset gets a random id.
    pub fn create_asset(&self, req: CreateAssetRequest) -> Result<Asset, EdgError> {
        if req.name.is_empty() {
            return Err(EdgError::MissingField("name"));
        }
        if self.store.get_asset_by_name(&req.name)?.is_some() {
            return Err(EdgError::DuplicateAssetName(req.name));
        }
        let template_name = req.template_name.filter(|t| !t.is_empty());
        if let Some(template) = &template_name
            && !self.registry.exists(template)
        {
            return Err(EdgError::UnknownTemplate(template.clone()));
        }

        let mut asset =
            Asset::new(Uuid::new_v4().to_string(), req.name, Utc::now()).with_labels(req.labels);
        asset.template_name = template_name;
        self.store.create_asset(&asset)?;

        info!(asset_id = %asset.id, name = %asset.name, "asset created");
        Ok(asset)
    }

    /// Lookup by id if given, otherwise by name.
    pub fn get_asset(&self, req: GetAssetRequest) -> Result<Option<Asset>, EdgError> {
        let id = req.id.filter(|s| !s.is_empty());
        let name = req.name.filter(|s| !s.is_empty());
        match (id, name) {
            (Some(id), _) => self.store.get_asset(&id),
            (None, Some(name)) => self.store.get_asset_by_name(&name),
            (None, None) => Err(EdgError::MissingField("id or name")),
        }
    }

    pub fn list_assets(&self) -> Result<Vec<Asset>, EdgError> {
        self.store.list_assets()
    }

    /// Deletes the asset and every relation touching it.
    pub fn delete_asset(&self, req: IdRequest) -> Result<(), EdgError> {
        if req.id.is_empty() {
            return Err(EdgError::MissingField("id"));
        }
        self.store.delete_asset(&req.id)?;
        info!(asset_id = %req.id, "asset deleted");
        Ok(())
    }

    pub fn list_templates(&self) -> Vec<AssetTemplate> {
        self.registry.list()
    }

    // -------------------------------------------------------------------------
    // relations
    // -------------------------------------------------------------------------

    /// Checks the request fields and the type; endpoint existence and
    /// uniqueness are enforced by the store.
    pub fn create_relation(&self, req: CreateRelationRequest) -> Result<AssetRelation, EdgError> {
        if req.source_asset_id.is_empty() {
            return Err(EdgError::MissingField("source_asset_id"));
        }
        if req.target_asset_id.is_empty() {
            return Err(EdgError::MissingField("target_asset_id"));
        }
        if req.relation_type.is_empty() {
            return Err(EdgError::MissingField("relation_type"));
        }
        let relation_type: RelationType = req.relation_type.parse()?;

        let mut relation = AssetRelation::new(
            Uuid::new_v4().to_string(),
            req.source_asset_id,
            req.target_asset_id,
            relation_type,
            Utc::now(),
        );
        relation.metadata = req.metadata;
        self.store.create_relation(&relation)?;

        info!(
            relation_id = %relation.id,
            source = %relation.source_asset_id,
            target = %relation.target_asset_id,
            relation_type = %relation.relation_type,
            "relation created"
        );
        Ok(relation)
    }

    pub fn get_relation(&self, req: IdRequest) -> Result<Option<AssetRelation>, EdgError> {
        if req.id.is_empty() {
            return Err(EdgError::MissingField("id"));
        }
        self.store.get_relation(&req.id)
    }

    /// Relations of one asset in the requested direction, optionally
    /// restricted to one relation type.
    pub fn list_relations(&self, req: ListRelationsRequest) -> Result<Vec<AssetRelation>, EdgError> {
        if req.asset_id.is_empty() {
            return Err(EdgError::MissingField("asset_id"));
        }
        let direction: Direction = req.direction.as_deref().unwrap_or_default().parse()?;

        let mut relations = match direction {
            Direction::Outgoing => self.store.get_relations_by_source(&req.asset_id)?,
            Direction::Incoming => self.store.get_relations_by_target(&req.asset_id)?,
            Direction::Both => {
                let mut all = self.store.get_relations_by_source(&req.asset_id)?;
                all.extend(self.store.get_relations_by_target(&req.asset_id)?);
                all
            }
        };

        if let Some(filter) = req.relation_type.as_deref().filter(|t| !t.is_empty()) {
            relations.retain(|r| r.relation_type.as_str() == filter);
        }
        Ok(relations)
    }

    pub fn delete_relation(&self, req: IdRequest) -> Result<(), EdgError> {
        if req.id.is_empty() {
            return Err(EdgError::MissingField("id"));
        }
        self.store.delete_relation(&req.id)?;
        info!(relation_id = %req.id, "relation deleted");
        Ok(())
    }
}

// =============================================================================
// REPLY ENCODING
// =============================================================================

/// A handler failure, already rendered as the reply error string.
struct Failure(String);

impl Failure {
    fn message(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl From<EdgError> for Failure {
    fn from(e: EdgError) -> Self {
        Self(e.to_string())
    }
}

/// Decode a request, run the handler, encode its outcome.
fn decode_then<Req, T, F>(payload: &[u8], run: F) -> Vec<u8>
where
    Req: DeserializeOwned,
    T: Serialize,
    F: FnOnce(Req) -> Result<Option<T>, Failure>,
{
    match serde_json::from_slice::<Req>(payload) {
        Ok(req) => finish(run(req)),
        Err(_) => reply(&Response::<()>::failure(INVALID_REQUEST)),
    }
}

/// `Ok(None)` is a success without `data`.
fn finish<T: Serialize>(result: Result<Option<T>, Failure>) -> Vec<u8> {
    match result {
        Ok(data) => reply(&Response {
            success: true,
            data,
            error: None,
        }),
        Err(Failure(msg)) => reply(&Response::<()>::failure(msg)),
    }
}

/// Encode a reply, substituting a fixed failure if encoding fails.
fn reply<T: Serialize>(response: &Response<T>) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|e| {
        error!(error = %e, "failed to encode management reply");
        FALLBACK_RESPONSE.to_vec()
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn api() -> ManagementApi {
        let registry = Arc::new(SchemaRegistry::new());
        registry.insert(
            serde_json::from_value(json!({
                "name": "temperature-sensor",
                "resources": [{"name": "temperature", "valueType": "NUMBER", "unit": "C"}]
            }))
            .expect("template"),
        );
        ManagementApi::new(
            Arc::new(MetadataStore::in_memory().expect("store")),
            registry,
        )
    }

    fn call(api: &ManagementApi, op: Operation, body: Value) -> Value {
        let raw = serde_json::to_vec(&body).expect("encode");
        serde_json::from_slice(&api.handle(op, &raw)).expect("reply is JSON")
    }

    fn create(api: &ManagementApi, name: &str) -> String {
        let reply = call(api, Operation::AssetCreate, json!({"name": name}));
        assert_eq!(reply["success"], true, "{reply}");
        reply["data"]["id"].as_str().expect("id").to_string()
    }

    #[test]
    fn subjects_resolve_both_ways() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_subject(op.subject()), Some(op));
        }
        assert_eq!(
            Operation::from_subject("relation.list"),
            Some(Operation::RelationList)
        );
        assert_eq!(Operation::from_subject("platform.meta.asset.rename"), None);
    }

    #[test]
    fn asset_create_assigns_uuid_and_stores() {
        let api = api();
        let reply = call(
            &api,
            Operation::AssetCreate,
            json!({"name": "boiler-1", "template_name": "temperature-sensor", "labels": ["hall-a"]}),
        );
        assert_eq!(reply["success"], true);
        let id = reply["data"]["id"].as_str().expect("id");
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(reply["data"]["template_name"], "temperature-sensor");
        assert_eq!(reply["data"]["labels"], json!(["hall-a"]));
        assert!(api.store.asset_exists(id).expect("exists"));
    }

    #[test]
    fn asset_create_validation_order() {
        let api = api();
        let reply = call(&api, Operation::AssetCreate, json!({"template_name": "nope"}));
        assert_eq!(reply["error"], "name is required");

        create(&api, "boiler-1");
        let reply = call(
            &api,
            Operation::AssetCreate,
            json!({"name": "boiler-1", "template_name": "nope"}),
        );
        assert_eq!(reply["error"], "asset name already exists: boiler-1");

        let reply = call(
            &api,
            Operation::AssetCreate,
            json!({"name": "boiler-2", "template_name": "nope"}),
        );
        assert_eq!(reply["error"], "template not found: nope");
        assert_eq!(api.list_assets().expect("list").len(), 1);
    }

    #[test]
    fn undecodable_request_is_invalid_format() {
        let api = api();
        let reply: Value =
            serde_json::from_slice(&api.handle(Operation::AssetCreate, b"{oops")).expect("json");
        assert_eq!(reply, json!({"success": false, "error": "invalid request format"}));

        // list ignores its payload entirely
        let reply: Value =
            serde_json::from_slice(&api.handle(Operation::AssetList, b"{oops")).expect("json");
        assert_eq!(reply, json!({"success": true, "data": []}));
    }

    #[test]
    fn asset_get_by_id_or_name() {
        let api = api();
        let id = create(&api, "boiler-1");

        let by_id = call(&api, Operation::AssetGet, json!({"id": id}));
        assert_eq!(by_id["data"]["name"], "boiler-1");
        let by_name = call(&api, Operation::AssetGet, json!({"name": "boiler-1"}));
        assert_eq!(by_name["data"]["id"], id.as_str());

        let missing = call(&api, Operation::AssetGet, json!({"id": "ghost"}));
        assert_eq!(missing, json!({"success": false, "error": "asset not found"}));
        let neither = call(&api, Operation::AssetGet, json!({}));
        assert_eq!(neither["error"], "id or name is required");
    }

    #[test]
    fn asset_delete_replies_without_data() {
        let api = api();
        let id = create(&api, "boiler-1");
        assert_eq!(
            call(&api, Operation::AssetDelete, json!({"id": id})),
            json!({"success": true})
        );
        assert_eq!(
            call(&api, Operation::AssetDelete, json!({}))["error"],
            "id is required"
        );
        assert_eq!(call(&api, Operation::AssetDelete, json!({"id": id}))["success"], false);
    }

    #[test]
    fn template_list_is_sorted_and_complete() {
        let api = api();
        let reply = call(&api, Operation::TemplateList, Value::Null);
        assert_eq!(reply["data"][0]["name"], "temperature-sensor");
        assert_eq!(reply["data"][0]["resources"][0]["valueType"], "NUMBER");
    }

    #[test]
    fn relation_create_validation_order() {
        let api = api();
        let a1 = create(&api, "s1");
        let a2 = create(&api, "s2");

        let cases = [
            (json!({}), "source_asset_id is required"),
            (json!({"source_asset_id": a1}), "target_asset_id is required"),
            (
                json!({"source_asset_id": a1, "target_asset_id": a2}),
                "relation_type is required",
            ),
            (
                json!({"source_asset_id": a1, "target_asset_id": a2, "relation_type": "ownedBy"}),
                "invalid relation_type: ownedBy",
            ),
            (
                json!({"source_asset_id": "ghost", "target_asset_id": a2, "relation_type": "partOf"}),
                "source asset not found: ghost",
            ),
        ];
        for (body, expected) in cases {
            assert_eq!(call(&api, Operation::RelationCreate, body)["error"], expected);
        }
    }

    #[test]
    fn relation_lifecycle_through_handlers() {
        let api = api();
        let a1 = create(&api, "s1");
        let a2 = create(&api, "s2");
        let body = json!({
            "source_asset_id": a1,
            "target_asset_id": a2,
            "relation_type": "partOf",
            "metadata": {"slot": "3"}
        });

        let created = call(&api, Operation::RelationCreate, body.clone());
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["metadata"]["slot"], "3");
        let rel_id = created["data"]["id"].as_str().expect("id").to_string();

        let dup = call(&api, Operation::RelationCreate, body);
        assert_eq!(dup["success"], false);

        let got = call(&api, Operation::RelationGet, json!({"id": rel_id}));
        assert_eq!(got["data"]["relation_type"], "partOf");

        assert_eq!(
            call(&api, Operation::RelationDelete, json!({"id": rel_id})),
            json!({"success": true})
        );
        assert_eq!(
            call(&api, Operation::RelationGet, json!({"id": rel_id}))["error"],
            "relation not found"
        );
    }

    #[test]
    fn relation_list_directions_and_filter() {
        let api = api();
        let a1 = create(&api, "s1");
        let a2 = create(&api, "s2");
        let a3 = create(&api, "s3");
        for (src, tgt, t) in [(&a1, &a2, "partOf"), (&a3, &a1, "connectedTo"), (&a1, &a1, "locatedIn")] {
            let reply = call(
                &api,
                Operation::RelationCreate,
                json!({"source_asset_id": src, "target_asset_id": tgt, "relation_type": t}),
            );
            assert_eq!(reply["success"], true);
        }

        let count = |body: Value| {
            call(&api, Operation::RelationList, body)["data"]
                .as_array()
                .map(Vec::len)
        };
        assert_eq!(count(json!({"asset_id": a1, "direction": "outgoing"})), Some(2));
        assert_eq!(count(json!({"asset_id": a1, "direction": "incoming"})), Some(2));
        // the self-loop appears once per direction
        assert_eq!(count(json!({"asset_id": a1})), Some(4));
        assert_eq!(
            count(json!({"asset_id": a1, "relation_type": "connectedTo"})),
            Some(1)
        );

        let bad = call(
            &api,
            Operation::RelationList,
            json!({"asset_id": a1, "direction": "up"}),
        );
        assert_eq!(bad["success"], false);
        assert_eq!(
            call(&api, Operation::RelationList, json!({}))["error"],
            "asset_id is required"
        );
    }

    #[test]
    fn unencodable_reply_falls_back() {
        // tuple keys cannot be JSON object keys
        let data: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        assert_eq!(reply(&Response::ok(data)), FALLBACK_RESPONSE.to_vec());
    }
}
