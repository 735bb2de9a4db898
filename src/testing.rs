//! In-memory stand-ins for the database and external services, plus a
//! router harness. Test builds only.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    ai::provider::{GenerationProvider, ProviderError},
    app::build_app,
    auth::{
        google::{GoogleError, GoogleIdentity, GoogleVerifier},
        jwt::{make_keys, JwtKeys},
        repo::UserRepo,
        repo_types::{NewUser, Plan, User},
    },
    config::{AiConfig, AppConfig, JwtConfig, PaymentConfig, StorageConfig},
    creations::{
        query::{ListQuery, Page, Scope, SortField, SortOrder, TypeFilter},
        repo::CreationRepo,
        repo_types::{Creation, CreationType, LikeOutcome, NewCreation, OwnedOutcome},
    },
    payment::gateway::{signature_matches, Order, OrderRequest, PaymentError, PaymentGateway},
    state::AppState,
    storage::StorageClient,
};

pub const PAYMENT_SECRET: &str = "test-payment-secret";

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    creations: BTreeMap<i64, Creation>,
    next_id: i64,
}

/// Both repositories over one mutex. Every operation holds the lock for its
/// whole read-modify-write, matching the row-level atomicity of the SQL path.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn insert_at(&self, new: NewCreation, created_at: OffsetDateTime) -> Creation {
        let mut t = self.lock();
        t.next_id += 1;
        let creation = Creation {
            id: t.next_id,
            user_id: new.user_id,
            prompt: new.prompt,
            content: new.content,
            kind: new.kind,
            publish: new.publish,
            likes: Vec::new(),
            created_at,
        };
        t.creations.insert(creation.id, creation.clone());
        creation
    }

    pub fn creation(&self, id: i64) -> Option<Creation> {
        self.lock().creations.get(&id).cloned()
    }

    pub fn creation_count(&self) -> usize {
        self.lock().creations.len()
    }

    pub fn remove_user(&self, id: Uuid) {
        let mut t = self.lock();
        t.users.remove(&id);
        t.creations.retain(|_, c| c.user_id != id);
    }
}

fn matches(c: &Creation, q: &ListQuery) -> bool {
    let in_scope = match q.scope {
        Scope::Owner(owner) => c.user_id == owner,
        Scope::Published => c.publish,
    };
    let kind_ok = match q.kind {
        TypeFilter::Any => true,
        TypeFilter::Only(k) => c.kind == k,
        TypeFilter::Unmatchable => false,
    };
    let search_ok = q
        .search
        .as_deref()
        .map(|s| c.prompt.to_lowercase().contains(&s.to_lowercase()))
        .unwrap_or(true);
    in_scope && kind_ok && search_ok
}

fn compare(a: &Creation, b: &Creation, q: &ListQuery) -> Ordering {
    let primary = match q.sort_by {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Likes => a.likes.len().cmp(&b.likes.len()),
        SortField::Type => a.kind.as_str().cmp(b.kind.as_str()),
    };
    let primary = match q.sort_order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut t = self.lock();
        if t.users.values().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            google_id: new.google_id,
            avatar: new.avatar,
            plan: Plan::Free,
            free_usage: 0,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn link_google(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> anyhow::Result<User> {
        let mut t = self.lock();
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {id} missing"))?;
        user.google_id = Some(google_id.to_string());
        if user.avatar.is_none() {
            user.avatar = avatar.map(str::to_string);
        }
        Ok(user.clone())
    }

    async fn set_plan(&self, id: Uuid, plan: Plan) -> anyhow::Result<Option<User>> {
        let mut t = self.lock();
        Ok(t.users.get_mut(&id).map(|u| {
            u.plan = plan;
            u.clone()
        }))
    }

    async fn increment_free_usage(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(u) = self.lock().users.get_mut(&id) {
            u.free_usage += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl CreationRepo for MemoryStore {
    async fn insert(&self, new: NewCreation) -> anyhow::Result<Creation> {
        Ok(self.insert_at(new, OffsetDateTime::now_utc()))
    }

    async fn list(&self, q: &ListQuery) -> anyhow::Result<Page<Creation>> {
        let t = self.lock();
        let mut hits: Vec<&Creation> = t.creations.values().filter(|c| matches(c, q)).collect();
        hits.sort_by(|a, b| compare(a, b, q));
        let items = hits
            .into_iter()
            .skip(q.offset() as usize)
            .take(q.limit as usize)
            .cloned()
            .collect();
        let total = t.creations.values().filter(|c| matches(c, q)).count() as i64;
        Ok(Page {
            items,
            total,
            page: q.page,
            limit: q.limit,
        })
    }

    async fn toggle_like(&self, id: i64, user_id: Uuid) -> anyhow::Result<LikeOutcome> {
        let mut t = self.lock();
        let Some(c) = t.creations.get_mut(&id) else {
            return Ok(LikeOutcome::NotFound);
        };
        if !c.publish && c.user_id != user_id {
            return Ok(LikeOutcome::NotFound);
        }
        let me = user_id.to_string();
        if let Some(pos) = c.likes.iter().position(|l| *l == me) {
            c.likes.remove(pos);
            Ok(LikeOutcome::Unliked)
        } else {
            c.likes.push(me);
            Ok(LikeOutcome::Liked)
        }
    }

    async fn toggle_publish(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<bool>> {
        let mut t = self.lock();
        Ok(match t.creations.get_mut(&id) {
            None => OwnedOutcome::NotFound,
            Some(c) if c.user_id != owner => OwnedOutcome::NotOwner,
            Some(c) => {
                c.publish = !c.publish;
                OwnedOutcome::Done(c.publish)
            }
        })
    }

    async fn delete(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<()>> {
        let mut t = self.lock();
        Ok(match t.creations.get(&id) {
            None => OwnedOutcome::NotFound,
            Some(c) if c.user_id != owner => OwnedOutcome::NotOwner,
            Some(_) => {
                t.creations.remove(&id);
                OwnedOutcome::Done(())
            }
        })
    }
}

/// Echoes prompts back; optionally fails every call.
#[derive(Default)]
pub struct FakeProvider {
    pub fail: bool,
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        if self.fail {
            return Err(ProviderError::Api {
                status: 503,
                message: "overloaded".into(),
            });
        }
        Ok(format!("[{max_tokens}] {prompt}"))
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Bytes, ProviderError> {
        if self.fail {
            return Err(ProviderError::Timeout);
        }
        Ok(Bytes::from_static(b"\xff\xd8\xff fake jpeg"))
    }

    async fn remove_background(&self, source_url: &str) -> Result<String, ProviderError> {
        if self.fail {
            return Err(ProviderError::Timeout);
        }
        Ok(format!("{source_url}#no-bg"))
    }

    async fn remove_object(&self, source_url: &str, object: &str) -> Result<String, ProviderError> {
        if self.fail {
            return Err(ProviderError::Timeout);
        }
        Ok(format!("{source_url}#no-{object}"))
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
        self.keys.lock().unwrap_or_else(|p| p.into_inner()).push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|k| k != key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }
}

pub struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, req: OrderRequest) -> Result<Order, PaymentError> {
        Ok(Order {
            id: "order_test_1".into(),
            amount: req.amount,
            currency: req.currency,
            receipt: Some(req.receipt),
            status: Some("created".into()),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(PAYMENT_SECRET, order_id, payment_id, signature)
    }
}

/// Accepts credentials of the form `google:<email>`.
pub struct FakeGoogle;

#[async_trait]
impl GoogleVerifier for FakeGoogle {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleError> {
        let email = credential
            .strip_prefix("google:")
            .ok_or_else(|| GoogleError::Rejected("bad credential".into()))?;
        Ok(GoogleIdentity {
            google_id: format!("g-{email}"),
            email: email.to_string(),
            name: "Google User".into(),
            avatar: Some("https://img.test/avatar.png".into()),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-iss".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        },
        storage: StorageConfig {
            endpoint: "http://storage.test".into(),
            bucket: "creations".into(),
            access_key: "x".into(),
            secret_key: "x".into(),
            region: "us-east-1".into(),
            public_url: "https://cdn.test".into(),
        },
        ai: AiConfig {
            api_key: String::new(),
            base_url: "http://ai.test".into(),
            model: "test-model".into(),
            image_api_url: "http://image.test".into(),
            cloudinary_cloud_name: "demo".into(),
            timeout_secs: 5,
        },
        payment: PaymentConfig {
            key_id: "rzp_test_key".into(),
            key_secret: PAYMENT_SECRET.into(),
            base_url: "http://payments.test".into(),
        },
        google_client_id: None,
        plan_override_enabled: false,
    }
}

/// A router wired to in-memory collaborators, plus handles to seed and inspect them.
pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub storage: Arc<FakeStorage>,
    pub keys: JwtKeys,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(test_config(), FakeProvider::default())
    }

    pub fn with_config(f: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = test_config();
        f(&mut cfg);
        Self::build(cfg, FakeProvider::default())
    }

    pub fn with_failing_provider() -> Self {
        Self::build(test_config(), FakeProvider { fail: true })
    }

    fn build(config: AppConfig, provider: FakeProvider) -> Self {
        let keys = make_keys(&config.jwt.secret, &config.jwt.issuer, &config.jwt.audience);
        let store = Arc::new(MemoryStore::default());
        let storage = Arc::new(FakeStorage::default());
        let state = AppState {
            config: Arc::new(config),
            jwt: keys.clone(),
            identity: Arc::new(keys.clone()),
            google: Arc::new(FakeGoogle),
            users: store.clone(),
            creations: store.clone(),
            provider: Arc::new(provider),
            storage: storage.clone(),
            payments: Arc::new(FakeGateway),
        };
        Self {
            state,
            store,
            storage,
            keys,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    /// Seeds a password-less user on `plan` and returns it with a valid token.
    pub async fn user(&self, name: &str, plan: Plan) -> (User, String) {
        let created = UserRepo::create(
            self.store.as_ref(),
            NewUser {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: None,
                google_id: Some(format!("g-{name}")),
                avatar: None,
            },
        )
        .await
        .unwrap()
        .expect("fresh email");
        let user = self.store.set_plan(created.id, plan).await.unwrap().unwrap();
        let token = self.keys.sign(user.id).unwrap();
        (user, token)
    }

    /// Seeds a creation; each call is one second newer than the last.
    pub fn creation(&self, owner: Uuid, prompt: &str, kind: CreationType, publish: bool) -> Creation {
        let created_at = OffsetDateTime::now_utc()
            + time::Duration::seconds(self.store.creation_count() as i64);
        self.store.insert_at(
            NewCreation {
                user_id: owner,
                prompt: prompt.into(),
                content: format!("content for {prompt}"),
                kind,
                publish,
            },
            created_at,
        )
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        self.send(req).await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// Hand-built multipart body with one file part and optional text parts.
pub fn multipart(
    file_field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
    fields: &[(&str, &str)],
) -> (String, Vec<u8>) {
    let boundary = "----creatorly-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{file_field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
