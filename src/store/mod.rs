//! In-memory user record store
//!
//! Records are open-schema JSON objects kept in insertion order. The only
//! field the store owns is `id`, assigned on creation. All access goes through
//! one `RwLock`, so id assignment and lookups are atomic with respect to
//! concurrent mutations.

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::config::{IdAssignment, StoreConfig};

/// A user record: field name to JSON value, `id` first
pub type User = Map<String, Value>;

/// Reserved record field
pub const ID_FIELD: &str = "id";

struct Inner {
    users: Vec<User>,
    /// Highest id ever handed out, only consulted for `IdAssignment::Monotonic`
    last_issued: i64,
}

pub struct UserStore {
    inner: RwLock<Inner>,
    id_assignment: IdAssignment,
    protect_id: bool,
}

impl UserStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: Vec::new(),
                last_issued: 0,
            }),
            id_assignment: config.id_assignment,
            protect_id: config.protect_id,
        }
    }

    /// Append a record built from `fields` and return it with its new id
    ///
    /// A client-supplied `id` is discarded.
    pub async fn create(&self, fields: User) -> User {
        let mut inner = self.inner.write().await;

        let highest = max_id(&inner.users).unwrap_or(0).max(0);
        let id = match self.id_assignment {
            IdAssignment::MaxPlusOne => highest.saturating_add(1),
            IdAssignment::Monotonic => highest.max(inner.last_issued).saturating_add(1),
        };
        inner.last_issued = inner.last_issued.max(id);

        let mut user = User::new();
        user.insert(ID_FIELD.to_string(), Value::from(id));
        user.extend(fields.into_iter().filter(|(key, _)| key != ID_FIELD));

        inner.users.push(user.clone());
        user
    }

    /// Snapshot of every record, in insertion order
    pub async fn list(&self) -> Vec<User> {
        self.inner.read().await.users.clone()
    }

    pub async fn get(&self, id: i64) -> Option<User> {
        let inner = self.inner.read().await;
        inner.users.iter().find(|u| id_of(u) == Some(id)).cloned()
    }

    /// Shallow-merge `fields` onto the record with `id`
    ///
    /// Existing keys keep their position; new keys are appended.
    pub async fn update(&self, id: i64, fields: User) -> Option<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.iter_mut().find(|u| id_of(u) == Some(id))?;

        for (key, value) in fields {
            if self.protect_id && key == ID_FIELD {
                continue;
            }
            user.insert(key, value);
        }

        Some(user.clone())
    }

    /// Remove the record with `id`, keeping the order of the rest
    ///
    /// Returns `false` if no record matched.
    pub async fn delete(&self, id: i64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.users.iter().position(|u| id_of(u) == Some(id)) {
            Some(index) => {
                inner.users.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Integer id of a record, if it still has one
///
/// Updates may overwrite `id` with anything; integral floats still count.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn id_of(user: &User) -> Option<i64> {
    let value = user.get(ID_FIELD)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn max_id(users: &[User]) -> Option<i64> {
    users.iter().filter_map(id_of).max()
}
