//! User lookup.

use std::sync::Arc;

use crate::client::ClientInner;
use crate::models::{User, UserId};
use crate::{Error, Result};

/// Service for user operations.
pub struct UsersService {
    inner: Arc<ClientInner>,
}

impl UsersService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Fetch a user by ID.
    pub async fn get(&self, id: &UserId) -> Result<User> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: User,
        }

        let envelope: Envelope = self
            .inner
            .get(&format!("/user/{id}"))
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => Error::NotFound(format!("user {id} cannot be found")),
                other => other,
            })?;
        Ok(envelope.data)
    }
}
