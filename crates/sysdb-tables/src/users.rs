//! `rethinkdb.users`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use sysdb_common::{
    AdminError, AdminResult, AuthMetadata, Datum, OperationContext, User, Username,
};
use sysdb_metadata::SemilatticeView;

use crate::backend::ArtificialTableBackend;
use crate::datum::{as_object, check_keys, check_primary_key, expect_str};

pub struct UsersBackend {
    auth_view: Arc<SemilatticeView<AuthMetadata>>,
    hash_cost: u32,
}

enum PasswordChange {
    Keep,
    Clear,
    Set(String),
}

impl UsersBackend {
    pub fn new(auth_view: Arc<SemilatticeView<AuthMetadata>>, hash_cost: u32) -> Self {
        Self {
            auth_view,
            hash_cost,
        }
    }

    fn parse_password(&self, value: Option<&Value>) -> AdminResult<PasswordChange> {
        match value {
            None | Some(Value::Bool(true)) => Ok(PasswordChange::Keep),
            Some(Value::Bool(false)) => Ok(PasswordChange::Clear),
            Some(Value::String(password)) => bcrypt::hash(password, self.hash_cost)
                .map(PasswordChange::Set)
                .map_err(|e| AdminError::invalid(format!("Failed to hash password: {}", e))),
            Some(other) => Err(AdminError::invalid(format!(
                "Expected a string or `false` for `password`, got {}.",
                other
            ))),
        }
    }
}

fn row(username: &Username, user: &User) -> Datum {
    json!({
        "id": username.as_str(),
        "password": user.password_hash.is_some(),
    })
}

#[async_trait]
impl ArtificialTableBackend for UsersBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        Ok(self.auth_view.read(|auth| {
            auth.users
                .iter()
                .map(|(username, user)| row(username, user))
                .collect()
        }))
    }

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        ctx.check_interrupted()?;
        let Some(username) = pkey.as_str().and_then(|s| Username::new(s).ok()) else {
            return Ok(None);
        };
        Ok(self
            .auth_view
            .read(|auth| auth.users.get(&username).map(|user| row(&username, user))))
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let username = Username::new(expect_str(pkey, "id")?).map_err(AdminError::invalid)?;

        let Some(row) = new_value else {
            if username.is_admin() {
                return Err(AdminError::invalid("The user `admin` can't be deleted."));
            }
            let removed = self
                .auth_view
                .apply(|auth| auth.users.remove(&username).is_some());
            if removed {
                tracing::info!(user = %username, "deleted user");
            }
            return Ok(());
        };

        let obj = as_object(&row)?;
        check_keys(obj, &["id", "password"])?;
        check_primary_key(obj, pkey)?;
        let change = self.parse_password(obj.get("password"))?;

        self.auth_view.try_apply(|auth| {
            match auth.users.get_mut(&username) {
                Some(user) => match change {
                    PasswordChange::Keep => {}
                    PasswordChange::Clear => user.password_hash = None,
                    PasswordChange::Set(hash) => user.password_hash = Some(hash),
                },
                None => {
                    let hash = match change {
                        PasswordChange::Keep => {
                            return Err(AdminError::invalid(
                                "Expected a field named `password` holding a string or `false`.",
                            ));
                        }
                        PasswordChange::Clear => None,
                        PasswordChange::Set(hash) => Some(hash),
                    };
                    auth.users
                        .insert(username.clone(), User::with_password_hash(hash));
                    tracing::info!(user = %username, "created user");
                }
            }
            Ok(())
        })
    }
}
