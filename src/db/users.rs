//! User accounts: search, lookup, and the account writes. Only public
//! profile columns are selected; password hashes and salts never leave the
//! table through this module.
//!
//! Passwords are stored as the SHA-256 hex digest of the password followed
//! by a per-account random salt. A new password always gets a new salt.

use super::{check_text, conflict_on_duplicate, require_text, Database};
use crate::error::{Error, Result};
use crate::search::{
    parse_int, BaseQuery, FilteredSearch, Op, PageSpec, Row, RowStore, SearchCriteria,
    SearchResult, SortSpec,
};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

const BASE: BaseQuery = BaseQuery {
    select: "id, acronym, name, info, email, published, updated",
    from: "rm_user",
    group_by: None,
};

pub const SORTABLE: &[(&str, &str)] = &[("id", "id"), ("acronym", "acronym"), ("name", "name")];

#[derive(Deserialize, Default, Clone, Debug)]
pub struct UserFilter {
    pub id: Option<String>,
    /// `LIKE` pattern on the acronym.
    pub acronym: Option<String>,
    /// `LIKE` pattern on the display name.
    pub name: Option<String>,
    pub hits: Option<String>,
    pub page: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
}

impl UserFilter {
    pub fn to_search(&self, default_hits: Option<u32>) -> Result<FilteredSearch> {
        let criteria = SearchCriteria::new()
            .int("id", Op::Eq, parse_int("id", self.id.as_deref())?)
            .text("acronym", Op::Like, self.acronym.as_deref())
            .text("name", Op::Like, self.name.as_deref());
        let sort = SortSpec::parse(SORTABLE, self.orderby.as_deref(), self.order.as_deref())?;
        let page = PageSpec::parse(self.hits.as_deref(), self.page.as_deref(), default_hits)?;
        Ok(FilteredSearch::new(BASE, criteria, sort, page))
    }
}

pub async fn search<S: RowStore + ?Sized>(
    store: &S,
    filter: &UserFilter,
    default_hits: Option<u32>,
) -> Result<SearchResult> {
    filter.to_search(default_hits)?.search(store).await
}

pub async fn find_user<S: RowStore + ?Sized>(store: &S, id: i64) -> Result<Row> {
    let filter = UserFilter {
        id: Some(id.to_string()),
        ..Default::default()
    };
    let query = filter.to_search(None)?.build_filtered_query();
    crate::search::execute(store, &query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("user", id))
}

/// Account fields as sent on sign-up or by an account editor.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct UserInput {
    pub acronym: String,
    pub name: Option<String>,
    pub info: Option<String>,
    pub email: Option<String>,
    /// New password; on update, `None` keeps the current one.
    pub password: Option<String>,
}

impl UserInput {
    /// Sign-up needs an acronym, a name and a password.
    pub fn validate_new(&self) -> Result<()> {
        self.validate()?;
        require_text("name", self.name.as_deref(), 80)?;
        require_text("password", self.password.as_deref(), 200)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        require_text("acronym", Some(&self.acronym), 20)?;
        check_text("name", self.name.as_deref(), 80)?;
        check_text("email", self.email.as_deref(), 80)?;
        if self.password.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(Error::Validation("password cannot be blank".to_string()));
        }
        Ok(())
    }
}

/// Stored form of a password: hex SHA-256 of the password and salt.
pub fn password_hash(password: &str, salt: i32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_salt() -> i32 {
    rand::rng().random_range(1..i32::MAX)
}

fn acronym_taken(acronym: &str) -> impl FnOnce() -> String + '_ {
    move || format!("acronym '{acronym}' is already taken")
}

impl Database {
    /// Create an account. A taken acronym is [`Error::Conflict`].
    pub async fn create_user(&self, user: &UserInput) -> Result<i64> {
        user.validate_new()?;
        let acronym = user.acronym.trim();
        let salt = new_salt();
        let hash = password_hash(user.password.as_deref().unwrap_or_default(), salt);
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO rm_user (acronym, name, info, email, published, updated, password, salt)
             VALUES ($1, $2, $3, $4, NOW(), NULL, $5, $6)
             RETURNING id",
        )
        .bind(acronym)
        .bind(user.name.as_deref().map(str::trim))
        .bind(user.info.as_deref())
        .bind(user.email.as_deref())
        .bind(&hash)
        .bind(salt)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, acronym_taken(acronym)))?;
        info!(id, acronym, "user created");
        Ok(i64::from(id))
    }

    /// Update an account's profile, and its password when one is given.
    pub async fn update_user(&self, id: i64, user: &UserInput) -> Result<()> {
        user.validate()?;
        let acronym = user.acronym.trim();
        let credentials = user.password.as_deref().map(|password| {
            let salt = new_salt();
            (password_hash(password, salt), salt)
        });
        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE rm_user SET
                 acronym = $1, name = $2, info = $3, email = $4, updated = NOW(),
                 password = COALESCE($5, password), salt = COALESCE($6, salt)
             WHERE id = $7
             RETURNING id",
        )
        .bind(acronym)
        .bind(user.name.as_deref().map(str::trim))
        .bind(user.info.as_deref())
        .bind(user.email.as_deref())
        .bind(credentials.as_ref().map(|(hash, _)| hash.as_str()))
        .bind(credentials.as_ref().map(|(_, salt)| *salt))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, acronym_taken(acronym)))?;
        updated.ok_or_else(|| Error::not_found("user", id))?;
        info!(id, acronym, password_changed = credentials.is_some(), "user updated");
        Ok(())
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM rm_user WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(Error::not_found("user", id));
        }
        info!(id, "user deleted");
        Ok(())
    }

    /// Acronym of the account with this id.
    pub async fn user_acronym(&self, id: i64) -> Result<String> {
        sqlx::query_scalar("SELECT acronym FROM rm_user WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("user", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::BindValue;

    #[test]
    fn credentials_are_never_selected() {
        let query = UserFilter::default()
            .to_search(Some(8))
            .unwrap()
            .build_filtered_query();
        assert!(!query.sql.contains("password"));
        assert!(!query.sql.contains("salt"));
    }

    #[test]
    fn acronym_and_name_patterns() {
        let filter = UserFilter {
            acronym: Some("ad%".into()),
            name: Some("%son".into()),
            orderby: Some("name".into()),
            order: Some("desc".into()),
            ..Default::default()
        };
        let query = filter.to_search(Some(8)).unwrap().build_filtered_query();
        assert_eq!(
            query.sql,
            "SELECT id, acronym, name, info, email, published, updated FROM rm_user \
             WHERE acronym LIKE $1 AND name LIKE $2 ORDER BY name DESC LIMIT 8 OFFSET 0"
        );
        assert_eq!(
            query.params,
            vec![BindValue::Text("ad%".into()), BindValue::Text("%son".into())]
        );
    }

    #[test]
    fn sorting_by_email_is_rejected() {
        let filter = UserFilter {
            orderby: Some("email".into()),
            ..Default::default()
        };
        assert!(matches!(filter.to_search(Some(8)), Err(Error::Validation(_))));
    }

    #[test]
    fn sign_up_needs_name_and_password() {
        let user = UserInput {
            acronym: "doe".into(),
            name: Some("John Doe".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        assert!(user.validate_new().is_ok());

        let without_password = UserInput { password: None, ..user.clone() };
        assert!(matches!(without_password.validate_new(), Err(Error::Validation(_))));
        assert!(without_password.validate().is_ok(), "updates may keep the password");

        let without_name = UserInput { name: Some(" ".into()), ..user.clone() };
        assert!(matches!(without_name.validate_new(), Err(Error::Validation(_))));

        let long_acronym = UserInput { acronym: "a".repeat(21), ..user };
        assert!(matches!(long_acronym.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn blank_password_is_rejected_on_update() {
        let user = UserInput {
            acronym: "doe".into(),
            password: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(user.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn password_hash_depends_on_salt() {
        let a = password_hash("secret", 1);
        assert_eq!(a.len(), 64);
        assert_eq!(a, password_hash("secret", 1));
        assert_ne!(a, password_hash("secret", 2));
        assert_ne!(a, password_hash("Secret", 1));
    }

    #[test]
    fn id_must_be_numeric() {
        let filter = UserFilter {
            id: Some("1 OR 1=1".into()),
            ..Default::default()
        };
        assert!(matches!(filter.to_search(Some(8)), Err(Error::Validation(_))));
    }
}
