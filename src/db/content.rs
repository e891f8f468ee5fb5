//! Writing to `rm_content`: blog posts and pages.
//!
//! Posts are addressed by slug and pages by url; both must be unique across
//! the table. Deleting is soft and stamps `deleted`, which hides the row
//! from the news listing. Erasing removes the row for good.

use super::{check_text, conflict_on_duplicate, require_text, Database};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Post,
    Page,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Page => "page",
        }
    }
}

/// A post or page as written by its author.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct ContentInput {
    pub title: String,
    /// Generated from the title when a post has none.
    pub slug: Option<String>,
    pub url: Option<String>,
    pub data: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ContentType,
    /// Text filters applied on display, e.g. `markdown,nl2br`.
    pub filter: Option<String>,
    /// Unset keeps the row a draft.
    pub published: Option<DateTime<Utc>>,
}

impl ContentInput {
    pub fn validate(&self) -> Result<()> {
        require_text("title", Some(&self.title), 80)?;
        check_text("slug", self.slug.as_deref(), 80)?;
        check_text("url", self.url.as_deref(), 80)?;
        check_text("filter", self.filter.as_deref(), 80)?;
        if self.kind == ContentType::Page {
            require_text("url", self.url.as_deref(), 80)?;
        }
        if self.kind == ContentType::Post && self.slug().is_empty() {
            return Err(Error::Validation(
                "slug is required when the title has no letters or digits".to_string(),
            ));
        }
        Ok(())
    }

    /// The slug to store: the given one, or one made from the title for posts.
    pub fn slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ if self.kind == ContentType::Post => slugify(&self.title),
            _ => String::new(),
        }
    }

    fn stored_slug(&self) -> Option<String> {
        Some(self.slug()).filter(|s| !s.is_empty())
    }

    fn stored_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Lowercase, ASCII-only slug with single dashes between words.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().to_lowercase().chars() {
        let c = match c {
            'å' | 'ä' | 'à' | 'á' => 'a',
            'ö' | 'ø' | 'ó' => 'o',
            'é' | 'è' | 'ë' => 'e',
            'ü' => 'u',
            c => c,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn address_taken(content: &ContentInput) -> impl FnOnce() -> String + '_ {
    move || match content.kind {
        ContentType::Post => format!("slug '{}' is already in use", content.slug()),
        ContentType::Page => format!(
            "url '{}' is already in use",
            content.stored_url().unwrap_or_default()
        ),
    }
}

impl Database {
    /// Store a new post or page written by `author`. Returns the new id.
    pub async fn create_content(&self, author: &str, content: &ContentInput) -> Result<i64> {
        content.validate()?;
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO rm_content (slug, url, type, title, data, filter, author, published)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(content.stored_slug())
        .bind(content.stored_url())
        .bind(content.kind.as_str())
        .bind(content.title.trim())
        .bind(content.data.as_deref())
        .bind(content.filter.as_deref())
        .bind(author)
        .bind(content.published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, address_taken(content)))?;
        info!(id, author, kind = content.kind.as_str(), "content created");
        Ok(i64::from(id))
    }

    /// Replace a row's text and addressing. The author stays the same.
    pub async fn update_content(&self, id: i64, content: &ContentInput) -> Result<()> {
        content.validate()?;
        let updated: Option<i32> = sqlx::query_scalar(
            "UPDATE rm_content SET
                 slug = $1, url = $2, type = $3, title = $4, data = $5, filter = $6,
                 published = $7, updated = NOW()
             WHERE id = $8
             RETURNING id",
        )
        .bind(content.stored_slug())
        .bind(content.stored_url())
        .bind(content.kind.as_str())
        .bind(content.title.trim())
        .bind(content.data.as_deref())
        .bind(content.filter.as_deref())
        .bind(content.published)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, address_taken(content)))?;
        updated.ok_or_else(|| Error::not_found("content", id))?;
        info!(id, "content updated");
        Ok(())
    }

    /// Soft delete. Deleting twice is [`Error::NotFound`].
    pub async fn delete_content(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query(
            "UPDATE rm_content SET deleted = NOW() WHERE id = $1 AND deleted IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(Error::not_found("content", id));
        }
        info!(id, "content deleted");
        Ok(())
    }

    /// Remove the row, deleted or not.
    pub async fn erase_content(&self, id: i64) -> Result<()> {
        let erased = sqlx::query("DELETE FROM rm_content WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if erased.rows_affected() == 0 {
            return Err(Error::not_found("content", id));
        }
        info!(id, "content erased");
        Ok(())
    }

    /// Acronym of the row's author; `None` for rows nobody owns.
    pub async fn content_author(&self, id: i64) -> Result<Option<String>> {
        sqlx::query_scalar::<_, Option<String>>("SELECT author FROM rm_content WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("content", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str) -> ContentInput {
        ContentInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn slugify_folds_swedish_letters() {
        assert_eq!(slugify("Nya filmer på Rental Movies!"), "nya-filmer-pa-rental-movies");
        assert_eq!(slugify("  Höstens  bästa -- val  "), "hostens-basta-val");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn post_slug_comes_from_title_when_missing() {
        assert_eq!(post("Welcome back").slug(), "welcome-back");
        let given = ContentInput {
            slug: Some(" my-slug ".into()),
            ..post("Welcome back")
        };
        assert_eq!(given.slug(), "my-slug");
    }

    #[test]
    fn pages_need_a_url_and_no_slug() {
        let page = ContentInput {
            kind: ContentType::Page,
            ..post("About")
        };
        assert!(matches!(page.validate(), Err(Error::Validation(_))));
        assert_eq!(page.stored_slug(), None);

        let page = ContentInput {
            url: Some("about".into()),
            ..page
        };
        assert!(page.validate().is_ok());
    }

    #[test]
    fn post_needs_a_sluggable_title() {
        assert!(post("Hello").validate().is_ok());
        assert!(matches!(post("!!!").validate(), Err(Error::Validation(_))));
        assert!(matches!(post("").validate(), Err(Error::Validation(_))));
        assert!(matches!(post(&"x".repeat(81)).validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn type_is_read_from_lowercase_json() {
        let input: ContentInput =
            serde_json::from_str(r#"{"title":"About","type":"page","url":"about"}"#).unwrap();
        assert_eq!(input.kind, ContentType::Page);
        let input: ContentInput = serde_json::from_str(r#"{"title":"News"}"#).unwrap();
        assert_eq!(input.kind, ContentType::Post);
        assert!(serde_json::from_str::<ContentInput>(r#"{"title":"x","type":"blog"}"#).is_err());
    }
}
