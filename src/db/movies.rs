//! Movie catalogue — filtered search, lookup by id, and the genre list,
//! plus the editor's writes and renting.
//!
//! Movies are joined with their genres and grouped per movie, so each row
//! carries a comma-separated `genre` column. Filtering on a genre therefore
//! happens before grouping, and the count query counts grouped movies.
//!
//! Editors name genres; the links in `rm_movie2genre` are kept in step with
//! the movie inside the same transaction. Unknown genre names are rejected.

use super::{check_text, require_text, Database};
use crate::error::{Error, Result};
use crate::search::{
    self, parse_int, BaseQuery, BuiltQuery, FilteredSearch, Op, PageSpec, Row, RowStore,
    SearchCriteria, SearchResult, SortSpec,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres, Row as _};
use std::collections::BTreeSet;
use tracing::info;

const BASE: BaseQuery = BaseQuery {
    select: "m.id, m.title, m.director, m.length, m.year, m.plot, m.image, m.subtext, \
             m.speech, m.quality, m.format, m.price, m.imdb, m.youtube, m.published, \
             m.rented, m.rents, string_agg(g.name, ',' ORDER BY g.name) AS genre",
    from: "rm_movie AS m \
           LEFT OUTER JOIN rm_movie2genre AS m2g ON m.id = m2g.id_movie \
           LEFT OUTER JOIN rm_genre AS g ON m2g.id_genre = g.id",
    group_by: Some("m.id"),
};

/// Sortable columns by request name; the first is the default.
pub const SORTABLE: &[(&str, &str)] = &[
    ("id", "m.id"),
    ("title", "m.title"),
    ("year", "m.year"),
    ("price", "m.price"),
];

/// Movie search request, as received from a query string.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct MovieFilter {
    pub id: Option<String>,
    /// `LIKE` pattern; `%` works as a wildcard.
    pub title: Option<String>,
    /// Earliest production year.
    pub year1: Option<String>,
    /// Latest production year.
    pub year2: Option<String>,
    pub genre: Option<String>,
    pub hits: Option<String>,
    pub page: Option<String>,
    pub orderby: Option<String>,
    pub order: Option<String>,
}

impl MovieFilter {
    /// Validate the request and build the search. Nothing is queried here.
    pub fn to_search(&self, default_hits: Option<u32>) -> Result<FilteredSearch> {
        let criteria = SearchCriteria::new()
            .int("m.id", Op::Eq, parse_int("id", self.id.as_deref())?)
            .text("m.title", Op::Like, self.title.as_deref())
            .int("m.year", Op::Ge, parse_int("year1", self.year1.as_deref())?)
            .int("m.year", Op::Le, parse_int("year2", self.year2.as_deref())?)
            .text("g.name", Op::Eq, self.genre.as_deref());
        let sort = SortSpec::parse(SORTABLE, self.orderby.as_deref(), self.order.as_deref())?;
        let page = PageSpec::parse(self.hits.as_deref(), self.page.as_deref(), default_hits)?;
        Ok(FilteredSearch::new(BASE, criteria, sort, page))
    }
}

pub async fn search<S: RowStore + ?Sized>(
    store: &S,
    filter: &MovieFilter,
    default_hits: Option<u32>,
) -> Result<SearchResult> {
    filter.to_search(default_hits)?.search(store).await
}

/// Single movie by id; zero rows is [`Error::NotFound`].
pub async fn find_movie<S: RowStore + ?Sized>(store: &S, id: i64) -> Result<Row> {
    let criteria = SearchCriteria::new().int("m.id", Op::Eq, Some(id));
    let query = search::build_filtered_query(
        &BASE,
        &criteria,
        &SortSpec::parse(SORTABLE, None, None)?,
        &PageSpec::all(),
    );
    search::execute(store, &query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("movie", id))
}

/// Names of the genres that at least one movie uses, alphabetically.
pub async fn list_genres<S: RowStore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let query = BuiltQuery {
        sql: "SELECT DISTINCT g.name FROM rm_genre AS g \
              INNER JOIN rm_movie2genre AS m2g ON g.id = m2g.id_genre \
              ORDER BY g.name"
            .to_string(),
        params: Vec::new(),
    };
    search::execute(store, &query)
        .await?
        .into_iter()
        .map(|row| match row.get("name") {
            Some(Value::String(name)) => Ok(name.clone()),
            _ => Err(Error::Query("genre row without a name".to_string())),
        })
        .collect()
}

/// A movie as written by an editor. Rent counters are not part of it.
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub struct MovieInput {
    pub title: String,
    pub director: Option<String>,
    /// Running time in minutes.
    pub length: Option<i32>,
    pub year: Option<i32>,
    pub plot: Option<String>,
    pub image: Option<String>,
    /// Subtitle language code, e.g. `swe`.
    pub subtext: Option<String>,
    pub speech: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub price: Option<i32>,
    pub imdb: Option<String>,
    pub youtube: Option<String>,
    /// Genre names; each must exist in `rm_genre`.
    #[serde(default)]
    pub genres: Vec<String>,
}

impl MovieInput {
    /// Check sizes and ranges against the table before any write.
    pub fn validate(&self) -> Result<()> {
        require_text("title", Some(&self.title), 100)?;
        check_text("director", self.director.as_deref(), 100)?;
        check_text("image", self.image.as_deref(), 100)?;
        check_text("subtext", self.subtext.as_deref(), 3)?;
        check_text("speech", self.speech.as_deref(), 3)?;
        check_text("quality", self.quality.as_deref(), 3)?;
        check_text("format", self.format.as_deref(), 4)?;
        check_text("imdb", self.imdb.as_deref(), 100)?;
        check_text("youtube", self.youtube.as_deref(), 100)?;
        for (field, value) in [("length", self.length), ("price", self.price)] {
            if value.is_some_and(|v| v < 0) {
                return Err(Error::Validation(format!("{field} cannot be negative")));
            }
        }
        if let Some(year) = self.year {
            if !(1850..=2100).contains(&year) {
                return Err(Error::Validation(format!("year {year} is out of range")));
            }
        }
        Ok(())
    }

    /// Trimmed, de-duplicated genre names in name order.
    pub fn genre_names(&self) -> Vec<String> {
        self.genres
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Bind the thirteen movie columns as `$1..$13`, in table order.
    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.title.trim())
            .bind(self.director.as_deref())
            .bind(self.length)
            .bind(self.year)
            .bind(self.plot.as_deref())
            .bind(self.image.as_deref())
            .bind(self.subtext.as_deref())
            .bind(self.speech.as_deref())
            .bind(self.quality.as_deref())
            .bind(self.format.as_deref())
            .bind(self.price)
            .bind(self.imdb.as_deref())
            .bind(self.youtube.as_deref())
    }
}

/// The state of a movie right after it was rented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Rental {
    pub id: i32,
    pub title: String,
    /// Times rented, this rental included.
    pub rents: i32,
    pub rented: DateTime<Utc>,
}

/// Genre ids for `names`; any name not in `rm_genre` is a validation error.
async fn genre_ids(conn: &mut PgConnection, names: &[String]) -> Result<Vec<i32>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<(i32, String)> =
        sqlx::query_as("SELECT id, name FROM rm_genre WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&mut *conn)
            .await?;
    let unknown: Vec<&str> = names
        .iter()
        .filter(|n| !found.iter().any(|(_, name)| name == *n))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Validation(format!(
            "unknown genre: {}",
            unknown.join(", ")
        )));
    }
    Ok(found.into_iter().map(|(id, _)| id).collect())
}

/// Make the movie's genre links exactly `genres`: stale links go, missing
/// ones are added, links already in place are left alone.
async fn set_genres(conn: &mut PgConnection, movie_id: i32, genres: &[i32]) -> Result<()> {
    sqlx::query("DELETE FROM rm_movie2genre WHERE id_movie = $1 AND NOT (id_genre = ANY($2))")
        .bind(movie_id)
        .bind(genres)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO rm_movie2genre (id_movie, id_genre)
         SELECT $1, unnest($2::int[])
         ON CONFLICT DO NOTHING",
    )
    .bind(movie_id)
    .bind(genres)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    /// Add a movie and link its genres. Returns the new id.
    pub async fn create_movie(&self, movie: &MovieInput) -> Result<i64> {
        movie.validate()?;
        let mut tx = self.pool.begin().await?;
        let genres = genre_ids(&mut tx, &movie.genre_names()).await?;
        let id: i32 = movie
            .bind_columns(sqlx::query(
                "INSERT INTO rm_movie (title, director, length, year, plot, image, subtext, speech,
                                       quality, format, price, imdb, youtube, published, rented, rents)
                 VALUES ($1, $2, $3, COALESCE($4, 1900), $5, $6, $7, $8, $9, $10, $11, $12, $13,
                         NOW(), NULL, 0)
                 RETURNING id",
            ))
            .fetch_one(&mut *tx)
            .await?
            .try_get("id")?;
        set_genres(&mut tx, id, &genres).await?;
        tx.commit().await?;
        info!(id, title = %movie.title.trim(), "movie created");
        Ok(i64::from(id))
    }

    /// Replace a movie's details and genres. Rent counters are kept.
    pub async fn update_movie(&self, id: i64, movie: &MovieInput) -> Result<()> {
        movie.validate()?;
        let mut tx = self.pool.begin().await?;
        let genres = genre_ids(&mut tx, &movie.genre_names()).await?;
        let updated: Option<i32> = movie
            .bind_columns(sqlx::query(
                "UPDATE rm_movie SET
                     title = $1, director = $2, length = $3, year = COALESCE($4, year),
                     plot = $5, image = $6, subtext = $7, speech = $8, quality = $9,
                     format = $10, price = $11, imdb = $12, youtube = $13
                 WHERE id = $14
                 RETURNING id",
            ))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.try_get("id"))
            .transpose()?;
        let movie_id = updated.ok_or_else(|| Error::not_found("movie", id))?;
        set_genres(&mut tx, movie_id, &genres).await?;
        tx.commit().await?;
        info!(id, "movie updated");
        Ok(())
    }

    /// Remove a movie together with its genre links.
    pub async fn delete_movie(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM rm_movie2genre WHERE id_movie = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM rm_movie WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(Error::not_found("movie", id));
        }
        tx.commit().await?;
        info!(id, "movie deleted");
        Ok(())
    }

    /// Count one more rental and stamp the rental time.
    pub async fn rent_movie(&self, id: i64, acronym: &str) -> Result<Rental> {
        let rental = sqlx::query_as::<_, Rental>(
            "UPDATE rm_movie SET rents = rents + 1, rented = NOW()
             WHERE id = $1
             RETURNING id, title, rents, rented",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("movie", id))?;
        info!(id, acronym, rents = rental.rents, "movie rented");
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::BindValue;

    #[test]
    fn sort_whitelists_known_columns() {
        let cases = [
            ("id", "m.id"),
            ("title", "m.title"),
            ("year", "m.year"),
            ("price", "m.price"),
        ];
        for (input, expected) in cases {
            let filter = MovieFilter {
                orderby: Some(input.into()),
                ..Default::default()
            };
            let query = filter.to_search(Some(8)).unwrap().build_filtered_query();
            assert!(
                query.sql.contains(&format!("ORDER BY {expected} ASC")),
                "{}",
                query.sql
            );
        }
    }

    #[test]
    fn sort_rejects_unknown_columns() {
        for input in ["plot", "'; DROP TABLE rm_movie; --", "m.id"] {
            let filter = MovieFilter {
                orderby: Some(input.into()),
                ..Default::default()
            };
            assert!(
                matches!(filter.to_search(Some(8)), Err(Error::Validation(_))),
                "orderby '{input}' should be rejected"
            );
        }
    }

    #[test]
    fn default_filter_lists_every_movie_on_first_page() {
        let query = MovieFilter::default()
            .to_search(Some(8))
            .unwrap()
            .build_filtered_query();
        assert!(!query.sql.contains("WHERE"));
        assert!(query.sql.ends_with("GROUP BY m.id ORDER BY m.id ASC LIMIT 8 OFFSET 0"));
        assert!(query.params.is_empty());
    }

    #[test]
    fn criteria_bind_in_declaration_order() {
        let filter = MovieFilter {
            title: Some("%star%".into()),
            year1: Some("1977".into()),
            year2: Some("1983".into()),
            genre: Some("scifi".into()),
            hits: Some("4".into()),
            page: Some("2".into()),
            orderby: Some("year".into()),
            order: Some("desc".into()),
            ..Default::default()
        };
        let query = filter.to_search(None).unwrap().build_filtered_query();
        assert!(query.sql.contains(
            "WHERE m.title LIKE $1 AND m.year >= $2 AND m.year <= $3 AND g.name = $4 GROUP BY m.id"
        ));
        assert!(query.sql.ends_with("ORDER BY m.year DESC LIMIT 4 OFFSET 4"));
        assert_eq!(
            query.params,
            vec![
                BindValue::Text("%star%".into()),
                BindValue::Int(1977),
                BindValue::Int(1983),
                BindValue::Text("scifi".into()),
            ]
        );
    }

    #[test]
    fn non_numeric_years_are_rejected() {
        let filter = MovieFilter {
            year1: Some("last year".into()),
            ..Default::default()
        };
        assert!(matches!(filter.to_search(Some(8)), Err(Error::Validation(_))));
    }

    fn valid_movie() -> MovieInput {
        MovieInput {
            title: "Alien".into(),
            year: Some(1979),
            speech: Some("en".into()),
            genres: vec!["horror".into()],
            ..Default::default()
        }
    }

    #[test]
    fn movie_input_accepts_a_plain_movie() {
        assert!(valid_movie().validate().is_ok());
    }

    #[test]
    fn movie_input_rejects_bad_fields() {
        let cases = [
            MovieInput { title: "  ".into(), ..valid_movie() },
            MovieInput { year: Some(1200), ..valid_movie() },
            MovieInput { price: Some(-10), ..valid_movie() },
            MovieInput { format: Some("bluray".into()), ..valid_movie() },
            MovieInput { title: "x".repeat(101), ..valid_movie() },
        ];
        for movie in cases {
            assert!(
                matches!(movie.validate(), Err(Error::Validation(_))),
                "{movie:?} should be rejected"
            );
        }
    }

    #[test]
    fn genre_names_are_trimmed_and_deduplicated() {
        let movie = MovieInput {
            genres: vec![" drama".into(), "crime".into(), "drama ".into(), "".into()],
            ..valid_movie()
        };
        assert_eq!(movie.genre_names(), vec!["crime", "drama"]);
    }

    #[test]
    fn movie_input_genres_default_to_none() {
        let movie: MovieInput = serde_json::from_str(r#"{"title": "Kopps"}"#).unwrap();
        assert!(movie.genres.is_empty());
        assert!(movie.year.is_none());
    }

    #[test]
    fn count_query_counts_grouped_movies() {
        let filter = MovieFilter {
            genre: Some("drama".into()),
            ..Default::default()
        };
        let search = filter.to_search(Some(8)).unwrap();
        let count = search.build_count_query();
        assert!(count.sql.starts_with("SELECT COUNT(*) AS count FROM (SELECT m.id"));
        assert!(count.sql.ends_with("WHERE g.name = $1 GROUP BY m.id) AS matched"));
        assert_eq!(count.params, search.build_filtered_query().params);
    }
}
