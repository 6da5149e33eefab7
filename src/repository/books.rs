//! Books repository: catalog search and librarian CRUD

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookInput, BookQuery},
        page_offset, PAGE_SIZE,
    },
};

pub(crate) const BOOK_COLUMNS: &str = "id, title, author, publisher, publication_date, price, \
     isbn, category_id, description, quantity";

/// Wrap a needle for ILIKE, escaping the pattern metacharacters
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append the search predicate. Every supplied filter is ANDed.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    qb.push(" WHERE TRUE");

    // column names come from a fixed set in BookQuery::text_filters
    for (column, needle) in query.text_filters() {
        qb.push(" AND ");
        qb.push(column);
        qb.push(" ILIKE ");
        qb.push_bind(like_pattern(needle));
    }

    if let Some(category) = query.category {
        qb.push(" AND category_id = ");
        qb.push_bind(category);
    }
}

fn count_query(query: &BookQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM books");
    push_filters(&mut qb, query);
    qb
}

fn page_query(query: &BookQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
    push_filters(&mut qb, query);
    qb.push(" ORDER BY title, id LIMIT ");
    qb.push_bind(PAGE_SIZE);
    qb.push(" OFFSET ");
    qb.push_bind(page_offset(query.page));
    qb
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books, returning one page and the total match count
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = count_query(query)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let books = page_query(query)
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Create a new book
    pub async fn create(&self, book: &BookInput) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, publisher, publication_date, price,
                               isbn, category_id, description, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.price)
        .bind(&book.isbn)
        .bind(book.category_id)
        .bind(&book.description)
        .bind(book.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Replace all editable fields of a book
    pub async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $1, author = $2, publisher = $3, publication_date = $4, price = $5,
                isbn = $6, category_id = $7, description = $8, quantity = $9
            WHERE id = $10
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_date)
        .bind(book.price)
        .bind(&book.isbn)
        .bind(book.category_id)
        .bind(&book.description)
        .bind(book.quantity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book (its borrow records go with it)
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("swift"), "%swift%");
        assert_eq!(like_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[test]
    fn no_parameters_means_no_constraint() {
        let qb = count_query(&BookQuery::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM books WHERE TRUE");
    }

    #[test]
    fn supplied_fields_are_conjoined() {
        let query = BookQuery {
            title: Some("adventures".into()),
            author: Some("twain".into()),
            isbn: Some(" ".into()),
            category: Some(4),
            ..Default::default()
        };
        let qb = count_query(&query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM books WHERE TRUE AND title ILIKE $1 AND author ILIKE $2 AND category_id = $3"
        );
    }

    #[test]
    fn page_query_is_ordered_and_bounded() {
        let query = BookQuery {
            q: Some("tom".into()),
            page: Some(2),
            ..Default::default()
        };
        let qb = page_query(&query);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM books WHERE TRUE AND title ILIKE $1 ORDER BY title, id LIMIT $2 OFFSET $3",
                BOOK_COLUMNS
            )
        );
    }
}
