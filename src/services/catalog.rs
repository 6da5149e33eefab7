//! Catalog management service: book search, books and categories

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookInput, BookQuery},
        category::{Category, CategoryInput},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, input: BookInput) -> AppResult<Book> {
        self.check_book(&input).await?;
        let book = self.repository.books.create(&input).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, input: BookInput) -> AppResult<Book> {
        self.check_book(&input).await?;
        let book = self.repository.books.update(id, &input).await?;
        tracing::info!(book_id = book.id, quantity = book.quantity, "Book updated");
        Ok(book)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    async fn check_book(&self, input: &BookInput) -> AppResult<()> {
        input.validate()?;
        input.check_price().map_err(AppError::Validation)?;

        if let Some(category_id) = input.category_id {
            if !self.repository.categories.exists(category_id).await? {
                return Err(AppError::Validation(format!("Unknown category {}", category_id)));
            }
        }
        Ok(())
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        let name = self.check_category(&input, None).await?;
        self.repository.categories.create(&name).await
    }

    pub async fn rename_category(&self, id: i32, input: CategoryInput) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await?;
        let name = self.check_category(&input, Some(id)).await?;
        self.repository.categories.rename(id, &name).await
    }

    /// Books of the category are kept and left without a category
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.delete(id).await?;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }

    async fn check_category(&self, input: &CategoryInput, exclude_id: Option<i32>) -> AppResult<String> {
        input.validate()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Category name cannot be blank".to_string()));
        }
        if self.repository.categories.name_exists(&name, exclude_id).await? {
            return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
        }
        Ok(name)
    }
}
