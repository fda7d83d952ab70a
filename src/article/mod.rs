//! Persisted articles.

pub mod repository;
pub mod types;

pub use repository::ArticleRepository;
pub use types::{Article, NewArticle, ReadFilter};
