pub mod cache_page;

pub use cache_page::cache_page_middleware;
