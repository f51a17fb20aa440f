// Markup parsing for page-content checks.

pub mod page_parser;

pub use page_parser::PageSnapshot;
