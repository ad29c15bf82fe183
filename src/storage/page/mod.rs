//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageType`] - Tag byte discriminating node formats

#[allow(clippy::module_inception)]
mod page;
mod page_type;

pub use page::Page;
pub use page_type::PageType;
