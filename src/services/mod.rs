pub mod businesses;
pub mod directory;
pub mod favorites;
pub mod location;
pub mod profiles;

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::Business;

pub use businesses::BusinessService;
pub use directory::DirectoryService;
pub use favorites::FavoritesService;
pub use location::LocationResolver;
pub use profiles::ProfileService;

/// Identifiers arrive as opaque strings; anything that is not a UUID cannot exist.
pub(crate) fn parse_business_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Reorders a batched read to follow `ids`, dropping ids with no record.
pub(crate) fn order_by_ids(ids: &[Uuid], businesses: Vec<Business>) -> Vec<Business> {
    let mut by_id: HashMap<Uuid, Business> = businesses.into_iter().map(|b| (b.id, b)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
