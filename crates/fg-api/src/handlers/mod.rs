pub mod fit;
pub mod fits;
pub mod health;
pub mod search;

use fg_common::{Catalog, Item};

/// Catalog entry for `id`, if the catalog knows it.
pub(crate) fn catalog_item(catalog: &Catalog, id: i32) -> Option<Item> {
    catalog.item(id).map(Item::from)
}
