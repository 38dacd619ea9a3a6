use crate::{
    model::Id,
    util::{nullable_patch, required_patch},
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ShopMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Shop {
    pub id: Id<ShopMarker>,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub map_url: Option<String>,
    pub reservation_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct NewShop {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub map_url: Option<String>,
    #[serde(default)]
    pub reservation_url: Option<String>,
}

/// Partial shop update. Fields left out of the request stay untouched; optional
/// fields sent as `null` are cleared.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct ShopUpdate {
    #[serde(default, deserialize_with = "required_patch")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable_patch")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_patch")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_patch")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_patch")]
    pub map_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_patch")]
    pub reservation_url: Option<Option<String>>,
}

impl Shop {
    #[must_use]
    pub fn from_new(id: Id<ShopMarker>, shop: NewShop) -> Self {
        Self {
            id,
            name: shop.name,
            description: shop.description,
            location: shop.location,
            category: shop.category,
            map_url: shop.map_url,
            reservation_url: shop.reservation_url,
        }
    }
}

impl ShopUpdate {
    pub fn apply(self, shop: &mut Shop) {
        fn overwrite<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        overwrite(&mut shop.name, self.name);
        overwrite(&mut shop.description, self.description);
        overwrite(&mut shop.location, self.location);
        overwrite(&mut shop.category, self.category);
        overwrite(&mut shop.map_url, self.map_url);
        overwrite(&mut shop.reservation_url, self.reservation_url);
    }
}
