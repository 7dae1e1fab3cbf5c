//! Per-channel available quantities.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// Available quantity per sales channel.
///
/// Serialized as a JSON object keyed by the decimal channel id, e.g.
/// `{"1": 5.5, "2": 0.0}`. Quantities are never negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelQuantities(BTreeMap<ChannelId, f64>);

impl ChannelQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map with a zero entry for every channel.
    pub fn zeroed(channels: &[ChannelId]) -> Self {
        Self(channels.iter().map(|c| (*c, 0.0)).collect())
    }

    /// Set the quantity for a channel; negative and NaN values become zero.
    pub fn insert(&mut self, channel: ChannelId, quantity: f64) {
        self.0.insert(channel, clamp(quantity));
    }

    pub fn get(&self, channel: ChannelId) -> Option<f64> {
        self.0.get(&channel).copied()
    }

    /// Add `other` channel by channel.
    pub fn accumulate(&mut self, other: &ChannelQuantities) {
        for (channel, quantity) in &other.0 {
            *self.0.entry(*channel).or_insert(0.0) += quantity;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, f64)> + '_ {
        self.0.iter().map(|(c, q)| (*c, *q))
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum over the whole iterator.
    pub fn sum<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a ChannelQuantities>,
    {
        let mut total = Self::new();
        for item in items {
            total.accumulate(item);
        }
        total
    }
}

fn clamp(quantity: f64) -> f64 {
    if quantity.is_nan() || quantity < 0.0 {
        0.0
    } else {
        quantity
    }
}

impl FromIterator<(ChannelId, f64)> for ChannelQuantities {
    fn from_iter<I: IntoIterator<Item = (ChannelId, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (channel, quantity) in iter {
            map.insert(channel, quantity);
        }
        map
    }
}

impl Serialize for ChannelQuantities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (channel, quantity) in &self.0 {
            map.serialize_entry(&channel.to_string(), quantity)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChannelQuantities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantitiesVisitor;

        impl<'de> Visitor<'de> for QuantitiesVisitor {
            type Value = ChannelQuantities;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping channel ids to quantities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut quantities = ChannelQuantities::new();
                while let Some((key, quantity)) = access.next_entry::<String, f64>()? {
                    let channel = key
                        .parse::<ChannelId>()
                        .map_err(|_| de::Error::custom(format!("invalid channel id '{}'", key)))?;
                    quantities.insert(channel, quantity);
                }
                Ok(quantities)
            }
        }

        deserializer.deserialize_map(QuantitiesVisitor)
    }
}
