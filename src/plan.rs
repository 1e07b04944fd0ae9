//! Type plans: how records are encoded, decoded and checked for emptiness.
//!
//! A record describes its fields once through [`Record::describe`] (usually
//! generated by [`crate::record!`]). [`plan_for`] turns that description into
//! a [`Plan`]: embedded records are flattened, wire names resolved and tags
//! parsed. Plans are cached process-wide and never evicted.

mod cache;
mod fields;
mod tag;

pub use cache::plan_for;
pub use fields::{FieldPlan, Fields};
pub use tag::KeyRole;

use crate::{
    Error, Result,
    attribute::{AttributeValue, Flags, Item, Shape},
};

use indexmap::IndexMap;
use std::collections;

/// A decoder registered with [`Fields::decoder`].
pub type DecodeFn<S> = fn(&mut S, &AttributeValue) -> Result<()>;

/// A type that encodes as an item, field by field.
pub trait Record: Sized + Default + Send + Sync + 'static {
    /// Declares the fields of the record, in order.
    fn describe(fields: &mut Fields<Self>);
}

/// The decoder picked by [`Plan::decoder_for`].
pub enum Decoder<'p, S> {
    /// `NULL`: zero the destination.
    Zero,
    /// `M`: walk the fields of the plan.
    Fields(&'p Plan<S>),
    /// A decoder registered by the record.
    Custom(DecodeFn<S>),
}

impl<S: Record> Decoder<'_, S> {
    /// Decodes `value` into `record`.
    pub fn decode(&self, record: &mut S, value: &AttributeValue) -> Result<()> {
        match self {
            Self::Zero => {
                *record = S::default();
                Ok(())
            }
            Self::Fields(plan) => match value {
                AttributeValue::M(item) => plan.decode_item(record, item),
                _ => Err(Error::cannot_unmarshal::<S>(value)),
            },
            Self::Custom(decode) => decode(record, value),
        }
    }
}

/// The encode/decode plan of a record type.
pub struct Plan<S> {
    fields: IndexMap<String, FieldPlan<S>>,
    decoders: collections::HashMap<Shape, DecodeFn<S>>,
    empty_when: Option<fn(&S) -> bool>,
}

impl<S: Record> Plan<S> {
    fn synthesize() -> Self {
        let mut description = Fields::new(Vec::new());
        S::describe(&mut description);
        let decoders = description.decoders.drain(..).collect();
        let empty_when = description.empty_when;
        let candidates = description.into_candidates();

        // shallowest wins, then first declared
        let mut winners: collections::HashMap<&str, usize> = collections::HashMap::new();
        for (position, field) in candidates.iter().enumerate() {
            winners
                .entry(field.name())
                .and_modify(|winner| {
                    if field.depth() < candidates[*winner].depth() {
                        *winner = position;
                    }
                })
                .or_insert(position);
        }
        let winners: collections::HashSet<usize> = winners.into_values().collect();
        let fields: IndexMap<_, _> = candidates
            .into_iter()
            .enumerate()
            .filter(|(position, _)| winners.contains(position))
            .map(|(_, field)| (field.name().to_string(), field))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            record = std::any::type_name::<S>(),
            fields = fields.len(),
            "synthesized type plan",
        );

        Self {
            fields,
            decoders,
            empty_when,
        }
    }

    /// The fields in declaration order, embedded ones flattened in place.
    pub fn fields(&self) -> impl Iterator<Item = &FieldPlan<S>> {
        self.fields.values()
    }

    /// The field with wire name `name`.
    pub fn field(&self, name: &str) -> Option<&FieldPlan<S>> {
        self.fields.get(name)
    }

    /// The field tagged `hash`.
    pub fn hash_key(&self) -> Option<&FieldPlan<S>> {
        self.key(KeyRole::Hash)
    }

    /// The field tagged `range`.
    pub fn range_key(&self) -> Option<&FieldPlan<S>> {
        self.key(KeyRole::Range)
    }

    fn key(&self, role: KeyRole) -> Option<&FieldPlan<S>> {
        self.fields().find(|field| field.key_role() == Some(role))
    }

    /// Encodes `record` into an item.
    pub fn encode_item(&self, record: &S) -> Result<Item> {
        let mut item = Item::with_capacity(self.fields.len());
        for (name, field) in &self.fields {
            let value = field
                .encode(record)
                .map_err(|err| err.in_attribute(name))?;
            if let Some(value) = value {
                item.insert(name.clone(), value);
            }
        }
        Ok(item)
    }

    /// Encodes `record` as a map attribute; a record with no attributes is
    /// treated like an empty map.
    pub fn encode_value(&self, record: &S, flags: Flags) -> Result<Option<AttributeValue>> {
        let item = self.encode_item(record)?;
        if item.is_empty() && !flags.contains(Flags::ALLOW_EMPTY) {
            return Ok(flags.empty_value());
        }
        Ok(Some(AttributeValue::M(item)))
    }

    /// Picks the decoder for `shape`: the record's own, then the built-in
    /// one, then the record's wildcard.
    pub fn decoder_for(&self, shape: Shape) -> Option<Decoder<'_, S>> {
        if shape == Shape::Null {
            return Some(Decoder::Zero);
        }
        if let Some(decode) = self.decoders.get(&shape) {
            return Some(Decoder::Custom(*decode));
        }
        if shape == Shape::M {
            return Some(Decoder::Fields(self));
        }
        self.decoders.get(&Shape::Any).copied().map(Decoder::Custom)
    }

    /// Decodes `value` into `record`.
    pub fn decode(&self, record: &mut S, value: &AttributeValue) -> Result<()> {
        let decoder = Shape::of(value).and_then(|shape| self.decoder_for(shape));
        match decoder {
            Some(decoder) => decoder.decode(record, value),
            None => Err(Error::cannot_unmarshal::<S>(value)),
        }
    }

    /// Decodes `item` into `record`; fields missing from `item` are zeroed.
    pub fn decode_item(&self, record: &mut S, item: &Item) -> Result<()> {
        for (name, field) in &self.fields {
            match item.get(name) {
                Some(value) => field
                    .decode(record, value)
                    .map_err(|err| err.in_attribute(name))?,
                None => field.zero(record),
            }
        }
        Ok(())
    }

    /// Whether `record` counts as empty: every field is.
    pub fn is_empty(&self, record: &S) -> bool {
        match self.empty_when {
            Some(is_empty) => is_empty(record),
            None => self.fields().all(|field| field.is_empty(record)),
        }
    }
}
