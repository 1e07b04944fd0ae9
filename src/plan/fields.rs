use super::{
    DecodeFn, Record,
    tag::{KeyRole, Tag},
};
use crate::{
    Result,
    attribute::{AttributeValue, Flags, Shape},
    codec::{Marshal, Unmarshal},
};

use aws_sdk_dynamodb::types::ScalarAttributeType;
use std::{any, mem};

type EncodeClosure<S> = Box<dyn Fn(&S, Flags) -> Result<Option<AttributeValue>> + Send + Sync>;
type DecodeClosure<S> = Box<dyn Fn(&mut S, &AttributeValue) -> Result<()> + Send + Sync>;
type ZeroClosure<S> = Box<dyn Fn(&mut S) + Send + Sync>;
type EmptyClosure<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;

/// How one field of a record is encoded, decoded and zeroed.
///
/// Fields of embedded records are flattened into their parent: their
/// closures reach through the embedding chain recorded in [`FieldPlan::index`].
pub struct FieldPlan<S> {
    name: String,
    ident: &'static str,
    index: Vec<usize>,
    flags: Flags,
    key: Option<KeyRole>,
    key_type: Option<ScalarAttributeType>,
    encode: EncodeClosure<S>,
    decode: DecodeClosure<S>,
    zero: ZeroClosure<S>,
    is_empty: EmptyClosure<S>,
}

impl<S> FieldPlan<S> {
    /// The attribute name on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Rust identifier the field was declared with.
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// Declaration positions from the outermost record down to the field.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Number of embedded records between the outermost record and the field.
    pub fn depth(&self) -> usize {
        self.index.len() - 1
    }

    /// Flags from the field tag.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The primary key role from the field tag.
    pub fn key_role(&self) -> Option<KeyRole> {
        self.key
    }

    /// The key attribute type of the field's value type, if it can be a key.
    pub fn key_type(&self) -> Option<ScalarAttributeType> {
        self.key_type.clone()
    }

    /// Encodes the field of `record`. `Ok(None)` leaves the attribute out.
    pub fn encode(&self, record: &S) -> Result<Option<AttributeValue>> {
        if self.flags.contains(Flags::OMIT_EMPTY) && (self.is_empty)(record) {
            return Ok(None);
        }
        (self.encode)(record, self.flags)
    }

    /// Decodes `value` into the field of `record`.
    pub fn decode(&self, record: &mut S, value: &AttributeValue) -> Result<()> {
        (self.decode)(record, value)
    }

    /// Resets the field of `record` to its zero value.
    pub fn zero(&self, record: &mut S) {
        (self.zero)(record)
    }

    /// Whether the field of `record` is empty.
    pub fn is_empty(&self, record: &S) -> bool {
        (self.is_empty)(record)
    }

    fn project<P>(self, position: usize, projection: Projection<P, S>) -> FieldPlan<P>
    where
        S: Default + 'static,
        P: 'static,
    {
        let Self {
            name,
            ident,
            mut index,
            flags,
            key,
            key_type,
            encode,
            decode,
            zero,
            is_empty,
        } = self;
        index.insert(0, position);
        FieldPlan {
            name,
            ident,
            index,
            flags,
            key,
            key_type,
            encode: Box::new(move |outer: &P, flags: Flags| match projection.get(outer) {
                Some(inner) => encode(inner, flags),
                None => Ok(None),
            }),
            decode: Box::new(move |outer: &mut P, value: &AttributeValue| {
                decode(projection.get_mut_alloc(outer), value)
            }),
            zero: Box::new(move |outer: &mut P| {
                if let Some(inner) = projection.get_mut(outer) {
                    zero(inner);
                }
            }),
            is_empty: Box::new(move |outer: &P| {
                projection.get(outer).is_none_or(|inner| is_empty(inner))
            }),
        }
    }
}

/// Access from an outer record to an embedded one.
enum Projection<S, E> {
    Direct {
        get: fn(&S) -> &E,
        get_mut: fn(&mut S) -> &mut E,
    },
    Boxed {
        get: fn(&S) -> Option<&E>,
        get_mut: fn(&mut S) -> &mut Option<Box<E>>,
    },
}

impl<S, E> Clone for Projection<S, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, E> Copy for Projection<S, E> {}

impl<S, E: Default> Projection<S, E> {
    fn get<'a>(&self, outer: &'a S) -> Option<&'a E> {
        match self {
            Self::Direct { get, .. } => Some(get(outer)),
            Self::Boxed { get, .. } => get(outer),
        }
    }

    fn get_mut<'a>(&self, outer: &'a mut S) -> Option<&'a mut E> {
        match self {
            Self::Direct { get_mut, .. } => Some(get_mut(outer)),
            Self::Boxed { get_mut, .. } => get_mut(outer).as_deref_mut(),
        }
    }

    fn get_mut_alloc<'a>(&self, outer: &'a mut S) -> &'a mut E {
        match self {
            Self::Direct { get_mut, .. } => get_mut(outer),
            Self::Boxed { get_mut, .. } => &mut **get_mut(outer).get_or_insert_with(Box::default),
        }
    }
}

/// Collects the field descriptions of a record; see [`Record::describe`].
pub struct Fields<S> {
    candidates: Vec<FieldPlan<S>>,
    position: usize,
    visiting: Vec<any::TypeId>,
    pub(super) decoders: Vec<(Shape, DecodeFn<S>)>,
    pub(super) empty_when: Option<fn(&S) -> bool>,
}

impl<S: Record> Fields<S> {
    pub(super) fn new(mut visiting: Vec<any::TypeId>) -> Self {
        visiting.push(any::TypeId::of::<S>());
        Self {
            candidates: Vec::new(),
            position: 0,
            visiting,
            decoders: Vec::new(),
            empty_when: None,
        }
    }

    /// Declares a field. `tag` is `name[,flag...]`; an empty name uses
    /// `ident`, and `-` skips the field.
    pub fn field<T>(
        &mut self,
        ident: &'static str,
        tag: &str,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> &mut Self
    where
        T: Marshal + Unmarshal + 'static,
    {
        let position = self.next_position();
        let Some(Tag { name, flags, key }) = Tag::parse(ident, tag) else {
            return self;
        };
        self.candidates.push(FieldPlan {
            name,
            ident,
            index: vec![position],
            flags,
            key,
            key_type: T::key_type(),
            encode: Box::new(move |record: &S, flags: Flags| get(record).marshal(flags)),
            decode: Box::new(move |record: &mut S, value: &AttributeValue| {
                get_mut(record).unmarshal(value)
            }),
            zero: Box::new(move |record: &mut S| get_mut(record).zero()),
            is_empty: Box::new(move |record: &S| get(record).is_empty_value()),
        });
        self
    }

    /// Declares an embedded record whose fields are flattened into this one.
    pub fn embed<E: Record>(
        &mut self,
        ident: &'static str,
        get: fn(&S) -> &E,
        get_mut: fn(&mut S) -> &mut E,
    ) -> &mut Self {
        self.flatten(ident, Projection::Direct { get, get_mut })
    }

    /// Declares an embedded record behind a box. It is skipped on encode when
    /// absent and allocated on decode when one of its attributes is present.
    pub fn embed_boxed<E: Record>(
        &mut self,
        ident: &'static str,
        get: fn(&S) -> Option<&E>,
        get_mut: fn(&mut S) -> &mut Option<Box<E>>,
    ) -> &mut Self {
        self.flatten(ident, Projection::Boxed { get, get_mut })
    }

    /// Registers a decoder for attribute values of `shape`, tried before the
    /// built-in map decoder. [`Shape::Any`] catches every shape without one.
    pub fn decoder(&mut self, shape: Shape, decode: DecodeFn<S>) -> &mut Self {
        self.decoders.push((shape, decode));
        self
    }

    /// Overrides how emptiness of the whole record is decided.
    pub fn empty_when(&mut self, is_empty: fn(&S) -> bool) -> &mut Self {
        self.empty_when = Some(is_empty);
        self
    }

    fn next_position(&mut self) -> usize {
        let position = self.position;
        self.position += 1;
        position
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn flatten<E: Record>(
        &mut self,
        ident: &'static str,
        projection: Projection<S, E>,
    ) -> &mut Self {
        let position = self.next_position();
        if self.visiting.contains(&any::TypeId::of::<E>()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                record = any::type_name::<S>(),
                embedded = any::type_name::<E>(),
                field = ident,
                "skipping recursive embedding",
            );
            return self;
        }
        let mut inner = Fields::<E>::new(mem::take(&mut self.visiting));
        E::describe(&mut inner);
        inner.visiting.pop();
        self.visiting = mem::take(&mut inner.visiting);
        self.candidates.extend(
            inner
                .candidates
                .into_iter()
                .map(|field| field.project(position, projection)),
        );
        self
    }

    pub(super) fn into_candidates(self) -> Vec<FieldPlan<S>> {
        self.candidates
    }
}
