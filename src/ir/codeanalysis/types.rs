#![allow(non_upper_case_globals)]

//! The type lattice of the typing system. A `Type` is a union value: a
//! bitset of primitive atoms plus at most one object shape. The lattice is
//! pure data with value equality, so types can be copied around and
//! compared without ever touching the typer state that produced them.

use std::collections::BTreeSet;
use std::ops::{Add, BitAnd, BitOr, BitOrAssign, Sub};

use bitflags::bitflags;

use super::signatures::FunctionSignature;

bitflags! {
    /// A bitflag of the primitive atoms that this typing system supports.
    /// The `Object` bit is special: it is set exactly when the `Type`
    /// carries a shape. `Unknown` means "no information, assume anything";
    /// it is a real lattice element so that it survives unions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PType: u16 {
        const Undefined = 1 << 0;
        const Null      = 1 << 1;
        const Boolean   = 1 << 2;
        const Integer   = 1 << 3;
        const Float     = 1 << 4;
        const String    = 1 << 5;
        const BigInt    = 1 << 6;
        const RegExp    = 1 << 7;
        const Iterable  = 1 << 8;
        const Object    = 1 << 9;
        const Unknown   = 1 << 10;

        const Number    = Self::Integer.bits() | Self::Float.bits();
        const Primitive = Self::Undefined.bits()
                        | Self::Null.bits()
                        | Self::Boolean.bits()
                        | Self::Integer.bits()
                        | Self::Float.bits()
                        | Self::String.bits();
    }
}

/// The structural description of an object: the properties and methods we
/// know it to have, an optional nominal group tag ("Array", "Map", ...)
/// that keys the environment's per-group tables, and optional call and
/// construct signatures. Presence of a call signature means the value is
/// callable as a function, presence of a construct signature that it can
/// be called with `new`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    group: Option<String>,
    properties: BTreeSet<String>,
    methods: BTreeSet<String>,
    call_signature: Option<Box<FunctionSignature>>,
    construct_signature: Option<Box<FunctionSignature>>,
}

const EMPTY_SHAPE: Shape = Shape {
    group: None,
    properties: BTreeSet::new(),
    methods: BTreeSet::new(),
    call_signature: None,
    construct_signature: None,
};

impl Shape {
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn properties(&self) -> &BTreeSet<String> {
        &self.properties
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    pub fn call_signature(&self) -> Option<&FunctionSignature> {
        self.call_signature.as_deref()
    }

    pub fn construct_signature(&self) -> Option<&FunctionSignature> {
        self.construct_signature.as_deref()
    }

    /// Does this shape satisfy everything `required` asks for? Properties
    /// and methods must be a superset; group and signatures must match
    /// whenever `required` pins them down.
    fn contains(&self, required: &Shape) -> bool {
        if !required.properties.is_subset(&self.properties) {
            return false;
        }
        if !required.methods.is_subset(&self.methods) {
            return false;
        }
        if required.group.is_some() && self.group != required.group {
            return false;
        }
        if required.call_signature.is_some()
            && self.call_signature != required.call_signature
        {
            return false;
        }
        if required.construct_signature.is_some()
            && self.construct_signature != required.construct_signature
        {
            return false;
        }
        true
    }

    /// The shape of "either of the two objects": only what both sides
    /// share survives, and tags that disagree are dropped.
    fn union(&self, other: &Shape) -> Shape {
        Shape {
            group: equal_or_dropped(&self.group, &other.group),
            properties: self
                .properties
                .intersection(&other.properties)
                .cloned()
                .collect(),
            methods: self.methods.intersection(&other.methods).cloned().collect(),
            call_signature: equal_or_dropped(
                &self.call_signature,
                &other.call_signature,
            ),
            construct_signature: equal_or_dropped(
                &self.construct_signature,
                &other.construct_signature,
            ),
        }
    }

    /// The shape of a value that is both objects at once: everything
    /// either side requires is combined.
    fn intersect(&self, other: &Shape) -> Shape {
        Shape {
            group: equal_or_dropped(&self.group, &other.group),
            properties: self.properties.union(&other.properties).cloned().collect(),
            methods: self.methods.union(&other.methods).cloned().collect(),
            call_signature: equal_or_dropped(
                &self.call_signature,
                &other.call_signature,
            ),
            construct_signature: equal_or_dropped(
                &self.construct_signature,
                &other.construct_signature,
            ),
        }
    }

    /// Like `intersect` for the member sets, but tags known on one side
    /// only are kept instead of dropped. This is the shape combinator of
    /// the `+` operator that assembles class values.
    fn merged(&self, other: &Shape) -> Shape {
        let group = match (&self.group, &other.group) {
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            (Some(_), Some(_)) => None,
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Shape {
            group,
            properties: self.properties.union(&other.properties).cloned().collect(),
            methods: self.methods.union(&other.methods).cloned().collect(),
            call_signature: self
                .call_signature
                .clone()
                .or_else(|| other.call_signature.clone()),
            construct_signature: self
                .construct_signature
                .clone()
                .or_else(|| other.construct_signature.clone()),
        }
    }
}

fn equal_or_dropped<T: Clone + PartialEq>(a: &Option<T>, b: &Option<T>) -> Option<T> {
    if a == b {
        a.clone()
    } else {
        None
    }
}

/// A `Type` in this typing system consists of a primitive bitset and an
/// optional object shape. Invariant: the `Object` bit of the bitset is set
/// exactly when the shape is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    ptype: PType,
    shape: Option<Shape>,
}

///
/// The canonical constants, each the singleton of its atom or shape.
///
pub const Nothing: Type = Type {
    ptype: PType::empty(),
    shape: None,
};
pub const Undefined: Type = Type::basic(PType::Undefined);
pub const Null: Type = Type::basic(PType::Null);
pub const Boolean: Type = Type::basic(PType::Boolean);
pub const Integer: Type = Type::basic(PType::Integer);
pub const Float: Type = Type::basic(PType::Float);
pub const Number: Type = Type::basic(PType::Number);
pub const String: Type = Type::basic(PType::String);
pub const BigInt: Type = Type::basic(PType::BigInt);
pub const RegExp: Type = Type::basic(PType::RegExp);
pub const Iterable: Type = Type::basic(PType::Iterable);
pub const Primitive: Type = Type::basic(PType::Primitive);
pub const Unknown: Type = Type::basic(PType::Unknown);
pub const Object: Type = Type {
    ptype: PType::Object,
    shape: Some(EMPTY_SHAPE),
};
pub const Anything: Type = Type {
    ptype: PType::all(),
    shape: Some(EMPTY_SHAPE),
};

impl Type {
    /// Create a basic or primitive type: no shape, only a bitset.
    pub const fn basic(ptype: PType) -> Self {
        Self { ptype, shape: None }
    }

    /// An object with the given known properties, methods and group.
    pub fn object_with<'a, P, M>(properties: P, methods: M, group: Option<&str>) -> Self
    where
        P: IntoIterator<Item = &'a str>,
        M: IntoIterator<Item = &'a str>,
    {
        Self {
            ptype: PType::Object,
            shape: Some(Shape {
                group: group.map(str::to_string),
                properties: properties.into_iter().map(str::to_string).collect(),
                methods: methods.into_iter().map(str::to_string).collect(),
                call_signature: None,
                construct_signature: None,
            }),
        }
    }

    /// A value callable as a function with the given signature.
    pub fn function(signature: FunctionSignature) -> Self {
        Self {
            ptype: PType::Object,
            shape: Some(Shape {
                call_signature: Some(Box::new(signature)),
                ..EMPTY_SHAPE
            }),
        }
    }

    /// A value callable with `new` with the given signature.
    pub fn constructor(signature: FunctionSignature) -> Self {
        Self {
            ptype: PType::Object,
            shape: Some(Shape {
                construct_signature: Some(Box::new(signature)),
                ..EMPTY_SHAPE
            }),
        }
    }

    /// A value callable both ways, as plain JS `function`s are.
    pub fn function_and_constructor(signature: FunctionSignature) -> Self {
        Self {
            ptype: PType::Object,
            shape: Some(Shape {
                call_signature: Some(Box::new(signature.clone())),
                construct_signature: Some(Box::new(signature)),
                ..EMPTY_SHAPE
            }),
        }
    }

    pub fn ptype(&self) -> PType {
        self.ptype
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn group(&self) -> Option<&str> {
        self.shape.as_ref().and_then(Shape::group)
    }

    pub fn call_signature(&self) -> Option<&FunctionSignature> {
        self.shape.as_ref().and_then(Shape::call_signature)
    }

    pub fn construct_signature(&self) -> Option<&FunctionSignature> {
        self.shape.as_ref().and_then(Shape::construct_signature)
    }

    pub fn is_object(&self) -> bool {
        self.ptype.contains(PType::Object)
    }

    /// Strictly the "no information" type, not merely a union that happens
    /// to contain the `Unknown` atom. The environment signals a miss by
    /// returning exactly this.
    pub fn is_unknown(&self) -> bool {
        *self == Unknown
    }

    pub fn is_nothing(&self) -> bool {
        self.ptype.is_empty() && self.shape.is_none()
    }

    /// `self ⊆ other`: every value of `self` is also a value of `other`.
    pub fn is(&self, other: &Type) -> bool {
        if !other.ptype.contains(self.ptype) {
            return false;
        }
        match (&self.shape, &other.shape) {
            (_, None) => true,
            (Some(a), Some(b)) => a.contains(b),
            (None, Some(_)) => true,
        }
    }

    /// `self ∩ other ≠ ∅`: a value could satisfy both at once.
    pub fn may_be(&self, other: &Type) -> bool {
        !self.intersect(other).is_nothing()
    }

    /// The lattice join: a value of the union is a value of either side.
    pub fn union(&self, other: &Type) -> Type {
        let shape = match (&self.shape, &other.shape) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Type {
            ptype: self.ptype | other.ptype,
            shape,
        }
    }

    /// The lattice meet: only what both sides admit.
    pub fn intersect(&self, other: &Type) -> Type {
        let shape = match (&self.shape, &other.shape) {
            (Some(a), Some(b)) => Some(a.intersect(b)),
            _ => None,
        };
        Type {
            ptype: self.ptype & other.ptype,
            shape,
        }
    }

    /// Remove `other` from this union. The shape only disappears when
    /// `other` covers it with an equal-or-wider object shape; subtracting
    /// a narrower object leaves the shape untouched.
    pub fn subtract(&self, other: &Type) -> Type {
        let mut ptype = self.ptype & !other.ptype;
        let shape = match (&self.shape, &other.shape) {
            (Some(a), Some(b)) if a.contains(b) => None,
            (Some(a), _) => {
                ptype |= PType::Object;
                Some(a.clone())
            }
            (None, _) => None,
        };
        Type { ptype, shape }
    }

    /// The "is both at once" combinator: unlike `union`, member sets are
    /// combined rather than intersected and signatures are taken from
    /// either side. `constructor(sig) + object_with(statics)` is a class
    /// value that is constructable AND carries the static members.
    pub fn merging(&self, other: &Type) -> Type {
        let shape = match (&self.shape, &other.shape) {
            (Some(a), Some(b)) => Some(a.merged(b)),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Type {
            ptype: self.ptype | other.ptype,
            shape,
        }
    }

    /// A copy of this type whose shape also carries `name` as a property.
    /// A shape is materialized if the type had none.
    pub fn adding_property(&self, name: &str) -> Type {
        let mut shape = self.shape.clone().unwrap_or(EMPTY_SHAPE);
        shape.properties.insert(name.to_string());
        Type {
            ptype: self.ptype | PType::Object,
            shape: Some(shape),
        }
    }

    /// A copy of this type without `name` in its property set.
    pub fn removing_property(&self, name: &str) -> Type {
        match &self.shape {
            Some(shape) => {
                let mut shape = shape.clone();
                shape.properties.remove(name);
                Type {
                    ptype: self.ptype,
                    shape: Some(shape),
                }
            }
            None => self.clone(),
        }
    }

    /// A copy of this type whose shape also carries `name` as a method.
    pub fn adding_method(&self, name: &str) -> Type {
        let mut shape = self.shape.clone().unwrap_or(EMPTY_SHAPE);
        shape.methods.insert(name.to_string());
        Type {
            ptype: self.ptype | PType::Object,
            shape: Some(shape),
        }
    }
}

impl BitOr for Type {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(&rhs)
    }
}

impl BitOrAssign for Type {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(&rhs);
    }
}

impl BitAnd for Type {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersect(&rhs)
    }
}

impl Sub for Type {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.subtract(&rhs)
    }
}

impl Add for Type {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merging(&rhs)
    }
}

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////
