//! The typing environment: an external oracle that knows the types of
//! named builtins, the properties and method signatures of object groups,
//! and the concrete types to use for primitive constants. The typer only
//! ever talks to the trait; a real JS host model lives elsewhere.

use rustc_hash::FxHashMap;

use super::signatures::FunctionSignature;
use super::types::{self, Type};

/// The oracle interface. Queries must be pure for the duration of a run:
/// the typer may ask the same question any number of times and expects the
/// same answer. Mutating the environment between instructions is fine, the
/// typer simply observes the new answers from then on.
pub trait TypeEnvironment {
    /// The type of the named builtin, `Unknown` if the environment has
    /// never heard of it.
    fn type_of_builtin(&self, _name: &str) -> Type {
        types::Unknown
    }

    /// The type of the named property: on the given group when `group` is
    /// `Some`, from the environment's global property table when `None`.
    /// `Unknown` on a miss.
    fn type_of_property(&self, _name: &str, _group: Option<&str>) -> Type {
        types::Unknown
    }

    /// The signature of the named method, with the same group/global split
    /// as `type_of_property`. `None` on a miss.
    fn signature_of_method(
        &self,
        _name: &str,
        _group: Option<&str>,
    ) -> Option<FunctionSignature> {
        None
    }

    /// The types produced by primitive constant operations. Hosts override
    /// these to hand out richer types (e.g. a grouped `String` object).
    fn int_type(&self) -> Type {
        types::Integer
    }

    fn float_type(&self) -> Type {
        types::Float
    }

    fn boolean_type(&self) -> Type {
        types::Boolean
    }

    fn string_type(&self) -> Type {
        types::String
    }

    fn bigint_type(&self) -> Type {
        types::BigInt
    }

    fn regexp_type(&self) -> Type {
        types::RegExp
    }

    /// The type of array literals. Array-like: iterable and an object.
    fn array_type(&self) -> Type {
        types::Iterable + types::Object
    }
}

/// A map-backed environment. Tests and hosts seed it through the
/// `register_*` calls; everything not registered is unknown.
pub struct StubEnvironment {
    builtins: FxHashMap<String, Type>,
    global_properties: FxHashMap<String, Type>,
    group_properties: FxHashMap<String, FxHashMap<String, Type>>,
    global_methods: FxHashMap<String, FunctionSignature>,
    group_methods: FxHashMap<String, FxHashMap<String, FunctionSignature>>,
    int_type: Type,
    float_type: Type,
    boolean_type: Type,
    string_type: Type,
    bigint_type: Type,
    regexp_type: Type,
    array_type: Type,
}

impl StubEnvironment {
    pub fn new() -> Self {
        Self {
            builtins: FxHashMap::default(),
            global_properties: FxHashMap::default(),
            group_properties: FxHashMap::default(),
            global_methods: FxHashMap::default(),
            group_methods: FxHashMap::default(),
            int_type: types::Integer,
            float_type: types::Float,
            boolean_type: types::Boolean,
            string_type: types::String,
            bigint_type: types::BigInt,
            regexp_type: types::RegExp,
            array_type: types::Iterable + types::Object,
        }
    }

    pub fn register_builtin(&mut self, name: &str, btype: Type) {
        self.builtins.insert(name.to_string(), btype);
    }

    /// Register a property type, on a group or globally.
    pub fn register_property(&mut self, group: Option<&str>, name: &str, ptype: Type) {
        match group {
            Some(group) => {
                self.group_properties
                    .entry(group.to_string())
                    .or_default()
                    .insert(name.to_string(), ptype);
            }
            None => {
                self.global_properties.insert(name.to_string(), ptype);
            }
        }
    }

    /// Register a method signature, on a group or globally.
    pub fn register_method(
        &mut self,
        group: Option<&str>,
        name: &str,
        signature: FunctionSignature,
    ) {
        match group {
            Some(group) => {
                self.group_methods
                    .entry(group.to_string())
                    .or_default()
                    .insert(name.to_string(), signature);
            }
            None => {
                self.global_methods.insert(name.to_string(), signature);
            }
        }
    }

    pub fn set_int_type(&mut self, t: Type) {
        self.int_type = t;
    }

    pub fn set_float_type(&mut self, t: Type) {
        self.float_type = t;
    }

    pub fn set_boolean_type(&mut self, t: Type) {
        self.boolean_type = t;
    }

    pub fn set_string_type(&mut self, t: Type) {
        self.string_type = t;
    }

    pub fn set_bigint_type(&mut self, t: Type) {
        self.bigint_type = t;
    }

    pub fn set_regexp_type(&mut self, t: Type) {
        self.regexp_type = t;
    }

    pub fn set_array_type(&mut self, t: Type) {
        self.array_type = t;
    }
}

impl Default for StubEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnvironment for StubEnvironment {
    fn type_of_builtin(&self, name: &str) -> Type {
        self.builtins.get(name).cloned().unwrap_or(types::Unknown)
    }

    fn type_of_property(&self, name: &str, group: Option<&str>) -> Type {
        let table = match group {
            Some(group) => match self.group_properties.get(group) {
                Some(table) => table,
                None => return types::Unknown,
            },
            None => &self.global_properties,
        };
        table.get(name).cloned().unwrap_or(types::Unknown)
    }

    fn signature_of_method(
        &self,
        name: &str,
        group: Option<&str>,
    ) -> Option<FunctionSignature> {
        let table = match group {
            Some(group) => self.group_methods.get(group)?,
            None => &self.global_methods,
        };
        table.get(name).cloned()
    }

    fn int_type(&self) -> Type {
        self.int_type.clone()
    }

    fn float_type(&self) -> Type {
        self.float_type.clone()
    }

    fn boolean_type(&self) -> Type {
        self.boolean_type.clone()
    }

    fn string_type(&self) -> Type {
        self.string_type.clone()
    }

    fn bigint_type(&self) -> Type {
        self.bigint_type.clone()
    }

    fn regexp_type(&self) -> Type {
        self.regexp_type.clone()
    }

    fn array_type(&self) -> Type {
        self.array_type.clone()
    }
}

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////
