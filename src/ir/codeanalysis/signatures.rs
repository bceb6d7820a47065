//! Function signatures as the typing system sees them. A signature only
//! describes the callee side of a call: which parameter kinds it accepts
//! and what it returns. Argument generation from a signature is the code
//! generators' business, not ours.

use smallvec::SmallVec;

use super::types::{self, Type};

/// One parameter of a signature. Some callees take optional arguments and
/// some accept any number of trailing arguments; we wrap all that in this
/// enum the way the IL wraps method arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Plain(Type),
    Optional(Type),
    Rest(Type),
}

impl Param {
    /// The type the parameter variable has inside the callee. An optional
    /// parameter may not be supplied, so `undefined` joins the declared
    /// type. A rest parameter collects its arguments into an array-like
    /// object, so the binding is an object regardless of the element type.
    pub fn callee_type(&self) -> Type {
        match self {
            Param::Plain(t) => t.clone(),
            Param::Optional(t) => t.clone() | types::Undefined,
            Param::Rest(_) => types::Object,
        }
    }
}

/// A FunctionSignature holds all the call-shape data of a function value:
/// the parameter list and the return type.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    parameters: SmallVec<[Param; 4]>,
    return_type: Type,
}

impl FunctionSignature {
    pub fn new<P>(parameters: P, return_type: Type) -> Self
    where
        P: IntoIterator<Item = Param>,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            return_type,
        }
    }

    /// The signature of a callee that takes nothing: `[] => return_type`.
    pub fn returning(return_type: Type) -> Self {
        Self {
            parameters: SmallVec::new(),
            return_type,
        }
    }

    pub fn parameters(&self) -> &[Param] {
        &self.parameters
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Replace the return type, keeping the parameter list. Used when a
    /// class definition closes and the constructor's return type becomes
    /// the accumulated instance shape.
    pub fn with_return_type(&self, return_type: Type) -> Self {
        Self {
            parameters: self.parameters.clone(),
            return_type,
        }
    }
}
