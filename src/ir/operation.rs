use std::any::Any;

use bitflags::bitflags;

use super::codeanalysis::signatures::FunctionSignature;
use super::opcodes::Opcodes;
use super::operators::*;

bitflags! {
    /// These flags represent the structural properties of an
    /// opcode/Operation. They are mostly used by analyses that only care
    /// about bracketing, not about the concrete operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const NONE               = 0;
        const IS_BLOCK_START     = 1 << 0;
        const IS_BLOCK_END       = 1 << 1;
        const IS_LOOP_START      = Self::IS_BLOCK_START.bits() | 1 << 2;
        const IS_LOOP_END        = Self::IS_BLOCK_END.bits()   | 1 << 3;
        const IS_PRIMITIVE       = 1 << 4;
        const IS_FUNCTION_START  = Self::IS_BLOCK_START.bits() | 1 << 5;
        const IS_FUNCTION_END    = Self::IS_BLOCK_END.bits()   | 1 << 6;
        const IS_BLOCK_TRANSITION = Self::IS_BLOCK_START.bits()
                                  | Self::IS_BLOCK_END.bits();
    }
}

/// This trait implements functions that all Operations must satisfy.
/// Override these functions in the respective struct implementations so as
/// to return the properties of that particular Operation.
pub trait Operation {
    fn opcode(&self) -> Opcodes;

    fn attributes(&self) -> Attributes {
        Attributes::NONE
    }

    fn num_inputs(&self) -> u8 {
        0
    }

    fn num_outputs(&self) -> u8 {
        0
    }

    /// Temporary (inner) variables the operation binds for the block it
    /// opens: parameters, the `this` binding, loop variables, the caught
    /// exception.
    fn num_temp(&self) -> u8 {
        0
    }

    fn is_block_start(&self) -> bool {
        self.attributes().contains(Attributes::IS_BLOCK_START)
    }

    fn is_block_end(&self) -> bool {
        self.attributes().contains(Attributes::IS_BLOCK_END)
    }

    fn is_loop_start(&self) -> bool {
        self.attributes().contains(Attributes::IS_LOOP_START)
    }

    fn is_loop_end(&self) -> bool {
        self.attributes().contains(Attributes::IS_LOOP_END)
    }

    fn is_function_start(&self) -> bool {
        self.attributes().contains(Attributes::IS_FUNCTION_START)
    }

    fn is_function_end(&self) -> bool {
        self.attributes().contains(Attributes::IS_FUNCTION_END)
    }

    fn is_primitive(&self) -> bool {
        self.attributes().contains(Attributes::IS_PRIMITIVE)
    }

    // a function to help cast the object back to the concrete type
    fn as_any(&self) -> &dyn Any;
}

macro_rules! define_impl {
    ($opcode:ident, $attr:ident, $inputs:expr, $outputs:expr, $temp:expr) => {
        impl Operation for $opcode {
            fn opcode(&self) -> Opcodes {
                Opcodes::$opcode
            }

            fn attributes(&self) -> Attributes {
                Attributes::$attr
            }

            fn num_inputs(&self) -> u8 {
                $inputs
            }

            fn num_outputs(&self) -> u8 {
                $outputs
            }

            fn num_temp(&self) -> u8 {
                $temp
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

macro_rules! define {
    ($opcode:ident, $attr:ident, $inputs:literal, $outputs:literal) => {
        #[derive(Debug)]
        pub struct $opcode();
        define_impl!($opcode, $attr, $inputs, $outputs, 0);
    };

    ($opcode:ident, $attr:ident,
     $inputs:literal, $outputs:literal, $temp:literal) => {
        #[derive(Debug)]
        pub struct $opcode();
        define_impl!($opcode, $attr, $inputs, $outputs, $temp);
    };

    ($opcode:ident, $attr:ident, $type:ty, $inputs:literal, $outputs:literal) => {
        #[derive(Debug)]
        pub struct $opcode(pub $type);
        define_impl!($opcode, $attr, $inputs, $outputs, 0);
    };

    ($opcode:ident, $attr:ident, $type:ty,
     $inputs:literal, $outputs:literal, $temp:literal) => {
        #[derive(Debug)]
        pub struct $opcode(pub $type);
        define_impl!($opcode, $attr, $inputs, $outputs, $temp);
    };
}

/// Function-body openers carry the declared signature; the parameters are
/// bound as temp variables, optionally preceded by an explicit `this`.
macro_rules! define_function_begin {
    ($opcode:ident, $extra_temps:literal, $outputs:literal) => {
        #[derive(Debug)]
        pub struct $opcode(pub FunctionSignature);
        impl Operation for $opcode {
            fn opcode(&self) -> Opcodes {
                Opcodes::$opcode
            }

            fn attributes(&self) -> Attributes {
                Attributes::IS_FUNCTION_START
            }

            fn num_outputs(&self) -> u8 {
                $outputs
            }

            fn num_temp(&self) -> u8 {
                self.0.num_parameters() as u8 + $extra_temps
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// Class and object-literal method bodies: a member name plus a signature,
/// with `this` bound as the first temp.
macro_rules! define_method_begin {
    ($opcode:ident) => {
        #[derive(Debug)]
        pub struct $opcode {
            pub name: String,
            pub signature: FunctionSignature,
        }
        impl Operation for $opcode {
            fn opcode(&self) -> Opcodes {
                Opcodes::$opcode
            }

            fn attributes(&self) -> Attributes {
                Attributes::IS_FUNCTION_START
            }

            fn num_temp(&self) -> u8 {
                self.signature.num_parameters() as u8 + 1
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

//
//
// From here on is the definition of each of the opcodes
//
//

define!(Nop, NONE, 0, 0);

// Constants
define!(LoadInt,       IS_PRIMITIVE, i64,    0, 1);
define!(LoadFloat,     IS_PRIMITIVE, f64,    0, 1);
define!(LoadString,    IS_PRIMITIVE, String, 0, 1);
define!(LoadBool,      IS_PRIMITIVE, bool,   0, 1);
define!(LoadBigInt,    IS_PRIMITIVE, i64,    0, 1);
define!(LoadRegExp,    IS_PRIMITIVE, String, 0, 1);
define!(LoadNull,      IS_PRIMITIVE,         0, 1);
define!(LoadUndefined, IS_PRIMITIVE,         0, 1);
define!(LoadThis,      NONE,                 0, 1);
define!(LoadArguments, NONE,                 0, 1);
define!(LoadBuiltin,   NONE,         String, 0, 1);

// Expressions
define!(BinaryOp,       NONE, BinaryOperators, 2, 1);
define!(UnaryOp,        NONE, UnaryOperators,  1, 1);
define!(CompareOp,      NONE, Comparators,     2, 1);
define!(TypeOf,         NONE,                  1, 1);
define!(TestInstanceOf, NONE,                  2, 1);
define!(TestIn,         NONE,                  2, 1);
define!(TernaryOp,      NONE,                  3, 1);
define!(Reassign,       NONE,                  2, 0);
define!(Update,         NONE, BinaryOperators, 2, 0);

// Properties and elements
define!(GetProperty,         NONE, String, 1, 1);
define!(SetProperty,         NONE, String, 2, 0);
define!(DeleteProperty,      NONE, String, 1, 0);
define!(GetElement,          NONE,         2, 1);
define!(SetElement,          NONE,         3, 0);
define!(GetComputedProperty, NONE,         2, 1);
define!(SetComputedProperty, NONE,         3, 0);

/// Destructure an object into one output per selected property, plus a
/// trailing rest object when requested.
#[derive(Debug)]
pub struct DestructObject {
    pub properties: Vec<String>,
    pub has_rest_element: bool,
}

impl Operation for DestructObject {
    fn opcode(&self) -> Opcodes {
        Opcodes::DestructObject
    }

    fn num_inputs(&self) -> u8 {
        1
    }

    fn num_outputs(&self) -> u8 {
        self.properties.len() as u8 + self.has_rest_element as u8
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Create an object literal in one shot from parallel property-name and
/// value lists. Integer-looking keys describe elements and do not
/// contribute to the property shape.
#[derive(Debug)]
pub struct CreateObject(pub Vec<String>);

impl Operation for CreateObject {
    fn opcode(&self) -> Opcodes {
        Opcodes::CreateObject
    }

    fn num_inputs(&self) -> u8 {
        self.0.len() as u8
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct CreateArray(pub u8);

impl Operation for CreateArray {
    fn opcode(&self) -> Opcodes {
        Opcodes::CreateArray
    }

    fn num_inputs(&self) -> u8 {
        self.0
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Calls. The first input is the callee (respectively the receiver for
// method calls); the payload carries the argument count.

pub struct CallFunction(pub u8);

impl Operation for CallFunction {
    fn opcode(&self) -> Opcodes {
        Opcodes::CallFunction
    }

    fn num_inputs(&self) -> u8 {
        self.0 + 1
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A method call by name. The signature is not part of the operation; the
/// typer resolves it against the environment using the receiver's group.
pub struct CallMethod {
    pub name: String,
    pub num_arguments: u8,
}

impl Operation for CallMethod {
    fn opcode(&self) -> Opcodes {
        Opcodes::CallMethod
    }

    fn num_inputs(&self) -> u8 {
        self.num_arguments + 1
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Construct(pub u8);

impl Operation for Construct {
    fn opcode(&self) -> Opcodes {
        Opcodes::Construct
    }

    fn num_inputs(&self) -> u8 {
        self.0 + 1
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Functions. Every flavour opens a function frame and binds its
// parameters; only the type given to the function variable differs.

define_function_begin!(BeginPlainFunction,          0, 1);
define_function_begin!(BeginArrowFunction,          0, 1);
define_function_begin!(BeginGeneratorFunction,      0, 1);
define_function_begin!(BeginAsyncFunction,          0, 1);
define_function_begin!(BeginAsyncArrowFunction,     0, 1);
define_function_begin!(BeginAsyncGeneratorFunction, 0, 1);
// Constructors additionally bind `this` as their first temp.
define_function_begin!(BeginConstructor,            1, 1);

define!(EndPlainFunction,          IS_FUNCTION_END, 0, 0);
define!(EndArrowFunction,          IS_FUNCTION_END, 0, 0);
define!(EndGeneratorFunction,      IS_FUNCTION_END, 0, 0);
define!(EndAsyncFunction,          IS_FUNCTION_END, 0, 0);
define!(EndAsyncArrowFunction,     IS_FUNCTION_END, 0, 0);
define!(EndAsyncGeneratorFunction, IS_FUNCTION_END, 0, 0);
define!(EndConstructor,            IS_FUNCTION_END, 0, 0);

define!(Return, NONE, 1, 0);
define!(Yield,  NONE, 1, 1);
define!(Await,  NONE, 1, 1);

// Class definitions. The class variable is produced by the Begin
// operation so that method bodies can refer to the class being defined;
// its final type is filled in when the definition closes.

#[derive(Debug)]
pub struct BeginClassDefinition {
    pub has_superclass: bool,
}

impl Operation for BeginClassDefinition {
    fn opcode(&self) -> Opcodes {
        Opcodes::BeginClassDefinition
    }

    fn attributes(&self) -> Attributes {
        Attributes::IS_BLOCK_START
    }

    fn num_inputs(&self) -> u8 {
        self.has_superclass as u8
    }

    fn num_outputs(&self) -> u8 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

define!(EndClassDefinition, IS_BLOCK_END, 0, 0);

/// Constructors of classes bind `this` plus their parameters as temps but
/// produce no value; the construct signature goes onto the class.
#[derive(Debug)]
pub struct BeginClassConstructor(pub FunctionSignature);

impl Operation for BeginClassConstructor {
    fn opcode(&self) -> Opcodes {
        Opcodes::BeginClassConstructor
    }

    fn attributes(&self) -> Attributes {
        Attributes::IS_FUNCTION_START
    }

    fn num_temp(&self) -> u8 {
        self.0.num_parameters() as u8 + 1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

define!(EndClassConstructor, IS_FUNCTION_END, 0, 0);

/// Add a data property to the instance shape, with an optional initial
/// value input.
#[derive(Debug)]
pub struct ClassAddInstanceProperty {
    pub name: String,
    pub has_value: bool,
}

impl Operation for ClassAddInstanceProperty {
    fn opcode(&self) -> Opcodes {
        Opcodes::ClassAddInstanceProperty
    }

    fn num_inputs(&self) -> u8 {
        self.has_value as u8
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct ClassAddStaticProperty {
    pub name: String,
    pub has_value: bool,
}

impl Operation for ClassAddStaticProperty {
    fn opcode(&self) -> Opcodes {
        Opcodes::ClassAddStaticProperty
    }

    fn num_inputs(&self) -> u8 {
        self.has_value as u8
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

define_method_begin!(BeginClassInstanceMethod);
define_method_begin!(BeginClassPrivateInstanceMethod);
define_method_begin!(BeginClassStaticMethod);
define_method_begin!(BeginClassPrivateStaticMethod);

define!(EndClassInstanceMethod,        IS_FUNCTION_END, 0, 0);
define!(EndClassPrivateInstanceMethod, IS_FUNCTION_END, 0, 0);
define!(EndClassStaticMethod,          IS_FUNCTION_END, 0, 0);
define!(EndClassPrivateStaticMethod,   IS_FUNCTION_END, 0, 0);

// Getters bind `this`; setters bind `this` and the incoming value.
define!(BeginClassInstanceGetter, IS_FUNCTION_START, String, 0, 0, 1);
define!(BeginClassInstanceSetter, IS_FUNCTION_START, String, 0, 0, 2);
define!(BeginClassStaticGetter,   IS_FUNCTION_START, String, 0, 0, 1);
define!(BeginClassStaticSetter,   IS_FUNCTION_START, String, 0, 0, 2);

define!(EndClassInstanceGetter, IS_FUNCTION_END, 0, 0);
define!(EndClassInstanceSetter, IS_FUNCTION_END, 0, 0);
define!(EndClassStaticGetter,   IS_FUNCTION_END, 0, 0);
define!(EndClassStaticSetter,   IS_FUNCTION_END, 0, 0);

define!(BeginClassStaticInitializer, IS_FUNCTION_START, 0, 0, 1);
define!(EndClassStaticInitializer,   IS_FUNCTION_END,   0, 0);

// Object literals. The object variable is only produced when the literal
// closes, with the accumulated shape.

define!(BeginObjectLiteral,      IS_BLOCK_START, 0, 0);
define!(EndObjectLiteral,        IS_BLOCK_END,   0, 1);
define!(ObjectLiteralAddProperty, NONE, String,  1, 0);
define!(ObjectLiteralAddElement,  NONE, i64,     1, 0);

define_method_begin!(BeginObjectLiteralMethod);
define!(EndObjectLiteralMethod, IS_FUNCTION_END, 0, 0);

define!(BeginObjectLiteralGetter, IS_FUNCTION_START, String, 0, 0, 1);
define!(BeginObjectLiteralSetter, IS_FUNCTION_START, String, 0, 0, 2);
define!(EndObjectLiteralGetter,   IS_FUNCTION_END, 0, 0);
define!(EndObjectLiteralSetter,   IS_FUNCTION_END, 0, 0);

// Control flow

define!(BeginIf,   IS_BLOCK_START,      1, 0);
define!(BeginElse, IS_BLOCK_TRANSITION, 0, 0);
define!(EndIf,     IS_BLOCK_END,        0, 0);

define!(BeginWhileLoop,   IS_LOOP_START, 1, 0);
define!(EndWhileLoop,     IS_LOOP_END,   0, 0);
define!(BeginDoWhileLoop, IS_LOOP_START, 0, 0);
define!(EndDoWhileLoop,   IS_LOOP_END,   1, 0);

// for (let i = start; i cmp end; i op= step): the loop variable is a temp.
define!(BeginForLoop,   IS_LOOP_START, 3, 0, 1);
define!(EndForLoop,     IS_LOOP_END,   0, 0);
define!(BeginForInLoop, IS_LOOP_START, 1, 0, 1);
define!(EndForInLoop,   IS_LOOP_END,   0, 0);
define!(BeginForOfLoop, IS_LOOP_START, 1, 0, 1);
define!(EndForOfLoop,   IS_LOOP_END,   0, 0);
define!(BeginRepeatLoop, IS_LOOP_START, u64, 0, 0, 1);
define!(EndRepeatLoop,  IS_LOOP_END,   0, 0);

define!(BeginSwitch,            IS_BLOCK_START, 1, 0);
define!(BeginSwitchCase,        IS_BLOCK_START, 1, 0);
define!(BeginSwitchDefaultCase, IS_BLOCK_START, 0, 0);
define!(EndSwitchCase,          IS_BLOCK_END,   0, 0);
define!(EndSwitch,              IS_BLOCK_END,   0, 0);

define!(BeginTry,     IS_BLOCK_START,      0, 0);
define!(BeginCatch,   IS_BLOCK_TRANSITION, 0, 0, 1);
define!(BeginFinally, IS_BLOCK_TRANSITION, 0, 0);
define!(EndTryCatch,  IS_BLOCK_END,        0, 0);

define!(Break,    NONE, 0, 0);
define!(Continue, NONE, 0, 0);

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////
