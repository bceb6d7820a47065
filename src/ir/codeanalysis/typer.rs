//! The Typer
//!
//! A forward abstract interpreter over the instruction stream. The program
//! builder hands every appended instruction to [`Typer::analyze`]; the
//! typer updates the per-variable state and afterwards answers
//! [`Typer::type_of`] queries from the code generators. The typing is a
//! best-effort approximation: anything the typer cannot know widens to
//! `Unknown`, and only malformed Begin/End bracketing (a builder bug)
//! aborts.

use rustc_hash::FxHashMap;

use super::environment::TypeEnvironment;
use super::signatures::{FunctionSignature, Param};
use super::statestack::{BlockKind, Frame, StateStack};
use super::types::*;
use crate::ir::instruction::Instruction;
use crate::ir::opcodes::Opcodes as op;
use crate::ir::operation::*;
use crate::ir::operators::*;
use crate::ir::variable::Variable;

/// One active function-like body: a function, method, accessor,
/// constructor or static initializer. Tracks the union of everything the
/// body has returned so far, seeded with the declared return type.
struct FunctionDefinition {
    return_type: Type,
}

/// One class definition being built up. The instance and static shapes
/// accumulate member by member; the final class value is assembled when
/// the definition closes.
struct ClassDefinition {
    output: Variable,
    instance_type: Type,
    static_type: Type,
    constructor_sig: Option<FunctionSignature>,
    super_static: Option<Type>,
    super_instance: Option<Type>,
}

/// One object literal being built up.
struct ObjectLiteral {
    object_type: Type,
}

/// How a function-like body binds `this`.
enum ThisBinding {
    /// Arrows: `this` is lexical, the enclosing binding stays visible.
    Inherited,
    /// Plain, generator and async functions: `this` depends on the call
    /// site, so only a plain object can be assumed. No temp variable is
    /// consumed.
    Dynamic,
    /// Methods, accessors, initializers and constructors: `this` is bound
    /// explicitly as the body's first temp variable.
    Explicit(Type),
}

/// Finished frames of the arms of one multi-arm construct (if/else,
/// switch), waiting to be merged together when the construct closes.
struct SiblingGroup {
    frames: Vec<Frame>,
    covers_all_paths: bool,
}

pub struct Typer<'e> {
    /// The external oracle for builtins, group members and primitive
    /// types. Shared with the rest of the fuzzer, queried read-only.
    env: &'e dyn TypeEnvironment,

    /// The per-scope variable state.
    state: StateStack,

    /// Program-wide property/method declarations issued by the builder.
    /// Consulted after per-group knowledge but before the environment's
    /// global tables.
    property_types: FxHashMap<String, Type>,
    method_signatures: FxHashMap<String, FunctionSignature>,

    /// Bookkeeping for the currently open constructs, innermost last.
    functions: Vec<FunctionDefinition>,
    classes: Vec<ClassDefinition>,
    object_literals: Vec<ObjectLiteral>,
    this_types: Vec<Type>,
    siblings: Vec<SiblingGroup>,
}

impl<'e> Typer<'e> {
    pub fn new(env: &'e dyn TypeEnvironment) -> Self {
        Self {
            env,
            state: StateStack::new(),
            property_types: FxHashMap::default(),
            method_signatures: FxHashMap::default(),
            functions: Vec::new(),
            classes: Vec::new(),
            object_literals: Vec::new(),
            this_types: Vec::new(),
            siblings: Vec::new(),
        }
    }

    /// Forget everything ever analyzed, including the program-wide
    /// declarations. The typer behaves as freshly constructed.
    pub fn reset(&mut self) {
        self.state.reset();
        self.property_types.clear();
        self.method_signatures.clear();
        self.functions.clear();
        self.classes.clear();
        self.object_literals.clear();
        self.this_types.clear();
        self.siblings.clear();
    }

    ////
    //// Queries for the code generators
    ////

    /// The current inferred type of `variable`. Querying a variable that
    /// no operation has produced is answered with `Unknown`.
    pub fn type_of(&self, variable: Variable) -> Type {
        match self.state.get(variable) {
            Some(t) => t.clone(),
            None => {
                tracing::debug!("type query for undefined {}", variable.print());
                Unknown
            }
        }
    }

    /// The instance type of the superclass of the innermost class
    /// definition, for `super.member` accesses inside method bodies.
    pub fn current_super_type(&self) -> Type {
        match self.classes.last().and_then(|cd| cd.super_instance.clone()) {
            Some(t) => t,
            None => {
                tracing::debug!("super type query outside a derived class");
                Unknown
            }
        }
    }

    /// The type of the superclass value itself, for `super(...)` calls
    /// inside constructor bodies.
    pub fn current_super_constructor_type(&self) -> Type {
        match self.classes.last().and_then(|cd| cd.super_static.clone()) {
            Some(t) => t,
            None => {
                tracing::debug!("super constructor query outside a derived class");
                Unknown
            }
        }
    }

    /// What the innermost active function-like body is known to return so
    /// far: the declared return type joined with every `Return` seen.
    pub fn current_return_type(&self) -> Type {
        match self.functions.last() {
            Some(f) => f.return_type.clone(),
            None => {
                tracing::debug!("return type query outside a function body");
                Unknown
            }
        }
    }

    ////
    //// Program-wide declarations from the builder
    ////

    /// Declare that properties named `name` have the given type wherever
    /// the receiver's group does not know better.
    pub fn set_property_type(&mut self, name: &str, ptype: Type) {
        self.property_types.insert(name.to_string(), ptype);
    }

    /// Declare a method signature by name, analogous to
    /// [`Typer::set_property_type`].
    pub fn set_method_signature(&mut self, name: &str, signature: FunctionSignature) {
        self.method_signatures.insert(name.to_string(), signature);
    }

    ////
    //// The transfer functions
    ////

    /// Process one freshly appended instruction.
    pub fn analyze(&mut self, inst: &Instruction) {
        if inst.operation.is_block_start() || inst.operation.is_block_end() {
            tracing::trace!(
                opcode = ?inst.operation.opcode(),
                depth = self.state.depth(),
                "block boundary"
            );
        }

        match inst.operation.opcode() {
            // No type effect.
            op::Nop | op::Break | op::Continue => {}

            //
            // Constants
            //
            op::LoadInt => self.define(inst.output_at(0), self.env.int_type()),
            op::LoadFloat => self.define(inst.output_at(0), self.env.float_type()),
            op::LoadString => self.define(inst.output_at(0), self.env.string_type()),
            op::LoadBool => self.define(inst.output_at(0), self.env.boolean_type()),
            op::LoadBigInt => self.define(inst.output_at(0), self.env.bigint_type()),
            op::LoadRegExp => self.define(inst.output_at(0), self.env.regexp_type()),
            op::LoadNull => self.define(inst.output_at(0), Null),
            op::LoadUndefined => self.define(inst.output_at(0), Undefined),

            op::LoadThis => {
                let this = self.this_types.last().cloned().unwrap_or(Object);
                self.define(inst.output_at(0), this);
            }

            // The arguments object is array-like but not an array.
            op::LoadArguments => self.define(inst.output_at(0), Iterable + Object),

            op::LoadBuiltin => {
                let name = &inst.cast_into::<LoadBuiltin>().0;
                self.define(inst.output_at(0), self.env.type_of_builtin(name));
            }

            //
            // Expressions
            //
            op::BinaryOp => {
                let operator = inst.cast_into::<BinaryOp>().0;
                let lhs = self.type_of(*inst.input_at(0));
                let rhs = self.type_of(*inst.input_at(1));
                let out = self.binary_output_type(operator, &lhs, &rhs);
                self.define(inst.output_at(0), out);
            }

            op::UnaryOp => {
                let operator = inst.cast_into::<UnaryOp>().0;
                let operand = self.type_of(*inst.input_at(0));
                let out = self.unary_output_type(operator, &operand);
                self.define(inst.output_at(0), out);
            }

            op::CompareOp | op::TestInstanceOf | op::TestIn => {
                self.define(inst.output_at(0), self.env.boolean_type());
            }

            // typeof always evaluates to one of a fixed set of strings.
            op::TypeOf => self.define(inst.output_at(0), String),

            op::TernaryOp => {
                let consequent = self.type_of(*inst.input_at(1));
                let alternate = self.type_of(*inst.input_at(2));
                self.define(inst.output_at(0), consequent | alternate);
            }

            op::Reassign => {
                let value = self.type_of(*inst.input_at(1));
                self.set(inst.input_at(0), value);
            }

            op::Update => {
                let operator = inst.cast_into::<Update>().0;
                let lhs = self.type_of(*inst.input_at(0));
                let rhs = self.type_of(*inst.input_at(1));
                let out = self.binary_output_type(operator, &lhs, &rhs);
                self.set(inst.input_at(0), out);
            }

            //
            // Objects and properties
            //
            op::CreateObject => {
                let names = &inst.cast_into::<CreateObject>().0;
                // Integer-looking keys are element writes and contribute
                // nothing to the property shape.
                let properties = names
                    .iter()
                    .filter(|name| name.parse::<i64>().is_err())
                    .map(|name| name.as_str());
                self.define(
                    inst.output_at(0),
                    Type::object_with(properties, [], None),
                );
            }

            op::CreateArray => self.define(inst.output_at(0), self.env.array_type()),

            op::GetProperty => {
                let name = &inst.cast_into::<GetProperty>().0;
                let receiver = self.type_of(*inst.input_at(0));
                let out = self.lookup_property(name, &receiver);
                self.define(inst.output_at(0), out);
            }

            op::SetProperty => {
                let name = &inst.cast_into::<SetProperty>().0;
                let receiver = self.type_of(*inst.input_at(0));
                self.set(inst.input_at(0), receiver.adding_property(name));
            }

            op::DeleteProperty => {
                let name = &inst.cast_into::<DeleteProperty>().0;
                let receiver = self.type_of(*inst.input_at(0));
                self.set(inst.input_at(0), receiver.removing_property(name));
            }

            // Element accesses don't participate in the property shape and
            // their values are opaque to us.
            op::GetElement | op::GetComputedProperty => {
                self.define(inst.output_at(0), Unknown);
            }
            op::SetElement | op::SetComputedProperty => {}

            op::DestructObject => {
                let destruct = inst.cast_into::<DestructObject>();
                let receiver = self.type_of(*inst.input_at(0));
                for (i, name) in destruct.properties.iter().enumerate() {
                    let out = self.lookup_property(name, &receiver);
                    self.define(inst.output_at(i), out);
                }
                if destruct.has_rest_element {
                    self.define(inst.output_at(destruct.properties.len()), Object);
                }
            }

            //
            // Calls
            //
            op::CallFunction => {
                let callee = self.type_of(*inst.input_at(0));
                let out = match callee.call_signature() {
                    Some(sig) => sig.return_type().clone(),
                    None => Unknown,
                };
                self.define(inst.output_at(0), out);
            }

            op::Construct => {
                let callee = self.type_of(*inst.input_at(0));
                let out = match callee.construct_signature() {
                    Some(sig) => sig.return_type().clone(),
                    None => Object,
                };
                self.define(inst.output_at(0), out);
            }

            op::CallMethod => {
                let name = &inst.cast_into::<CallMethod>().name;
                let receiver = self.type_of(*inst.input_at(0));
                let out = match self.lookup_method(name, &receiver) {
                    Some(sig) => sig.return_type().clone(),
                    None => Unknown,
                };
                self.define(inst.output_at(0), out);
            }

            //
            // Functions
            //
            op::BeginPlainFunction => {
                let sig = &inst.cast_into::<BeginPlainFunction>().0;
                self.define(inst.output_at(0), Type::function_and_constructor(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Dynamic,
                    sig.return_type().clone(),
                );
            }
            op::BeginArrowFunction => {
                let sig = &inst.cast_into::<BeginArrowFunction>().0;
                self.define(inst.output_at(0), Type::function(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Inherited,
                    sig.return_type().clone(),
                );
            }
            op::BeginGeneratorFunction => {
                let sig = &inst.cast_into::<BeginGeneratorFunction>().0;
                self.define(inst.output_at(0), Type::function(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Dynamic,
                    sig.return_type().clone(),
                );
            }
            op::BeginAsyncFunction => {
                let sig = &inst.cast_into::<BeginAsyncFunction>().0;
                self.define(inst.output_at(0), Type::function(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Dynamic,
                    sig.return_type().clone(),
                );
            }
            op::BeginAsyncArrowFunction => {
                let sig = &inst.cast_into::<BeginAsyncArrowFunction>().0;
                self.define(inst.output_at(0), Type::function(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Inherited,
                    sig.return_type().clone(),
                );
            }
            op::BeginAsyncGeneratorFunction => {
                let sig = &inst.cast_into::<BeginAsyncGeneratorFunction>().0;
                self.define(inst.output_at(0), Type::function(sig.clone()));
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Dynamic,
                    sig.return_type().clone(),
                );
            }
            op::BeginConstructor => {
                let sig = &inst.cast_into::<BeginConstructor>().0;
                // Whatever the body does, constructing yields an object.
                let ctype = Type::constructor(sig.with_return_type(Object));
                self.define(inst.output_at(0), ctype);
                self.begin_body(
                    BlockKind::Function,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(Object),
                    Nothing,
                );
            }

            op::EndPlainFunction
            | op::EndGeneratorFunction
            | op::EndAsyncFunction
            | op::EndAsyncGeneratorFunction => {
                self.end_body(BlockKind::Function, true);
            }
            op::EndArrowFunction | op::EndAsyncArrowFunction => {
                self.end_body(BlockKind::Function, false);
            }
            op::EndConstructor => self.end_body(BlockKind::Function, true),

            op::Return => {
                let returned = self.type_of(*inst.input_at(0));
                match self.functions.last_mut() {
                    Some(f) => f.return_type |= returned,
                    None => tracing::debug!("return outside any function body"),
                }
            }

            // The value a yield expression evaluates to is whatever the
            // driver of the generator sends back in.
            op::Yield => self.define(inst.output_at(0), Unknown),
            op::Await => self.define(inst.output_at(0), Unknown),

            //
            // Class definitions
            //
            op::BeginClassDefinition => {
                let decl = inst.cast_into::<BeginClassDefinition>();
                let (super_static, super_instance) = if decl.has_superclass {
                    let superclass = self.type_of(*inst.input_at(0));
                    let instance = match superclass.construct_signature() {
                        Some(sig) => sig.return_type().clone(),
                        None => Object,
                    };
                    (Some(superclass), Some(instance))
                } else {
                    (None, None)
                };
                self.define(inst.output_at(0), Object);
                self.state.push(BlockKind::ClassBody);
                self.classes.push(ClassDefinition {
                    output: *inst.output_at(0),
                    instance_type: Object,
                    static_type: Object,
                    constructor_sig: None,
                    super_static,
                    super_instance,
                });
            }

            op::EndClassDefinition => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::ClassBody,
                    "class definition end without matching begin"
                );
                self.state.merge_one(frame);

                let cd = self.classes.pop().unwrap();
                let ctor_sig = cd
                    .constructor_sig
                    .unwrap_or(FunctionSignature::returning(Nothing))
                    .with_return_type(cd.instance_type);
                let class_type = cd.static_type + Type::constructor(ctor_sig);
                self.set(&cd.output, class_type);
            }

            op::BeginClassConstructor => {
                let sig = &inst.cast_into::<BeginClassConstructor>().0;
                let cd = self.classes.last_mut().expect("constructor outside a class");
                cd.constructor_sig = Some(sig.clone());
                self.begin_body(
                    BlockKind::ClassMethod,
                    sig.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(Object),
                    Nothing,
                );
            }
            op::EndClassConstructor => self.end_body(BlockKind::ClassMethod, true),

            op::ClassAddInstanceProperty => {
                let decl = inst.cast_into::<ClassAddInstanceProperty>();
                let cd = self.classes.last_mut().expect("class member outside a class");
                cd.instance_type = cd.instance_type.adding_property(&decl.name);
            }

            op::ClassAddStaticProperty => {
                let decl = inst.cast_into::<ClassAddStaticProperty>();
                let cd = self.classes.last_mut().expect("class member outside a class");
                cd.static_type = cd.static_type.adding_property(&decl.name);
            }

            op::BeginClassInstanceMethod => {
                let decl = inst.cast_into::<BeginClassInstanceMethod>();
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    cd.instance_type = cd.instance_type.adding_method(&decl.name);
                    cd.instance_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    decl.signature.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    decl.signature.return_type().clone(),
                );
            }
            op::EndClassInstanceMethod => self.end_body(BlockKind::ClassMethod, true),

            // Accessor bodies see the shape as it was before their own
            // name joined it; later members see the property.
            op::BeginClassInstanceGetter => {
                let name = &inst.cast_into::<BeginClassInstanceGetter>().0;
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    let this = cd.instance_type.clone();
                    cd.instance_type = cd.instance_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    &[],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndClassInstanceGetter => self.end_body(BlockKind::ClassMethod, true),

            op::BeginClassInstanceSetter => {
                let name = &inst.cast_into::<BeginClassInstanceSetter>().0;
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    let this = cd.instance_type.clone();
                    cd.instance_type = cd.instance_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    &[Param::Plain(Unknown)],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndClassInstanceSetter => self.end_body(BlockKind::ClassMethod, true),

            // Private members never join the externally visible shape,
            // but their bodies see everything accumulated so far.
            op::BeginClassPrivateInstanceMethod => {
                let decl = inst.cast_into::<BeginClassPrivateInstanceMethod>();
                let this = {
                    let cd = self.classes.last().expect("class member outside a class");
                    cd.instance_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    decl.signature.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    decl.signature.return_type().clone(),
                );
            }
            op::EndClassPrivateInstanceMethod => self.end_body(BlockKind::ClassMethod, true),

            op::BeginClassStaticMethod => {
                let decl = inst.cast_into::<BeginClassStaticMethod>();
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    cd.static_type = cd.static_type.adding_method(&decl.name);
                    cd.static_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassStatic,
                    decl.signature.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    decl.signature.return_type().clone(),
                );
            }
            op::EndClassStaticMethod => self.end_body(BlockKind::ClassStatic, true),

            op::BeginClassStaticGetter => {
                let name = &inst.cast_into::<BeginClassStaticGetter>().0;
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    let this = cd.static_type.clone();
                    cd.static_type = cd.static_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassStatic,
                    &[],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndClassStaticGetter => self.end_body(BlockKind::ClassStatic, true),

            op::BeginClassStaticSetter => {
                let name = &inst.cast_into::<BeginClassStaticSetter>().0;
                let this = {
                    let cd = self.classes.last_mut().expect("class member outside a class");
                    let this = cd.static_type.clone();
                    cd.static_type = cd.static_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassStatic,
                    &[Param::Plain(Unknown)],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndClassStaticSetter => self.end_body(BlockKind::ClassStatic, true),

            op::BeginClassPrivateStaticMethod => {
                let decl = inst.cast_into::<BeginClassPrivateStaticMethod>();
                let this = {
                    let cd = self.classes.last().expect("class member outside a class");
                    cd.static_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassStatic,
                    decl.signature.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    decl.signature.return_type().clone(),
                );
            }
            op::EndClassPrivateStaticMethod => self.end_body(BlockKind::ClassStatic, true),

            op::BeginClassStaticInitializer => {
                let this = {
                    let cd = self.classes.last().expect("class member outside a class");
                    cd.static_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassStaticInitializer,
                    &[],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndClassStaticInitializer => {
                self.end_body(BlockKind::ClassStaticInitializer, true);
            }

            //
            // Object literals
            //
            op::BeginObjectLiteral => {
                self.state.push(BlockKind::ObjectLiteral);
                self.object_literals.push(ObjectLiteral {
                    object_type: Object,
                });
            }

            op::EndObjectLiteral => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::ObjectLiteral,
                    "object literal end without matching begin"
                );
                self.state.merge_one(frame);
                let literal = self.object_literals.pop().unwrap();
                self.define(inst.output_at(0), literal.object_type);
            }

            op::ObjectLiteralAddProperty => {
                let name = &inst.cast_into::<ObjectLiteralAddProperty>().0;
                let literal = self
                    .object_literals
                    .last_mut()
                    .expect("literal member outside an object literal");
                literal.object_type = literal.object_type.adding_property(name);
            }

            // Integer-indexed elements don't shape the object.
            op::ObjectLiteralAddElement => {}

            op::BeginObjectLiteralMethod => {
                let decl = inst.cast_into::<BeginObjectLiteralMethod>();
                let this = {
                    let literal = self
                        .object_literals
                        .last_mut()
                        .expect("literal member outside an object literal");
                    literal.object_type = literal.object_type.adding_method(&decl.name);
                    literal.object_type.clone()
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    decl.signature.parameters(),
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    decl.signature.return_type().clone(),
                );
            }
            op::EndObjectLiteralMethod => self.end_body(BlockKind::ClassMethod, true),

            op::BeginObjectLiteralGetter => {
                let name = &inst.cast_into::<BeginObjectLiteralGetter>().0;
                let this = {
                    let literal = self
                        .object_literals
                        .last_mut()
                        .expect("literal member outside an object literal");
                    let this = literal.object_type.clone();
                    literal.object_type = literal.object_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    &[],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndObjectLiteralGetter => self.end_body(BlockKind::ClassMethod, true),

            op::BeginObjectLiteralSetter => {
                let name = &inst.cast_into::<BeginObjectLiteralSetter>().0;
                let this = {
                    let literal = self
                        .object_literals
                        .last_mut()
                        .expect("literal member outside an object literal");
                    let this = literal.object_type.clone();
                    literal.object_type = literal.object_type.adding_property(name);
                    this
                };
                self.begin_body(
                    BlockKind::ClassMethod,
                    &[Param::Plain(Unknown)],
                    inst.temp(),
                    ThisBinding::Explicit(this),
                    Nothing,
                );
            }
            op::EndObjectLiteralSetter => self.end_body(BlockKind::ClassMethod, true),

            //
            // Control flow
            //
            op::BeginIf => {
                self.siblings.push(SiblingGroup {
                    frames: Vec::new(),
                    covers_all_paths: false,
                });
                self.state.push(BlockKind::Conditional);
            }

            op::BeginElse => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::Conditional,
                    "else without a matching if"
                );
                self.siblings
                    .last_mut()
                    .expect("else without a matching if")
                    .frames
                    .push(frame);
                self.state.push(BlockKind::Conditional);
            }

            op::EndIf => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::Conditional,
                    "if end without a matching begin"
                );
                let mut group = self.siblings.pop().expect("if end without a matching begin");
                group.frames.push(frame);
                // With an else arm every path runs one of the siblings.
                let covers_all_paths = group.frames.len() >= 2;
                self.state.merge_siblings(group.frames, covers_all_paths);
            }

            op::BeginWhileLoop | op::BeginDoWhileLoop => {
                self.state.push(BlockKind::Loop);
            }

            op::BeginForLoop => {
                self.state.push(BlockKind::Loop);
                self.define(inst.temp_at(0), Primitive);
            }

            op::BeginForInLoop => {
                self.state.push(BlockKind::Loop);
                self.define(inst.temp_at(0), String);
            }

            op::BeginForOfLoop => {
                self.state.push(BlockKind::Loop);
                self.define(inst.temp_at(0), Unknown);
            }

            op::BeginRepeatLoop => {
                self.state.push(BlockKind::Loop);
                self.define(inst.temp_at(0), Integer);
            }

            op::EndWhileLoop
            | op::EndDoWhileLoop
            | op::EndForLoop
            | op::EndForInLoop
            | op::EndForOfLoop
            | op::EndRepeatLoop => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::Loop,
                    "loop end without a matching begin"
                );
                // The body may run zero times, so the pre-loop state
                // remains possible.
                self.state.merge_one(frame);
            }

            op::BeginSwitch => {
                self.siblings.push(SiblingGroup {
                    frames: Vec::new(),
                    covers_all_paths: false,
                });
            }

            op::BeginSwitchCase => self.state.push(BlockKind::SwitchCase),

            op::BeginSwitchDefaultCase => {
                self.state.push(BlockKind::SwitchCase);
                self.siblings
                    .last_mut()
                    .expect("switch case outside a switch")
                    .covers_all_paths = true;
            }

            op::EndSwitchCase => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::SwitchCase,
                    "switch case end without a matching begin"
                );
                self.siblings
                    .last_mut()
                    .expect("switch case outside a switch")
                    .frames
                    .push(frame);
            }

            op::EndSwitch => {
                let group = self.siblings.pop().expect("switch end without a begin");
                self.state
                    .merge_siblings(group.frames, group.covers_all_paths);
            }

            op::BeginTry => self.state.push(BlockKind::Try),

            op::BeginCatch => {
                let frame = self.state.pop();
                assert!(
                    frame.kind() == BlockKind::Try,
                    "catch without a matching try"
                );
                self.state.merge_one(frame);
                self.state.push(BlockKind::Catch);
                self.define(inst.temp_at(0), Unknown);
            }

            op::BeginFinally => {
                let frame = self.state.pop();
                assert!(
                    matches!(frame.kind(), BlockKind::Try | BlockKind::Catch),
                    "finally without a matching try"
                );
                self.state.merge_one(frame);
                self.state.push(BlockKind::Finally);
            }

            op::EndTryCatch => {
                let frame = self.state.pop();
                assert!(
                    matches!(
                        frame.kind(),
                        BlockKind::Try | BlockKind::Catch | BlockKind::Finally
                    ),
                    "try/catch end without a matching begin"
                );
                self.state.merge_one(frame);
            }
        }
    }

    ////
    //// Helpers
    ////

    fn define(&mut self, variable: &Variable, vtype: Type) {
        self.state.define(*variable, vtype);
    }

    fn set(&mut self, variable: &Variable, vtype: Type) {
        self.state.set(*variable, vtype);
    }

    /// Open a function-like body: push its frame, establish its `this`
    /// binding, bind the parameters as the block's temp variables, and
    /// start accumulating a return type. Only an explicit `this` occupies
    /// a temp slot; a dynamic one merely shadows the enclosing binding.
    fn begin_body(
        &mut self,
        kind: BlockKind,
        parameters: &[Param],
        temps: &[Variable],
        this: ThisBinding,
        declared_return: Type,
    ) {
        self.state.push(kind);

        let mut temps = temps.iter();
        match this {
            ThisBinding::Inherited => {}
            ThisBinding::Dynamic => self.this_types.push(Object),
            ThisBinding::Explicit(this_type) => {
                match temps.next() {
                    Some(v) => self.state.define(*v, this_type.clone()),
                    None => tracing::debug!("body opened without a this temp"),
                }
                self.this_types.push(this_type);
            }
        }
        for param in parameters {
            match temps.next() {
                Some(v) => self.state.define(*v, param.callee_type()),
                None => tracing::debug!("body opened with too few parameter temps"),
            }
        }

        self.functions.push(FunctionDefinition {
            return_type: declared_return,
        });
    }

    /// Close a function-like body. The body may never run, or run any
    /// number of times, so its reassignments of outer variables merge as
    /// may-execute.
    fn end_body(&mut self, expected: BlockKind, has_this: bool) {
        let frame = self.state.pop();
        assert!(
            frame.kind() == expected,
            "mismatched body end: expected {:?}, got {:?}",
            expected,
            frame.kind()
        );
        self.state.merge_one(frame);

        let finished = self.functions.pop();
        debug_assert!(finished.is_some(), "body end without a body begin");
        if has_this {
            let popped = self.this_types.pop();
            debug_assert!(popped.is_some(), "body end without a this binding");
        }
    }

    /// Result type of a binary operation over the given operand types.
    fn binary_output_type(&self, operator: BinaryOperators, lhs: &Type, rhs: &Type) -> Type {
        if operator.is_logical() {
            // Short-circuiting evaluates to one of the operands; restrict
            // to primitives and keep boolean possible.
            return (lhs.clone() | rhs.clone()) & Primitive | Boolean;
        }

        if lhs.is(&BigInt) && rhs.is(&BigInt) {
            return BigInt;
        }
        if lhs.may_be(&BigInt) || rhs.may_be(&BigInt) {
            return Primitive | BigInt;
        }
        if lhs.is(&Integer) && rhs.is(&Integer) {
            return Number;
        }
        Primitive
    }

    fn unary_output_type(&self, operator: UnaryOperators, operand: &Type) -> Type {
        match operator {
            UnaryOperators::LogicalNot => self.env.boolean_type(),
            _ => {
                if operand.is(&BigInt) {
                    BigInt
                } else {
                    Primitive
                }
            }
        }
    }

    /// Resolve a property type for the given receiver: per-group
    /// knowledge wins, then builder declarations, then the environment's
    /// global table.
    fn lookup_property(&self, name: &str, receiver: &Type) -> Type {
        if let Some(group) = receiver.group() {
            let found = self.env.type_of_property(name, Some(group));
            if !found.is_unknown() {
                return found;
            }
        }
        if let Some(declared) = self.property_types.get(name) {
            return declared.clone();
        }
        self.env.type_of_property(name, None)
    }

    /// Resolve a method signature, with the same precedence as
    /// `lookup_property`.
    fn lookup_method(&self, name: &str, receiver: &Type) -> Option<FunctionSignature> {
        if let Some(group) = receiver.group() {
            if let Some(found) = self.env.signature_of_method(name, Some(group)) {
                return Some(found);
            }
        }
        if let Some(declared) = self.method_signatures.get(name) {
            return Some(declared.clone());
        }
        self.env.signature_of_method(name, None)
    }
}

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::codeanalysis::environment::StubEnvironment;
    use pretty_assertions::assert_eq;

    /// Drives a typer the way the program builder does: creates the output
    /// and temp variables an operation asks for, assembles the
    /// instruction, and hands it to the typer.
    struct TestBuilder<'e> {
        typer: Typer<'e>,
        next_variable_id: u32,
        num_instr: u32,
    }

    impl<'e> TestBuilder<'e> {
        fn new(env: &'e dyn TypeEnvironment) -> Self {
            Self {
                typer: Typer::new(env),
                next_variable_id: 0,
                num_instr: 0,
            }
        }

        fn next_variable(&mut self) -> Variable {
            let id = self.next_variable_id;
            self.next_variable_id += 1;
            Variable(id)
        }

        fn emit<T: Operation + 'static>(
            &mut self,
            operation: T,
            inputs: Vec<Variable>,
        ) -> (Vec<Variable>, Vec<Variable>) {
            let num_outputs = operation.num_outputs();
            let num_temp = operation.num_temp();
            let outputs: Vec<Variable> =
                (0..num_outputs).map(|_| self.next_variable()).collect();
            let temp: Vec<Variable> =
                (0..num_temp).map(|_| self.next_variable()).collect();

            let inst = Instruction::new(
                self.num_instr,
                Box::new(operation),
                inputs,
                outputs.clone(),
                temp.clone(),
            );
            self.num_instr += 1;
            self.typer.analyze(&inst);
            (outputs, temp)
        }

        fn type_of(&self, variable: Variable) -> Type {
            self.typer.type_of(variable)
        }

        fn load_int(&mut self, val: i64) -> Variable {
            self.emit(LoadInt(val), vec![]).0[0]
        }

        fn load_float(&mut self, val: f64) -> Variable {
            self.emit(LoadFloat(val), vec![]).0[0]
        }

        fn load_string(&mut self, val: &str) -> Variable {
            self.emit(LoadString(val.to_string()), vec![]).0[0]
        }

        fn load_bigint(&mut self, val: i64) -> Variable {
            self.emit(LoadBigInt(val), vec![]).0[0]
        }

        fn load_builtin(&mut self, name: &str) -> Variable {
            self.emit(LoadBuiltin(name.to_string()), vec![]).0[0]
        }

        fn load_this(&mut self) -> Variable {
            self.emit(LoadThis(), vec![]).0[0]
        }

        fn binary(&mut self, lhs: Variable, rhs: Variable, op: BinaryOperators) -> Variable {
            self.emit(BinaryOp(op), vec![lhs, rhs]).0[0]
        }

        fn unary(&mut self, operand: Variable, op: UnaryOperators) -> Variable {
            self.emit(UnaryOp(op), vec![operand]).0[0]
        }

        fn reassign(&mut self, to: Variable, from: Variable) {
            self.emit(Reassign(), vec![to, from]);
        }

        fn begin_if(&mut self, cond: Variable) {
            self.emit(BeginIf(), vec![cond]);
        }

        fn begin_else(&mut self) {
            self.emit(BeginElse(), vec![]);
        }

        fn end_if(&mut self) {
            self.emit(EndIf(), vec![]);
        }

        fn get_property(&mut self, name: &str, object: Variable) -> Variable {
            self.emit(GetProperty(name.to_string()), vec![object]).0[0]
        }
    }

    fn no_args() -> FunctionSignature {
        FunctionSignature::returning(Undefined)
    }

    #[test]
    fn adding_a_string_widens_to_primitive() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(42);
        let s = b.load_string("x");
        let r = b.binary(v, s, BinaryOperators::Add);

        assert_eq!(b.type_of(r), Primitive);
        assert_eq!(b.type_of(v), Integer);
    }

    #[test]
    fn integer_arithmetic_may_overflow_to_float() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(1);
        let w = b.load_int(2);
        let r = b.binary(v, w, BinaryOperators::Mul);
        assert_eq!(b.type_of(r), Number);
    }

    #[test]
    fn bigint_contagion() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let x = b.load_bigint(1);
        let y = b.load_bigint(2);
        let both = b.binary(x, y, BinaryOperators::Add);
        assert_eq!(b.type_of(both), BigInt);

        let i = b.load_int(3);
        let mixed = b.binary(x, i, BinaryOperators::Add);
        assert_eq!(b.type_of(mixed), Primitive | BigInt);

        let negated = b.unary(x, UnaryOperators::BitwiseNot);
        assert_eq!(b.type_of(negated), BigInt);
        let incremented = b.unary(i, UnaryOperators::Inc);
        assert_eq!(b.type_of(incremented), Primitive);
    }

    #[test]
    fn logical_operators_stay_primitive_with_boolean() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let i = b.load_int(0);
        let s = b.load_string("x");
        let r = b.binary(i, s, BinaryOperators::LogicAnd);
        assert_eq!(b.type_of(r), Integer | String | Boolean);

        let not = b.unary(i, UnaryOperators::LogicalNot);
        assert_eq!(b.type_of(not), Boolean);
    }

    #[test]
    fn comparisons_and_type_tests_are_boolean() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let x = b.load_int(1);
        let y = b.load_float(2.0);
        let c = b.emit(CompareOp(Comparators::LessThan), vec![x, y]).0[0];
        assert_eq!(b.type_of(c), Boolean);

        let o = b.emit(CreateObject(vec![]), vec![]).0[0];
        let t = b.emit(TestInstanceOf(), vec![x, o]).0[0];
        assert_eq!(b.type_of(t), Boolean);
        let i = b.emit(TestIn(), vec![y, o]).0[0];
        assert_eq!(b.type_of(i), Boolean);

        let n = b.emit(TypeOf(), vec![x]).0[0];
        assert_eq!(b.type_of(n), String);
    }

    #[test]
    fn ternary_unions_its_arms() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let cond = b.load_int(1);
        let x = b.load_string("a");
        let y = b.load_float(1.0);
        let r = b.emit(TernaryOp(), vec![cond, x, y]).0[0];
        assert_eq!(b.type_of(r), String | Float);
    }

    #[test]
    fn if_with_else_replaces_the_pre_state() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(42);
        b.begin_if(v);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.begin_else();
        let f = b.load_float(1.5);
        b.reassign(v, f);
        b.end_if();

        assert_eq!(b.type_of(v), String | Float);
    }

    #[test]
    fn if_without_else_keeps_the_pre_state() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(42);
        b.begin_if(v);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.end_if();

        assert_eq!(b.type_of(v), Integer | String);
    }

    #[test]
    fn one_silent_arm_keeps_the_pre_state() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(42);
        b.begin_if(v);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.begin_else();
        b.emit(Nop(), vec![]);
        b.end_if();

        assert_eq!(b.type_of(v), Integer | String);
    }

    #[test]
    fn loops_merge_with_the_pre_state() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);
        b.emit(BeginWhileLoop(), vec![v]);
        let s = b.load_string("s");
        b.reassign(v, s);
        let f = b.load_float(0.5);
        b.reassign(v, f);
        b.emit(EndWhileLoop(), vec![]);

        // Only the body-final type joins the pre-loop type.
        assert_eq!(b.type_of(v), Integer | Float);
    }

    #[test]
    fn loop_variables_are_bound_per_loop_kind() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let start = b.load_int(0);
        let end = b.load_int(10);
        let step = b.load_int(1);
        let (_, temps) = b.emit(BeginForLoop(), vec![start, end, step]);
        assert_eq!(b.type_of(temps[0]), Primitive);
        b.emit(EndForLoop(), vec![]);

        let o = b.emit(CreateObject(vec![]), vec![]).0[0];
        let (_, temps) = b.emit(BeginForInLoop(), vec![o]);
        assert_eq!(b.type_of(temps[0]), String);
        b.emit(EndForInLoop(), vec![]);

        let (_, temps) = b.emit(BeginForOfLoop(), vec![o]);
        assert_eq!(b.type_of(temps[0]), Unknown);
        b.emit(EndForOfLoop(), vec![]);

        let (_, temps) = b.emit(BeginRepeatLoop(10), vec![]);
        assert_eq!(b.type_of(temps[0]), Integer);
        b.emit(EndRepeatLoop(), vec![]);
    }

    #[test]
    fn switch_without_default_keeps_the_pre_state() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);
        let c1 = b.load_int(1);
        let c2 = b.load_int(2);
        b.emit(BeginSwitch(), vec![v]);
        b.emit(BeginSwitchCase(), vec![c1]);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.emit(EndSwitchCase(), vec![]);
        b.emit(BeginSwitchCase(), vec![c2]);
        let f = b.load_float(1.0);
        b.reassign(v, f);
        b.emit(EndSwitchCase(), vec![]);
        b.emit(EndSwitch(), vec![]);

        assert_eq!(b.type_of(v), Integer | String | Float);
    }

    #[test]
    fn switch_with_default_covers_all_paths() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);
        let c1 = b.load_int(1);
        b.emit(BeginSwitch(), vec![v]);
        b.emit(BeginSwitchCase(), vec![c1]);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.emit(EndSwitchCase(), vec![]);
        b.emit(BeginSwitchDefaultCase(), vec![]);
        let f = b.load_float(1.0);
        b.reassign(v, f);
        b.emit(EndSwitchCase(), vec![]);
        b.emit(EndSwitch(), vec![]);

        assert_eq!(b.type_of(v), String | Float);
    }

    #[test]
    fn try_catch_finally_are_all_may_execute() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);
        b.emit(BeginTry(), vec![]);
        let s = b.load_string("s");
        b.reassign(v, s);
        let (_, temps) = b.emit(BeginCatch(), vec![]);
        assert_eq!(b.type_of(temps[0]), Unknown);
        let f = b.load_float(1.0);
        b.reassign(v, f);
        b.emit(BeginFinally(), vec![]);
        b.emit(Nop(), vec![]);
        b.emit(EndTryCatch(), vec![]);

        assert_eq!(b.type_of(v), Integer | String | Float);
    }

    #[test]
    fn object_literals_accumulate_their_shape() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        b.emit(BeginObjectLiteral(), vec![]);

        let value = b.load_int(1);
        b.emit(ObjectLiteralAddProperty("a".to_string()), vec![value]);

        b.emit(
            BeginObjectLiteralMethod {
                name: "m".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndObjectLiteralMethod(), vec![]);

        b.emit(BeginObjectLiteralGetter("b".to_string()), vec![]);
        b.emit(EndObjectLiteralGetter(), vec![]);

        b.emit(BeginObjectLiteralSetter("c".to_string()), vec![]);
        b.emit(EndObjectLiteralSetter(), vec![]);

        let element = b.load_int(9);
        b.emit(ObjectLiteralAddElement(0), vec![element]);

        let (outputs, _) = b.emit(EndObjectLiteral(), vec![]);

        assert_eq!(
            b.type_of(outputs[0]),
            Type::object_with(["a", "b", "c"], ["m"], None)
        );
    }

    #[test]
    fn method_bodies_see_their_own_name_getters_do_not() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        b.emit(BeginObjectLiteral(), vec![]);

        b.emit(
            BeginObjectLiteralMethod {
                name: "m".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        let this_in_method = b.load_this();
        assert!(b.type_of(this_in_method).shape().unwrap().methods().contains("m"));
        b.emit(EndObjectLiteralMethod(), vec![]);

        b.emit(BeginObjectLiteralGetter("g".to_string()), vec![]);
        let this_in_getter = b.load_this();
        let shape = b.type_of(this_in_getter);
        let shape = shape.shape().unwrap();
        assert!(shape.methods().contains("m"));
        assert!(!shape.properties().contains("g"));
        b.emit(EndObjectLiteralGetter(), vec![]);

        b.emit(EndObjectLiteral(), vec![]);
    }

    #[test]
    fn create_object_ignores_integer_keys() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let x = b.load_int(1);
        let y = b.load_int(2);
        let z = b.load_int(3);
        let (outputs, _) = b.emit(
            CreateObject(vec!["a".to_string(), "0".to_string(), "b".to_string()]),
            vec![x, y, z],
        );
        assert_eq!(
            b.type_of(outputs[0]),
            Type::object_with(["a", "b"], [], None)
        );
    }

    #[test]
    fn property_writes_reshape_the_receiver() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let o = b.emit(CreateObject(vec![]), vec![]).0[0];
        let v = b.load_int(1);
        b.emit(SetProperty("p".to_string()), vec![o, v]);
        assert!(b.type_of(o).shape().unwrap().properties().contains("p"));

        b.emit(DeleteProperty("p".to_string()), vec![o]);
        assert!(!b.type_of(o).shape().unwrap().properties().contains("p"));
    }

    #[test]
    fn conditional_property_writes_do_not_survive_the_merge() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let o = b.emit(CreateObject(vec![]), vec![]).0[0];
        let cond = b.load_int(1);
        b.begin_if(cond);
        let v = b.load_int(2);
        b.emit(SetProperty("p".to_string()), vec![o, v]);
        b.end_if();

        // The property only exists on one path, so the shape may not
        // carry it afterwards.
        assert!(!b.type_of(o).shape().unwrap().properties().contains("p"));
    }

    #[test]
    fn elements_are_opaque() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let a = b.emit(CreateArray(0), vec![]).0[0];
        assert_eq!(b.type_of(a), Iterable + Object);

        let i = b.load_int(0);
        let e = b.emit(GetElement(), vec![a, i]).0[0];
        assert_eq!(b.type_of(e), Unknown);

        let v = b.load_int(1);
        b.emit(SetElement(), vec![a, i, v]);
        assert_eq!(b.type_of(a), Iterable + Object);
    }

    #[test]
    fn environment_groups_drive_property_types() {
        let mut env = StubEnvironment::new();
        env.register_builtin("B", Type::object_with([], [], Some("B")));
        env.register_property(Some("B"), "foo", Float);
        let mut b = TestBuilder::new(&env);

        let known = b.load_builtin("B");
        let p = b.get_property("foo", known);
        assert_eq!(b.type_of(p), Float);

        let unknown = b.load_builtin("C");
        assert_eq!(b.type_of(unknown), Unknown);
        let q = b.get_property("foo", unknown);
        assert_eq!(b.type_of(q), Unknown);
    }

    #[test]
    fn declared_properties_yield_to_group_knowledge() {
        let mut env = StubEnvironment::new();
        env.register_builtin("B", Type::object_with([], [], Some("B")));
        env.register_property(Some("B"), "foo", Float);
        env.register_property(None, "baz", Null);
        let mut b = TestBuilder::new(&env);

        b.typer.set_property_type("foo", Integer);
        b.typer.set_property_type("bar", String);

        let grouped = b.load_builtin("B");
        let plain = b.emit(CreateObject(vec![]), vec![]).0[0];

        // Per-group entry wins over the declaration...
        let p = b.get_property("foo", grouped);
        assert_eq!(b.type_of(p), Float);
        // ...the declaration fills per-group misses...
        let q = b.get_property("bar", grouped);
        assert_eq!(b.type_of(q), String);
        // ...and applies to group-less receivers too.
        let r = b.get_property("foo", plain);
        assert_eq!(b.type_of(r), Integer);
        // The environment's global table is the last resort.
        let s = b.get_property("baz", plain);
        assert_eq!(b.type_of(s), Null);
        let t = b.get_property("quux", plain);
        assert_eq!(b.type_of(t), Unknown);
    }

    #[test]
    fn method_calls_resolve_against_the_environment() {
        let mut env = StubEnvironment::new();
        env.register_builtin("B", Type::object_with([], [], Some("B")));
        env.register_method(Some("B"), "m", FunctionSignature::returning(Float));
        let mut b = TestBuilder::new(&env);

        b.typer
            .set_method_signature("m", FunctionSignature::returning(String));

        let grouped = b.load_builtin("B");
        let r = b.emit(
            CallMethod {
                name: "m".to_string(),
                num_arguments: 0,
            },
            vec![grouped],
        );
        assert_eq!(b.type_of(r.0[0]), Float);

        let plain = b.emit(CreateObject(vec![]), vec![]).0[0];
        let r = b.emit(
            CallMethod {
                name: "m".to_string(),
                num_arguments: 0,
            },
            vec![plain],
        );
        assert_eq!(b.type_of(r.0[0]), String);

        let r = b.emit(
            CallMethod {
                name: "nope".to_string(),
                num_arguments: 0,
            },
            vec![plain],
        );
        assert_eq!(b.type_of(r.0[0]), Unknown);
    }

    #[test]
    fn destructuring_resolves_per_property() {
        let mut env = StubEnvironment::new();
        env.register_builtin("B", Type::object_with([], [], Some("B")));
        env.register_property(Some("B"), "foo", Float);
        let mut b = TestBuilder::new(&env);

        let o = b.load_builtin("B");
        let (outputs, _) = b.emit(
            DestructObject {
                properties: vec!["foo".to_string(), "nope".to_string()],
                has_rest_element: true,
            },
            vec![o],
        );
        assert_eq!(b.type_of(outputs[0]), Float);
        assert_eq!(b.type_of(outputs[1]), Unknown);
        assert_eq!(b.type_of(outputs[2]), Object);
    }

    #[test]
    fn function_flavours_and_parameter_bindings() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let sig = FunctionSignature::new(
            [
                Param::Plain(Integer),
                Param::Optional(String),
                Param::Rest(Anything),
            ],
            Float,
        );

        let (outputs, temps) = b.emit(BeginPlainFunction(sig.clone()), vec![]);
        let f = outputs[0];
        assert_eq!(b.type_of(temps[0]), Integer);
        assert_eq!(b.type_of(temps[1]), String | Undefined);
        assert_eq!(b.type_of(temps[2]), Object);
        b.emit(EndPlainFunction(), vec![]);
        assert_eq!(b.type_of(f), Type::function_and_constructor(sig.clone()));

        let (outputs, _) = b.emit(BeginArrowFunction(sig.clone()), vec![]);
        b.emit(EndArrowFunction(), vec![]);
        assert_eq!(b.type_of(outputs[0]), Type::function(sig.clone()));

        let (outputs, _) = b.emit(BeginAsyncGeneratorFunction(sig.clone()), vec![]);
        b.emit(EndAsyncGeneratorFunction(), vec![]);
        assert_eq!(b.type_of(outputs[0]), Type::function(sig.clone()));

        let r = b.emit(CallFunction(0), vec![f]).0[0];
        assert_eq!(b.type_of(r), Float);
    }

    #[test]
    fn explicit_constructors_construct_objects() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let sig = FunctionSignature::new([Param::Plain(Integer)], Undefined);
        let (outputs, temps) = b.emit(BeginConstructor(sig.clone()), vec![]);
        let c = outputs[0];
        // temps[0] is the explicit |this|.
        assert_eq!(b.type_of(temps[0]), Object);
        assert_eq!(b.type_of(temps[1]), Integer);
        b.emit(EndConstructor(), vec![]);

        assert_eq!(
            b.type_of(c),
            Type::constructor(sig.with_return_type(Object))
        );

        let arg = b.load_int(0);
        let r = b.emit(Construct(1), vec![c, arg]).0[0];
        assert_eq!(b.type_of(r), Object);

        // Constructing something without a construct signature still
        // yields an object.
        let opaque = b.load_builtin("whatever");
        let r = b.emit(Construct(0), vec![opaque]).0[0];
        assert_eq!(b.type_of(r), Object);
    }

    #[test]
    fn free_variable_writes_in_bodies_are_may_execute() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);
        b.emit(BeginPlainFunction(no_args()), vec![]);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.emit(EndPlainFunction(), vec![]);

        assert_eq!(b.type_of(v), Integer | String);
    }

    #[test]
    fn return_types_accumulate_per_body() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        assert_eq!(b.typer.current_return_type(), Unknown);

        b.emit(BeginPlainFunction(FunctionSignature::returning(Nothing)), vec![]);
        assert_eq!(b.typer.current_return_type(), Nothing);

        let i = b.load_int(1);
        b.emit(Return(), vec![i]);
        assert_eq!(b.typer.current_return_type(), Integer);

        // An inner body accumulates independently.
        b.emit(BeginArrowFunction(FunctionSignature::returning(Nothing)), vec![]);
        let s = b.load_string("s");
        b.emit(Return(), vec![s]);
        assert_eq!(b.typer.current_return_type(), String);
        b.emit(EndArrowFunction(), vec![]);

        assert_eq!(b.typer.current_return_type(), Integer);
        b.emit(EndPlainFunction(), vec![]);
        assert_eq!(b.typer.current_return_type(), Unknown);
    }

    #[test]
    fn yield_and_await_are_opaque() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        b.emit(BeginAsyncFunction(no_args()), vec![]);
        let p = b.load_int(1);
        let r = b.emit(Await(), vec![p]).0[0];
        assert_eq!(b.type_of(r), Unknown);
        b.emit(EndAsyncFunction(), vec![]);

        b.emit(BeginGeneratorFunction(no_args()), vec![]);
        let v = b.load_int(2);
        let r = b.emit(Yield(), vec![v]).0[0];
        assert_eq!(b.type_of(r), Unknown);
        b.emit(EndGeneratorFunction(), vec![]);
    }

    #[test]
    fn this_is_a_plain_object_outside_members() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);
        let t = b.load_this();
        assert_eq!(b.type_of(t), Object);

        let a = b.emit(LoadArguments(), vec![]).0[0];
        assert_eq!(b.type_of(a), Iterable + Object);
    }

    #[test]
    fn nested_functions_rebind_this_but_arrows_inherit_it() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        b.emit(BeginObjectLiteral(), vec![]);
        b.emit(
            BeginObjectLiteralMethod {
                name: "m".to_string(),
                signature: no_args(),
            },
            vec![],
        );

        // A plain function nested in the method gets a call-site `this`,
        // so only a plain object can be assumed.
        b.emit(BeginPlainFunction(no_args()), vec![]);
        let inner = b.load_this();
        assert_eq!(b.type_of(inner), Object);
        b.emit(EndPlainFunction(), vec![]);

        // Generators and async functions rebind the same way.
        b.emit(BeginGeneratorFunction(no_args()), vec![]);
        let inner = b.load_this();
        assert_eq!(b.type_of(inner), Object);
        b.emit(EndGeneratorFunction(), vec![]);

        // An arrow keeps the lexical `this` of the enclosing method.
        b.emit(BeginArrowFunction(no_args()), vec![]);
        let lexical = b.load_this();
        assert!(b.type_of(lexical).shape().unwrap().methods().contains("m"));
        b.emit(EndArrowFunction(), vec![]);

        // Back in the method body the member binding is restored.
        let outer = b.load_this();
        assert!(b.type_of(outer).shape().unwrap().methods().contains("m"));

        b.emit(EndObjectLiteralMethod(), vec![]);
        b.emit(EndObjectLiteral(), vec![]);
    }

    #[test]
    fn class_values_carry_statics_and_a_construct_signature() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let (outputs, _) = b.emit(
            BeginClassDefinition {
                has_superclass: false,
            },
            vec![],
        );
        let class = outputs[0];

        b.emit(
            ClassAddInstanceProperty {
                name: "a".to_string(),
                has_value: false,
            },
            vec![],
        );
        b.emit(
            ClassAddInstanceProperty {
                name: "b".to_string(),
                has_value: false,
            },
            vec![],
        );

        b.emit(
            BeginClassInstanceMethod {
                name: "f".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassInstanceMethod(), vec![]);

        b.emit(BeginClassInstanceGetter("c".to_string()), vec![]);
        b.emit(EndClassInstanceGetter(), vec![]);

        b.emit(
            BeginClassInstanceMethod {
                name: "g".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassInstanceMethod(), vec![]);

        b.emit(
            BeginClassConstructor(FunctionSignature::new(
                [Param::Plain(String)],
                Undefined,
            )),
            vec![],
        );
        b.emit(EndClassConstructor(), vec![]);

        b.emit(
            ClassAddStaticProperty {
                name: "a".to_string(),
                has_value: false,
            },
            vec![],
        );
        b.emit(
            ClassAddStaticProperty {
                name: "d".to_string(),
                has_value: false,
            },
            vec![],
        );

        b.emit(
            BeginClassStaticMethod {
                name: "g".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassStaticMethod(), vec![]);

        b.emit(BeginClassStaticSetter("e".to_string()), vec![]);
        b.emit(EndClassStaticSetter(), vec![]);

        b.emit(
            BeginClassStaticMethod {
                name: "h".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassStaticMethod(), vec![]);

        b.emit(EndClassDefinition(), vec![]);

        let expected = Type::object_with(["a", "d", "e"], ["g", "h"], None)
            + Type::constructor(FunctionSignature::new(
                [Param::Plain(String)],
                Type::object_with(["a", "b", "c"], ["f", "g"], None),
            ));
        assert_eq!(b.type_of(class), expected);

        // Constructing the class yields the instance shape.
        let arg = b.load_string("x");
        let instance = b.emit(Construct(1), vec![class, arg]).0[0];
        assert_eq!(
            b.type_of(instance),
            Type::object_with(["a", "b", "c"], ["f", "g"], None)
        );
    }

    #[test]
    fn classes_without_a_constructor_still_construct() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let (outputs, _) = b.emit(
            BeginClassDefinition {
                has_superclass: false,
            },
            vec![],
        );
        b.emit(
            ClassAddInstanceProperty {
                name: "p".to_string(),
                has_value: false,
            },
            vec![],
        );
        b.emit(EndClassDefinition(), vec![]);

        let instance = b.emit(Construct(0), vec![outputs[0]]).0[0];
        assert_eq!(b.type_of(instance), Type::object_with(["p"], [], None));
    }

    #[test]
    fn private_members_stay_invisible() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let (outputs, _) = b.emit(
            BeginClassDefinition {
                has_superclass: false,
            },
            vec![],
        );

        b.emit(
            BeginClassInstanceMethod {
                name: "m".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassInstanceMethod(), vec![]);

        b.emit(
            BeginClassPrivateInstanceMethod {
                name: "secret".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        // The private body still sees everything declared so far.
        let this = b.load_this();
        let this_type = b.type_of(this);
        let shape = this_type.shape().unwrap();
        assert!(shape.methods().contains("m"));
        assert!(!shape.methods().contains("secret"));
        b.emit(EndClassPrivateInstanceMethod(), vec![]);

        b.emit(EndClassDefinition(), vec![]);

        let instance = b.emit(Construct(0), vec![outputs[0]]).0[0];
        let instance_type = b.type_of(instance);
        let shape = instance_type.shape().unwrap();
        assert!(shape.methods().contains("m"));
        assert!(!shape.methods().contains("secret"));
    }

    #[test]
    fn super_types_follow_the_class_nesting() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        // class A { ip; static sm() {} }
        let (outputs, _) = b.emit(
            BeginClassDefinition {
                has_superclass: false,
            },
            vec![],
        );
        let a = outputs[0];
        b.emit(
            ClassAddInstanceProperty {
                name: "ip".to_string(),
                has_value: false,
            },
            vec![],
        );
        b.emit(
            BeginClassStaticMethod {
                name: "sm".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        b.emit(EndClassStaticMethod(), vec![]);
        b.emit(EndClassDefinition(), vec![]);

        // class B extends A { m() {} }
        b.emit(
            BeginClassDefinition {
                has_superclass: true,
            },
            vec![a],
        );
        b.emit(
            BeginClassInstanceMethod {
                name: "m".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        assert_eq!(
            b.typer.current_super_type(),
            Type::object_with(["ip"], [], None)
        );
        assert_eq!(b.typer.current_super_constructor_type(), b.type_of(a));
        b.emit(EndClassInstanceMethod(), vec![]);
        b.emit(EndClassDefinition(), vec![]);

        // Derived members are not inherited into the reported shape, and
        // the super queries stop answering outside the definition.
        assert_eq!(b.typer.current_super_type(), Unknown);
        assert_eq!(b.typer.current_super_constructor_type(), Unknown);
    }

    #[test]
    fn static_initializers_accumulate_without_obliterating() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(0);

        b.emit(
            BeginClassDefinition {
                has_superclass: false,
            },
            vec![],
        );

        b.emit(
            BeginClassStaticMethod {
                name: "g".to_string(),
                signature: no_args(),
            },
            vec![],
        );
        let s = b.load_string("s");
        b.reassign(v, s);
        b.emit(EndClassStaticMethod(), vec![]);

        b.emit(BeginClassStaticInitializer(), vec![]);
        // The initializer sees the statics declared before it.
        let this = b.load_this();
        assert!(b.type_of(this).shape().unwrap().methods().contains("g"));
        let f = b.load_float(1.0);
        b.reassign(v, f);
        b.emit(EndClassStaticInitializer(), vec![]);

        b.emit(EndClassDefinition(), vec![]);

        // The earlier method-body write survives next to the
        // initializer's.
        assert_eq!(b.type_of(v), Integer | String | Float);
    }

    #[test]
    fn update_reassigns_with_the_binary_rules() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let v = b.load_int(1);
        let w = b.load_int(2);
        b.emit(Update(BinaryOperators::Add), vec![v, w]);
        assert_eq!(b.type_of(v), Number);

        let x = b.load_bigint(1);
        let y = b.load_bigint(2);
        b.emit(Update(BinaryOperators::Mul), vec![x, y]);
        assert_eq!(b.type_of(x), BigInt);
    }

    #[test]
    fn querying_a_never_defined_variable_widens_to_unknown() {
        let env = StubEnvironment::new();
        let b = TestBuilder::new(&env);
        assert_eq!(b.type_of(Variable(1234)), Unknown);
    }

    fn run_branching_scenario(b: &mut TestBuilder) -> Type {
        let v = b.load_int(42);
        b.begin_if(v);
        let s = b.load_string("s");
        b.reassign(v, s);
        b.begin_else();
        let f = b.load_float(1.5);
        b.reassign(v, f);
        b.end_if();
        b.type_of(v)
    }

    #[test]
    fn replaying_a_program_after_reset_is_idempotent() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);

        let first = run_branching_scenario(&mut b);
        b.typer.reset();
        let second = run_branching_scenario(&mut b);

        assert_eq!(first, second);
        // And the old variables are gone.
        assert_eq!(b.type_of(Variable(0)), Unknown);
    }

    #[test]
    #[should_panic(expected = "without a matching")]
    fn unbalanced_block_ends_abort() {
        let env = StubEnvironment::new();
        let mut b = TestBuilder::new(&env);
        b.end_if();
    }
}
