/// The flat list of every operation the IL knows. The typer dispatches its
/// transfer functions on this enum; keep it in sync with the structs in
/// `operation.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcodes {
    Nop,

    // Constants
    LoadInt,
    LoadFloat,
    LoadString,
    LoadBool,
    LoadBigInt,
    LoadRegExp,
    LoadNull,
    LoadUndefined,
    LoadThis,
    LoadArguments,
    LoadBuiltin,

    // Expressions
    BinaryOp,
    UnaryOp,
    CompareOp,
    TypeOf,
    TestInstanceOf,
    TestIn,
    TernaryOp,
    Reassign,
    Update,

    // Objects and properties
    CreateObject,
    CreateArray,
    GetProperty,
    SetProperty,
    DeleteProperty,
    GetElement,
    SetElement,
    GetComputedProperty,
    SetComputedProperty,
    DestructObject,

    // Calls
    CallFunction,
    CallMethod,
    Construct,

    // Functions
    BeginPlainFunction,
    EndPlainFunction,
    BeginArrowFunction,
    EndArrowFunction,
    BeginGeneratorFunction,
    EndGeneratorFunction,
    BeginAsyncFunction,
    EndAsyncFunction,
    BeginAsyncArrowFunction,
    EndAsyncArrowFunction,
    BeginAsyncGeneratorFunction,
    EndAsyncGeneratorFunction,
    BeginConstructor,
    EndConstructor,
    Return,
    Yield,
    Await,

    // Class definitions
    BeginClassDefinition,
    EndClassDefinition,
    BeginClassConstructor,
    EndClassConstructor,
    ClassAddInstanceProperty,
    BeginClassInstanceMethod,
    EndClassInstanceMethod,
    BeginClassInstanceGetter,
    EndClassInstanceGetter,
    BeginClassInstanceSetter,
    EndClassInstanceSetter,
    BeginClassPrivateInstanceMethod,
    EndClassPrivateInstanceMethod,
    ClassAddStaticProperty,
    BeginClassStaticMethod,
    EndClassStaticMethod,
    BeginClassStaticGetter,
    EndClassStaticGetter,
    BeginClassStaticSetter,
    EndClassStaticSetter,
    BeginClassPrivateStaticMethod,
    EndClassPrivateStaticMethod,
    BeginClassStaticInitializer,
    EndClassStaticInitializer,

    // Object literals
    BeginObjectLiteral,
    EndObjectLiteral,
    ObjectLiteralAddProperty,
    ObjectLiteralAddElement,
    BeginObjectLiteralMethod,
    EndObjectLiteralMethod,
    BeginObjectLiteralGetter,
    EndObjectLiteralGetter,
    BeginObjectLiteralSetter,
    EndObjectLiteralSetter,

    // Control flow
    BeginIf,
    BeginElse,
    EndIf,
    BeginWhileLoop,
    EndWhileLoop,
    BeginDoWhileLoop,
    EndDoWhileLoop,
    BeginForLoop,
    EndForLoop,
    BeginForInLoop,
    EndForInLoop,
    BeginForOfLoop,
    EndForOfLoop,
    BeginRepeatLoop,
    EndRepeatLoop,
    BeginSwitch,
    BeginSwitchCase,
    BeginSwitchDefaultCase,
    EndSwitchCase,
    EndSwitch,
    BeginTry,
    BeginCatch,
    BeginFinally,
    EndTryCatch,
    Break,
    Continue,
}
