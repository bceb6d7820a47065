//! Holds the list of all binary and unary operators and comparators that
//! the IL is going to use. If a new operator is to be added, then make
//! changes to the appropriate enum in this module.

/// List of the known Binary Operators that we will be using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperators {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    LogicAnd,
    LogicOr,
    Xor,
    LShift,
    RShift,
}

impl BinaryOperators {
    pub fn rep(&self) -> &str {
        match *self {
            BinaryOperators::Add      => "+",
            BinaryOperators::Sub      => "-",
            BinaryOperators::Mul      => "*",
            BinaryOperators::Div      => "/",
            BinaryOperators::Mod      => "%",
            BinaryOperators::Exp      => "**",
            BinaryOperators::BitAnd   => "&",
            BinaryOperators::BitOr    => "|",
            BinaryOperators::LogicAnd => "&&",
            BinaryOperators::LogicOr  => "||",
            BinaryOperators::Xor      => "^",
            BinaryOperators::LShift   => "<<",
            BinaryOperators::RShift   => ">>",
        }
    }

    pub fn all() -> [BinaryOperators; 13] {
        [
            BinaryOperators::Add,
            BinaryOperators::Sub,
            BinaryOperators::Mul,
            BinaryOperators::Div,
            BinaryOperators::Mod,
            BinaryOperators::Exp,
            BinaryOperators::BitAnd,
            BinaryOperators::BitOr,
            BinaryOperators::LogicAnd,
            BinaryOperators::LogicOr,
            BinaryOperators::Xor,
            BinaryOperators::LShift,
            BinaryOperators::RShift,
        ]
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperators::LogicAnd | BinaryOperators::LogicOr)
    }
}

/// List of the known Unary Operators that we will be using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperators {
    Inc,
    Dec,
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

impl UnaryOperators {
    pub fn rep(&self) -> &str {
        match *self {
            UnaryOperators::Inc        => "++",
            UnaryOperators::Dec        => "--",
            UnaryOperators::Plus       => "+",
            UnaryOperators::Minus      => "-",
            UnaryOperators::LogicalNot => "!",
            UnaryOperators::BitwiseNot => "~",
        }
    }

    pub fn all() -> [UnaryOperators; 6] {
        [
            UnaryOperators::Inc,
            UnaryOperators::Dec,
            UnaryOperators::Plus,
            UnaryOperators::Minus,
            UnaryOperators::LogicalNot,
            UnaryOperators::BitwiseNot,
        ]
    }
}

/// List of the known Comparators that we will be using
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparators {
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparators {
    pub fn rep(&self) -> &str {
        match *self {
            Comparators::Equal              => "==",
            Comparators::StrictEqual        => "===",
            Comparators::NotEqual           => "!=",
            Comparators::StrictNotEqual     => "!==",
            Comparators::LessThan           => "<",
            Comparators::LessThanOrEqual    => "<=",
            Comparators::GreaterThan        => ">",
            Comparators::GreaterThanOrEqual => ">=",
        }
    }

    pub fn all() -> [Comparators; 8] {
        [
            Comparators::Equal,
            Comparators::StrictEqual,
            Comparators::NotEqual,
            Comparators::StrictNotEqual,
            Comparators::LessThan,
            Comparators::LessThanOrEqual,
            Comparators::GreaterThan,
            Comparators::GreaterThanOrEqual,
        ]
    }
}
