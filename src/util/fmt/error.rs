use std::fmt;

use crate::{codegen, lexer, macros, parser, token::Spanned};

impl fmt::Display for Spanned<lexer::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use lexer::Error::*;
        match error {
            UnexpectedChar => write!(f, "unexpected character"),
            UnclosedString => write!(f, "unclosed string literal"),
            MalformedNumber => write!(f, "malformed number literal"),
        }
    }
}

impl fmt::Display for Spanned<parser::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use parser::Error::*;
        match error {
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            Unexpected { actual, expected } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            UnexpectedAny { actual, expected } => {
                write!(f, "expected one of {expected:?}, but got {actual:?}")
            }
            MissingEnd { actual } => write!(f, "missing `end`, but got {actual:?}"),
            ExpectedIdent { actual } => {
                write!(f, "expected an identifier, but got {actual:?}")
            }
            ExpectedTypeName { actual } => {
                write!(f, "expected a type name, but got {actual:?}")
            }
            ExpectedImportPath { actual } => {
                write!(f, "expected an import path string, but got {actual:?}")
            }
            InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            InvalidCallee => write!(f, "invalid call target"),
            TrailingTokens { token } => {
                write!(f, "trailing tokens after `end`: {token:?}")
            }
        }
    }
}

impl fmt::Display for Spanned<macros::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use macros::Error::*;
        match error {
            Undefined { name } => write!(f, "undefined macro {name}"),
            ArityMismatch {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "incorrect number of arguments to macro {name}: \
                    expected {expected}, but got {actual}"
                )
            }
            Duplicate {
                name,
                other_definition_span,
            } => {
                write!(f, "macro {name} already defined at {other_definition_span}")
            }
            DepthExceeded { name } => {
                write!(
                    f,
                    "maximum expansion depth exceeded while expanding macro {name}"
                )
            }
            DefinitionNotTopLevel => {
                write!(f, "macro definitions are only allowed at the top level")
            }
        }
    }
}

impl fmt::Display for Spanned<codegen::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use codegen::Error::*;
        match error {
            UndeclaredIdentifier { name } => {
                write!(f, "use of undeclared identifier {name}")
            }
            AssignToConst { name } => write!(f, "cannot assign to const binding {name}"),
            TypeMismatch { op, lhs, rhs } => {
                write!(
                    f,
                    "operator {op:?} applied to mismatched operands: {lhs} and {rhs}"
                )
            }
            DuplicateDeclaration {
                name,
                other_definition_span,
            } => {
                write!(f, "{name} already defined at {other_definition_span}")
            }
            ItemNotTopLevel => {
                write!(
                    f,
                    "function and struct definitions are only allowed at the top level"
                )
            }
        }
    }
}
