/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The macro evaluator collects top level macro definitions and rewrites
/// every invocation, leaving a macro-free AST.
pub mod macros;

/// The code generator lowers a macro-free AST into an IR unit.
pub mod codegen;

/// The whole pipeline behind one entry point, as used by the driver.
pub mod compile;

pub mod ast;
pub mod ir;
pub mod token;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
