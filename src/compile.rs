use std::fmt;

use crate::{
    codegen, ir, lexer, macros, parser,
    token::{FileId, Span, Spanned, TokenKind},
};

/// Runs the full pipeline over one source file: lex, parse, macro expansion
/// and lowering. Returns the IR unit, or every diagnostic the stages could
/// collect.
///
/// Stages run in order and a stage with errors stops the pipeline, so later
/// stages never see input that an earlier stage rejected. Lex and parse
/// errors are batched together since the parser already skips over error
/// tokens.
pub fn compile(src: &str, file: FileId) -> Result<ir::Unit, Vec<Diagnostic>> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    lexer::lex(src, file, &mut tokens);

    let mut diagnostics: Vec<Diagnostic> = tokens
        .iter()
        .filter_map(|token| match token.kind {
            TokenKind::Error(error) => Some(Diagnostic {
                span: token.span(),
                kind: ErrorKind::Lex(error),
            }),
            _ => None,
        })
        .collect();

    let root = match parser::parse_tokens(&tokens, file) {
        Ok(root) => root,
        Err((root, errors)) => {
            diagnostics.extend(errors.into_iter().map(Diagnostic::from));
            root
        }
    };
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let root = match macros::expand_program(root) {
        Ok(root) => root,
        Err((_, errors)) => {
            return Err(errors.into_iter().map(Diagnostic::from).collect());
        }
    };

    match codegen::lower(&root) {
        Ok(unit) => Ok(unit),
        Err((_, errors)) => Err(errors.into_iter().map(Diagnostic::from).collect()),
    }
}

/// A structured error from any stage: a span, a kind tag and (through
/// [`fmt::Display`]) a human readable message.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    Lex(lexer::Error),
    Syntax(parser::Error),
    Macro(macros::Error),
    Codegen(codegen::Error),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let span = self.span;
        write!(f, "{span}: ")?;
        // The message of each stage's error lives with that stage's `Display`
        // impl; the non-alternate form omits the span prefix.
        match &self.kind {
            ErrorKind::Lex(error) => write!(f, "lex error: {}", span.wrap(*error)),
            ErrorKind::Syntax(error) => {
                write!(f, "syntax error: {}", span.wrap(error.clone()))
            }
            ErrorKind::Macro(error) => {
                write!(f, "macro error: {}", span.wrap(error.clone()))
            }
            ErrorKind::Codegen(error) => {
                write!(f, "codegen error: {}", span.wrap(error.clone()))
            }
        }
    }
}

impl From<Spanned<parser::Error>> for Diagnostic {
    fn from(error: Spanned<parser::Error>) -> Diagnostic {
        Diagnostic {
            span: error.span,
            kind: ErrorKind::Syntax(error.inner),
        }
    }
}

impl From<Spanned<macros::Error>> for Diagnostic {
    fn from(error: Spanned<macros::Error>) -> Diagnostic {
        Diagnostic {
            span: error.span,
            kind: ErrorKind::Macro(error.inner),
        }
    }
}

impl From<Spanned<codegen::Error>> for Diagnostic {
    fn from(error: Spanned<codegen::Error>) -> Diagnostic {
        Diagnostic {
            span: error.span,
            kind: ErrorKind::Codegen(error.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::{compile, ErrorKind};
    use crate::token::FileId;

    fn diagnostics(src: &str) -> Vec<String> {
        compile(src, FileId(0))
            .expect_err("expected a failing compilation")
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn whole_pipeline_produces_a_unit() {
        let unit = compile(
            indoc! {"
                macro double(a) a + a end
                let x = double(5)
            "},
            FileId(0),
        )
        .expect("expected a successful compilation");
        assert_eq!(
            unit.to_string(),
            indoc! {"
                main:
                  s0 = const 5
                  s1 = const 5
                  s2 = add s0, s1
                  s3 = copy s2
            "}
        );
    }

    #[test]
    fn lex_errors_are_reported_from_the_token_stream() {
        // The parser skips over error tokens, so the missing operand is also
        // reported as a syntax error in the same batch.
        assert_eq!(
            diagnostics("let x = 'abc"),
            [
                "1:9: lex error: unclosed string literal",
                "1:13: syntax error: unexpected token Eof in expression",
            ]
        );
    }

    #[test]
    fn codegen_never_runs_after_a_parse_failure() {
        // `q` is undeclared, but only the syntax error must surface.
        assert_eq!(
            diagnostics("let = q"),
            ["1:5: syntax error: expected an identifier, but got Assign"]
        );
    }

    #[test]
    fn macro_errors_stop_the_pipeline() {
        assert_eq!(
            diagnostics("nope!(1)"),
            ["1:1: macro error: undefined macro nope"]
        );
    }

    #[test]
    fn codegen_errors_carry_their_kind_tag() {
        let errors = compile("x + 1", FileId(0)).expect_err("expected a failing compilation");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, ErrorKind::Codegen(_)));
        assert_eq!(
            errors[0].to_string(),
            "1:1: codegen error: use of undeclared identifier x"
        );
    }
}
