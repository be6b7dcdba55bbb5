use crate::{
    ast::{
        Binding, BinaryOp, Block, Expr, ExprKind, Field, FnDef, Ident, MacroDef, MatchArm, Param,
        Stmt, StmtKind, StructDef, TypeRef, UnaryOp,
    },
    lexer,
    token::{FileId, Span, Spanned, Token, TokenKind},
};

type Result<T, E = ()> = std::result::Result<T, E>;

/// On failure, carries the best-effort tree alongside the batched errors.
pub type ParseResult<T> = Result<T, (T, Vec<Spanned<Error>>)>;

/// Lexes and parses the provided source into its root block.
pub fn parse_program(src: &str, file: FileId, tokens: &mut Vec<Token>) -> ParseResult<Block> {
    assert!(tokens.is_empty());
    lexer::lex(src, file, tokens);
    parse_tokens(tokens, file)
}

/// Parses an already lexed token sequence into its root block.
pub fn parse_tokens(tokens: &[Token], file: FileId) -> ParseResult<Block> {
    let mut p = Parser::new(tokens, file);
    let parse_result = p.parse_root();

    let success = parse_result.is_ok();
    let root = parse_result.unwrap_or_else(|()| Block {
        stmts: Vec::new(),
        span: p.eof_span,
    });
    if p.errors.is_empty() {
        assert!(success);
        Ok(root)
    } else {
        Err((root, p.errors))
    }
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
    eof_span: Span,
    errors: Vec<Spanned<Error>>,
}

impl Parser<'_> {
    /// Parses the top-level block, which is terminated by end-of-input. A
    /// single trailing `end` is also accepted as the root terminator.
    fn parse_root(&mut self) -> Result<Block> {
        let span = self.peek().span();
        let mut stmts = Vec::with_capacity(16);
        while self.except([TokenKind::End]) {
            if let Ok(stmt) = self.recover_stmt(&[]) {
                stmts.push(stmt);
            }
        }
        self.take(&TokenKind::End);
        let trailing = self.peek();
        if !trailing.is_eof() {
            let error = Error::TrailingTokens {
                token: trailing.kind.clone(),
            };
            self.error(trailing.span().wrap(error));
            return Err(());
        }
        Ok(Block { stmts, span })
    }

    /// Parses an `end`-terminated block of statements.
    fn parse_block(&mut self) -> Result<Block> {
        let span = self.peek().span();
        let mut stmts = Vec::with_capacity(4);
        while self.except([TokenKind::End]) {
            if let Ok(stmt) = self.recover_stmt(&[TokenKind::End]) {
                stmts.push(stmt);
            }
        }
        if !self.take(&TokenKind::End) {
            // `except` only stops at `end` or end-of-input.
            let at = self.peek();
            let error = Error::MissingEnd {
                actual: at.kind.clone(),
            };
            self.error(at.span().wrap(error));
            return Err(());
        }
        Ok(Block { stmts, span })
    }

    /// Parses one statement; on error, skips to the next statement boundary
    /// (a `;`, a statement keyword, a `stop` token, or end-of-input) so a
    /// single pass can collect several independent errors.
    fn recover_stmt(&mut self, stop: &[TokenKind]) -> Result<Stmt> {
        'outer: loop {
            if let Ok(stmt) = self.parse_stmt() {
                break Ok(stmt);
            }
            loop {
                let c = &self.peek().kind;
                if *c == TokenKind::Eof || stop.contains(c) {
                    break 'outer Err(());
                }
                // Statement keywords are resumption points; they are not
                // consumed. (`parse_stmt` always consumes at least one token
                // before failing, so this cannot loop.)
                if starts_stmt(c) {
                    continue 'outer;
                }
                let was_separator = *c == TokenKind::Semicolon;
                self.advance();
                if was_separator {
                    continue 'outer;
                }
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let span = self.peek().span();
        let kind = match self.peek().kind {
            TokenKind::Let => {
                self.advance();
                StmtKind::Let(self.parse_binding()?)
            }
            TokenKind::Const => {
                self.advance();
                StmtKind::Const(self.parse_binding()?)
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::If { cond, body }
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Match => self.parse_match()?,
            TokenKind::Fn => StmtKind::Fn(self.parse_fn()?),
            TokenKind::Struct => StmtKind::Struct(self.parse_struct()?),
            TokenKind::Import => {
                self.advance();
                StmtKind::Import {
                    path: self.parse_import_path()?,
                }
            }
            TokenKind::Macro => StmtKind::MacroDef(self.parse_macro_def()?),
            _ => StmtKind::Expr(self.parse_expr()?),
        };
        // `;` is an optional statement separator.
        self.take(&TokenKind::Semicolon);
        Ok(Stmt { kind, span })
    }

    /// for init ; cond ; step ... end
    fn parse_for(&mut self) -> Result<StmtKind> {
        self.advance(); // `for`
        let init_span = self.peek().span();
        let init_kind = if self.take(&TokenKind::Let) {
            StmtKind::Let(self.parse_binding()?)
        } else {
            StmtKind::Expr(self.parse_expr()?)
        };
        let init = Stmt {
            kind: init_kind,
            span: init_span,
        };
        self.consume(TokenKind::Semicolon)?;
        let cond = self.parse_expr()?;
        self.consume(TokenKind::Semicolon)?;
        let step = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(StmtKind::For {
            init: Box::new(init),
            cond,
            step,
            body,
        })
    }

    /// match scrutinee (pattern : expr ;?)* end
    fn parse_match(&mut self) -> Result<StmtKind> {
        self.advance(); // `match`
        let scrutinee = self.parse_expr()?;
        let mut arms = Vec::with_capacity(4);
        while self.except([TokenKind::End]) {
            let arm = self.synchronize(&[TokenKind::Semicolon], &[TokenKind::End], |p| {
                let pattern = p.parse_expr()?;
                p.consume(TokenKind::Colon)?;
                let body = p.parse_expr()?;
                p.take(&TokenKind::Semicolon);
                Ok(MatchArm { pattern, body })
            })?;
            arms.push(arm);
        }
        self.consume_end()?;
        Ok(StmtKind::Match { scrutinee, arms })
    }

    /// fn name(param : Type, ...) [: Type] ... end
    fn parse_fn(&mut self) -> Result<FnDef> {
        self.advance(); // `fn`
        let name = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, TokenKind::Comma, |p| {
            let name = p.parse_ident()?;
            p.consume(TokenKind::Colon)?;
            let ty = p.parse_type()?;
            Ok(Param { name, ty })
        })?;
        self.consume(TokenKind::RParen)?;
        let return_ty = if self.take(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FnDef {
            name,
            params,
            return_ty,
            body,
        })
    }

    /// struct Name (field : Type ;?)* end
    fn parse_struct(&mut self) -> Result<StructDef> {
        self.advance(); // `struct`
        let name = self.parse_type()?;
        let mut fields = Vec::with_capacity(4);
        while self.except([TokenKind::End]) {
            let field = self.synchronize(&[TokenKind::Semicolon], &[TokenKind::End], |p| {
                let name = p.parse_ident()?;
                p.consume(TokenKind::Colon)?;
                let ty = p.parse_type()?;
                p.take(&TokenKind::Semicolon);
                Ok(Field { name, ty })
            })?;
            fields.push(field);
        }
        self.consume_end()?;
        Ok(StructDef { name, fields })
    }

    /// macro name(param, ...) ... end
    fn parse_macro_def(&mut self) -> Result<MacroDef> {
        self.advance(); // `macro`
        let name = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let params =
            self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_ident)?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(MacroDef { name, params, body })
    }

    fn parse_binding(&mut self) -> Result<Binding> {
        let name = self.parse_ident()?;
        let ty = if self.take(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Binding { name, ty, value })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.peek();
        if let TokenKind::Ident(ref name) = token.kind {
            let ident = Ident {
                name: name.clone(),
                span: token.span(),
            };
            self.advance();
            Ok(ident)
        } else {
            let error = Error::ExpectedIdent {
                actual: token.kind.clone(),
            };
            self.error(token.span().wrap(error));
            Err(())
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef> {
        let token = self.peek();
        if let TokenKind::TypeName(ref name) = token.kind {
            let ty = TypeRef {
                name: name.clone(),
                span: token.span(),
            };
            self.advance();
            Ok(ty)
        } else {
            let error = Error::ExpectedTypeName {
                actual: token.kind.clone(),
            };
            self.error(token.span().wrap(error));
            Err(())
        }
    }

    fn parse_import_path(&mut self) -> Result<Box<str>> {
        let token = self.peek();
        if let TokenKind::Str(ref path) = token.kind {
            let path = path.clone();
            self.advance();
            Ok(path)
        } else {
            let error = Error::ExpectedImportPath {
                actual: token.kind.clone(),
            };
            self.error(token.span().wrap(error));
            Err(())
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let checkpoint = self.cursor;
        let lhs_token = self.advance();
        let mut lhs = match self.parse_nud(lhs_token) {
            Ok(lhs) => lhs,
            Err(()) => {
                // A statement keyword in expression position is handed back
                // to the statement-level recovery, which resumes at it.
                if self
                    .tokens
                    .get(checkpoint)
                    .is_some_and(|t| starts_stmt(&t.kind))
                {
                    self.cursor = checkpoint;
                }
                return Err(());
            }
        };

        loop {
            let op_token = self.peek();

            if let Some((lbp, rbp)) = infix_binding_power(&op_token.kind) {
                if lbp < min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }

                self.advance(); // Operator
                lhs = self.parse_led(op_token, lhs, rbp)?;
            } else {
                // Not an infix operator or binds too loosely
                break;
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expr> {
        let span = token.span();
        let kind = match token.kind {
            TokenKind::Ident(name) => ExprKind::Id(Ident { name, span }),
            TokenKind::Uint(value) => ExprKind::Uint(value),
            TokenKind::Sint(value) => ExprKind::Sint(value),
            TokenKind::Float(value) => ExprKind::Float(value),
            TokenKind::Str(value) => ExprKind::Str(value),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,

            // Grouping: ( expr )
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                ExprKind::Paren(Box::new(expr))
            }

            // Block-valued expression: do ... end
            TokenKind::Do => ExprKind::Do(self.parse_block()?),

            // Prefix operators: -, &
            kind @ (TokenKind::Minus | TokenKind::Ampersand) => {
                let op = match kind {
                    TokenKind::Minus => UnaryOp::Neg,
                    TokenKind::Ampersand => UnaryOp::AddrOf,
                    _ => unreachable!(),
                };
                let expr = self.parse_expr_bp(PREFIX_BP)?;
                ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                }
            }

            other => {
                let error = Error::UnexpectedTokenInExpr { token: other };
                self.error(span.wrap(error));
                return Err(());
            }
        };

        Ok(Expr { kind, span })
    }

    /// led: Parses tokens that follow a left-hand-side expression
    /// (infix/postfix operators)
    fn parse_led(&mut self, op_token: Token, lhs: Expr, rbp: u8) -> Result<Expr> {
        let span = lhs.span;
        let kind = match op_token.kind {
            // Binary operators
            kind @ (TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Eq
            | TokenKind::Less
            | TokenKind::Greater
            | TokenKind::LessEq
            | TokenKind::GreaterEq) => {
                let op = match kind {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Sub,
                    TokenKind::Star => BinaryOp::Mul,
                    TokenKind::Slash => BinaryOp::Div,
                    TokenKind::Eq => BinaryOp::Eq,
                    TokenKind::Less => BinaryOp::Lt,
                    TokenKind::Greater => BinaryOp::Gt,
                    TokenKind::LessEq => BinaryOp::Leq,
                    TokenKind::GreaterEq => BinaryOp::Geq,
                    _ => unreachable!(),
                };
                // Parse right operand with correct precedence
                let rhs = self.parse_expr_bp(rbp)?;
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }

            // Assignment: ID = expr
            TokenKind::Assign => {
                let ExprKind::Id(target) = lhs.kind else {
                    self.error(lhs.span.wrap(Error::InvalidAssignmentTarget));
                    return Err(());
                };
                let value = self.parse_expr_bp(rbp)?;
                ExprKind::Assign {
                    target,
                    value: Box::new(value),
                }
            }

            // Call: ID ( [expr [, expr]*] )
            TokenKind::LParen => {
                let ExprKind::Id(callee) = lhs.kind else {
                    self.error(lhs.span.wrap(Error::InvalidCallee));
                    return Err(());
                };
                let args =
                    self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
                self.consume(TokenKind::RParen)?;
                ExprKind::Call { callee, args }
            }

            // Macro invocation: ID ! ( [expr [, expr]*] )
            TokenKind::Bang => {
                let ExprKind::Id(name) = lhs.kind else {
                    self.error(lhs.span.wrap(Error::InvalidCallee));
                    return Err(());
                };
                self.consume(TokenKind::LParen)?;
                let args =
                    self.parse_list(TokenKind::RParen, TokenKind::Comma, Parser::parse_expr)?;
                self.consume(TokenKind::RParen)?;
                ExprKind::MacroCall { name, args }
            }

            // Indexing: expr [ expr ]
            TokenKind::LBracket => {
                let index = self.parse_expr()?;
                self.consume(TokenKind::RBracket)?;
                ExprKind::Index {
                    base: Box::new(lhs),
                    index: Box::new(index),
                }
            }

            _ => unreachable!("led called without infix binding power"),
        };

        Ok(Expr { kind, span })
    }

    /// Parses `item (delim item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        separator: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert!(!end_delim.same_kind(&separator));

        let mut items = Vec::new();
        while self.except([end_delim.clone()]) {
            let item = self.synchronize(
                std::slice::from_ref(&separator),
                std::slice::from_ref(&end_delim),
                &parse_item,
            )?;
            items.push(item);

            // After consuming an item, we must consume the separator.
            if !self.take(&separator) {
                if self.is(&end_delim) {
                    // If, however, it is not present, then we check if the end
                    // delimiter is current. If so, we can stop.
                    break;
                }
                // However, if the current token is not the separator nor
                // the end delimiter, we must return an error.
                let c = self.peek();
                let error = Error::UnexpectedAny {
                    actual: c.kind.clone(),
                    expected: Box::from([separator.clone(), end_delim.clone()]),
                };
                self.error(c.span().wrap(error));
            }
        }

        Ok(items)
    }
}

/// Binding powers for infix and postfix operators, low to high: assignment,
/// equality, relational, additive, multiplicative, postfix.
fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    let bp = match kind {
        // Assignment (right-associative)
        TokenKind::Assign => (2, 1),

        // Equality (left-associative)
        TokenKind::Eq => (3, 4),

        // Relational (left-associative)
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEq | TokenKind::GreaterEq => (5, 6),

        // Addition/Subtraction (left-associative)
        TokenKind::Plus | TokenKind::Minus => (7, 8),

        // Multiplication/Division (left-associative)
        TokenKind::Star | TokenKind::Slash => (9, 10),

        // Call / macro invocation / indexing (postfix)
        TokenKind::LParen | TokenKind::Bang | TokenKind::LBracket => (13, 14),

        _ => return None,
    };
    Some(bp)
}

/// Right binding power of the prefix operators (`-`, `&`): tighter than any
/// binary operator, looser than the postfix ones.
const PREFIX_BP: u8 = 11;

fn starts_stmt(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Let
            | TokenKind::Const
            | TokenKind::If
            | TokenKind::For
            | TokenKind::While
            | TokenKind::Match
            | TokenKind::Fn
            | TokenKind::Struct
            | TokenKind::Import
            | TokenKind::Macro
    )
}

impl Parser<'_> {
    fn new<'tok>(tokens: &'tok [Token], file: FileId) -> Parser<'tok> {
        // End-of-input position, approximated as the last token's start
        // column plus its character length. When that token spans lines (a
        // multi-line string literal) the column overshoots, since spans do
        // not record where a lexeme ends.
        let eof_span = tokens.last().map_or(Span::new(file, 1, 1, 0), |t| {
            let s = t.span();
            Span::new(file, s.line, s.col + s.len, 0)
        });
        let mut p = Parser {
            tokens,
            cursor: 0,
            eof_span,
            errors: Vec::with_capacity(8),
        };
        p.setup();
        p
    }

    /// Adds an error.
    fn error(&mut self, error: Spanned<Error>) {
        self.errors.push(error);
    }

    /// Setups the parser, skipping any error tokens. (They were already
    /// reported by the driver straight from the token stream.)
    fn setup(&mut self) {
        while self.peek().kind.is_error() {
            self.cursor += 1;
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => token.clone(),
            None => Token::new(TokenKind::Eof, self.eof_span),
        }
    }

    /// Returns the current token and advances. Skips any error tokens.
    fn advance(&mut self) -> Token {
        let c = self.peek(); // Before any advancement
        while {
            self.cursor += 1;
            self.peek().kind.is_error()
        } {}
        c
    }

    /// Checks whether the current token matches the given kind (payloads are
    /// not compared).
    fn is(&self, expect: &TokenKind) -> bool {
        self.peek().kind.same_kind(expect)
    }

    /// Advances if the current token matches the provided kind, returning
    /// true. If not, returns false and doesn't advance.
    fn take(&mut self, expect: &TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided kind. If not,
    /// records an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(&expect) {
            self.advance();
            Ok(c)
        } else {
            self.error(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }));
            Err(())
        }
    }

    /// Consumes a block terminator, reporting the dedicated missing-`end`
    /// error on failure.
    fn consume_end(&mut self) -> Result<Token> {
        let c = self.peek();
        if self.take(&TokenKind::End) {
            Ok(c)
        } else {
            self.error(c.span().wrap(Error::MissingEnd { actual: c.kind }));
            Err(())
        }
    }

    /// Returns true while the current token does *not* match one of the
    /// provided ones. [`TokenKind::Eof`] is implicitly included in the list.
    ///
    /// This won't advance the cursor.
    fn except(&mut self, except: impl IntoIterator<Item = TokenKind>) -> bool {
        let c = self.peek();
        for e in except {
            if c.kind.same_kind(&e) {
                return false;
            }
        }
        c.kind != TokenKind::Eof
    }

    fn synchronize<T>(
        &mut self,
        cont_cond: &[TokenKind],
        stop_cond: &[TokenKind],
        f: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<T> {
        'outer: loop {
            if let Ok(val) = f(self) {
                break Ok(val);
            }
            // In the case of an error, try to advance until find a token
            // specified in `cont_cond` (in which case we retry) or in
            // `stop_cond` (in which case we stop).
            loop {
                let c = self.peek().kind;
                // Check whether must stop
                if c == TokenKind::Eof || stop_cond.iter().any(|s| s.same_kind(&c)) {
                    break 'outer Err(());
                }
                // The token advancement must be AFTER stopping. If we break
                // out, the caller should advance (to follow the convention).
                self.advance();
                // Check whether can retry
                if cont_cond.iter().any(|s| s.same_kind(&c)) {
                    continue 'outer;
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An expression was mandatory, but the token cannot start one.
    UnexpectedTokenInExpr { token: TokenKind },
    /// A specific token kind was required.
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    /// A block is missing its `end` terminator.
    MissingEnd { actual: TokenKind },
    ExpectedIdent { actual: TokenKind },
    ExpectedTypeName { actual: TokenKind },
    ExpectedImportPath { actual: TokenKind },
    InvalidAssignmentTarget,
    InvalidCallee,
    TrailingTokens { token: TokenKind },
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::util::test_utils::{parse, parse_ok};

    #[test]
    fn precedence_tree() {
        // `1 + 2 * 3` must respect precedence: `*` binds under `+`.
        let tree = parse_ok("let x = 1 + 2 * 3 end");
        assert_eq!(
            tree,
            indoc! {"
                let x (1:1)
                  binary Add (1:9)
                    uint 1 (1:9)
                    binary Mul (1:13)
                      uint 2 (1:13)
                      uint 3 (1:17)
            "}
        );
    }

    #[test]
    fn left_associativity() {
        let tree = parse_ok("a - b - c");
        assert_eq!(
            tree,
            indoc! {"
                binary Sub (1:1)
                  binary Sub (1:1)
                    ident a (1:1)
                    ident b (1:5)
                  ident c (1:9)
            "}
        );
    }

    #[test]
    fn relational_binds_under_equality() {
        let tree = parse_ok("a < b == c < d");
        assert_eq!(
            tree,
            indoc! {"
                binary Eq (1:1)
                  binary Lt (1:1)
                    ident a (1:1)
                    ident b (1:5)
                  binary Lt (1:10)
                    ident c (1:10)
                    ident d (1:14)
            "}
        );
    }

    #[test]
    fn unary_and_postfix() {
        let tree = parse_ok("-f(x)[0]");
        assert_eq!(
            tree,
            indoc! {"
                unary Neg (1:1)
                  index (1:2)
                    call f (1:2)
                      ident x (1:4)
                    uint 0 (1:7)
            "}
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let tree = parse_ok("a = b = c + 1");
        assert_eq!(
            tree,
            indoc! {"
                assign a (1:1)
                  assign b (1:5)
                    binary Add (1:9)
                      ident c (1:9)
                      uint 1 (1:13)
            "}
        );
    }

    #[test]
    fn parenthesized_grouping() {
        let tree = parse_ok("(1 + 2) * 3");
        assert_eq!(
            tree,
            indoc! {"
                binary Mul (1:1)
                  paren (1:1)
                    binary Add (1:2)
                      uint 1 (1:2)
                      uint 2 (1:6)
                  uint 3 (1:11)
            "}
        );
    }

    #[test]
    fn let_with_type_annotation() {
        let tree = parse_ok("let x: Int = 1");
        assert_eq!(
            tree,
            indoc! {"
                let x: Int (1:1)
                  uint 1 (1:14)
            "}
        );
    }

    #[test]
    fn const_binding() {
        let tree = parse_ok("const pi = 3.5");
        assert_eq!(
            tree,
            indoc! {"
                const pi (1:1)
                  float 3.5 (1:12)
            "}
        );
    }

    #[test]
    fn if_and_while_blocks() {
        let tree = parse_ok(indoc! {"
            if x < 10
              x = x + 1
            end
            while true
              f()
            end
        "});
        assert_eq!(
            tree,
            indoc! {"
                if (1:1)
                  binary Lt (1:4)
                    ident x (1:4)
                    uint 10 (1:8)
                  body
                    assign x (2:3)
                      binary Add (2:7)
                        ident x (2:7)
                        uint 1 (2:11)
                while (4:1)
                  bool true (4:7)
                  body
                    call f (5:3)
            "}
        );
    }

    #[test]
    fn for_loop() {
        let tree = parse_ok("for let i = 0; i < 3; i = i + 1 f(i) end");
        assert_eq!(
            tree,
            indoc! {"
                for (1:1)
                  let i (1:5)
                    uint 0 (1:13)
                  binary Lt (1:16)
                    ident i (1:16)
                    uint 3 (1:20)
                  assign i (1:23)
                    binary Add (1:27)
                      ident i (1:27)
                      uint 1 (1:31)
                  body
                    call f (1:33)
                      ident i (1:35)
            "}
        );
    }

    #[test]
    fn match_statement() {
        let tree = parse_ok(indoc! {"
            match x
              1: f();
              _: g();
            end
        "});
        assert_eq!(
            tree,
            indoc! {"
                match (1:1)
                  ident x (1:7)
                  arm
                    uint 1 (2:3)
                    call f (2:6)
                  arm
                    ident _ (3:3)
                    call g (3:6)
            "}
        );
    }

    #[test]
    fn fn_struct_import_macro() {
        let tree = parse_ok(indoc! {"
            import 'math'
            struct Point
              x: Int;
              y: Int;
            end
            fn add(a: Int, b: Int): Int
              a + b
            end
            macro twice(e)
              e + e
            end
        "});
        assert_eq!(
            tree,
            indoc! {"
                import 'math' (1:1)
                struct Point (2:1)
                  field x: Int
                  field y: Int
                fn add(a: Int, b: Int): Int (6:1)
                  binary Add (7:3)
                    ident a (7:3)
                    ident b (7:7)
                macro twice(e) (9:1)
                  binary Add (10:3)
                    ident e (10:3)
                    ident e (10:7)
            "}
        );
    }

    #[test]
    fn do_block_expression() {
        let tree = parse_ok("let x = do f() 1 end");
        assert_eq!(
            tree,
            indoc! {"
                let x (1:1)
                  do (1:9)
                    call f (1:12)
                    uint 1 (1:16)
            "}
        );
    }

    #[test]
    fn macro_invocation_syntax() {
        let tree = parse_ok("double!(5)");
        assert_eq!(
            tree,
            indoc! {"
                macro-call double (1:1)
                  uint 5 (1:9)
            "}
        );
    }

    #[test]
    fn missing_end_points_at_end_of_input() {
        let (_, errors) = parse("if x < 1\n  f()");
        assert_eq!(errors, ["2:6: missing `end`, but got Eof"]);
    }

    #[test]
    fn end_of_input_column_counts_characters_of_the_last_token() {
        // The string literal spans two lines; the end-of-input column is its
        // start column plus its character count, not its on-screen end.
        let (_, errors) = parse("do 'a\nb'");
        assert_eq!(errors, ["1:9: missing `end`, but got Eof"]);
    }

    #[test]
    fn unexpected_token_where_kind_required() {
        let (_, errors) = parse("let 1 = 2");
        assert_eq!(errors, ["1:5: expected an identifier, but got Uint(1)"]);
    }

    #[test]
    fn empty_expression_where_mandatory() {
        let (_, errors) = parse("let x = ;");
        assert_eq!(
            errors,
            ["1:9: unexpected token Semicolon in expression"]
        );
    }

    #[test]
    fn multiple_independent_errors_in_one_pass() {
        let (_, errors) = parse(indoc! {"
            let = 1
            let ok = 2
            const = 3
        "});
        assert_eq!(
            errors,
            [
                "1:5: expected an identifier, but got Assign",
                "3:7: expected an identifier, but got Assign",
            ]
        );
    }

    #[test]
    fn recovery_resumes_at_statement_keyword() {
        let (tree, errors) = parse(indoc! {"
            let x = (1 +
            let y = 2
        "});
        assert_eq!(errors.len(), 1);
        // The second statement still parses.
        assert!(tree.contains("let y (2:1)"));
    }

    #[test]
    fn invalid_assignment_target() {
        let (_, errors) = parse("1 = 2");
        assert_eq!(errors, ["1:1: invalid assignment target"]);
    }

    #[test]
    fn trailing_tokens_after_root_end() {
        let (_, errors) = parse("let x = 1 end let y = 2");
        assert_eq!(errors, ["1:15: trailing tokens after `end`: Let"]);
    }
}
