// program ::= stmt* ['end']
// block ::= stmt* 'end'
// stmt ::= 'let' ID [':' TYPE] '=' expr
//        | 'const' ID [':' TYPE] '=' expr
//        | 'if' expr block
//        | 'while' expr block
//        | 'for' (let | expr) ';' expr ';' expr block
//        | 'match' expr (expr ':' expr [';'])* 'end'
//        | 'fn' ID '(' [ID ':' TYPE (',' ID ':' TYPE)*] ')' [':' TYPE] block
//        | 'struct' TYPE (ID ':' TYPE [';'])* 'end'
//        | 'import' string
//        | 'macro' ID '(' [ID (',' ID)*] ')' block
//        | expr [';']
// expr ::= ID '=' expr
//        | expr '==' expr
//        | expr ('<' | '>' | '<=' | '>=') expr
//        | expr ('+' | '-') expr
//        | expr ('*' | '/') expr
//        | ('-' | '&') expr
//        | ID '(' [expr (',' expr)*] ')'
//        | ID '!' '(' [expr (',' expr)*] ')'
//        | expr '[' expr ']'
//        | 'do' block
//        | '(' expr ')'
//        | ID | integer | float | string | 'true' | 'false' | 'null'

// Precedence (low to high)
//
// =
// ==
// < > <= >=
// + -
// * /
// unary - &
// call, macro call, index

use crate::token::Span;

/// A sequence of statements. The root of every parsed file is one block;
/// nested blocks are terminated by the `end` keyword.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Let(Binding),
    Const(Binding),
    If {
        cond: Expr,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        step: Expr,
        body: Block,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
    Fn(FnDef),
    Struct(StructDef),
    Import {
        path: Box<str>,
    },
    MacroDef(MacroDef),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: Ident,
    pub ty: Option<TypeRef>,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FnDef {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeRef>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: TypeRef,
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MacroDef {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Block,
}

/// One `pattern : expr` arm. Patterns are ordinary expressions compared for
/// equality; the identifier `_` matches anything.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub pattern: Expr,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn dummy(span: Span) -> Expr {
        Expr {
            kind: ExprKind::Dummy,
            span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Assign {
        target: Ident,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    /// An explicit `name!(args)` macro invocation.
    MacroCall {
        name: Ident,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// A `do ... end` block-valued expression.
    Do(Block),
    Paren(Box<Expr>),
    Id(Ident),
    Uint(u64),
    Sint(i64),
    Float(f64),
    Str(Box<str>),
    Bool(bool),
    Null,
    Dummy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    AddrOf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
    Leq,
    Geq,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

/// A reference to a named type, as written in an annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRef {
    pub name: Box<str>,
    pub span: Span,
}
