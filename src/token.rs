use std::fmt;

use crate::lexer;

/// A file handle assigned by the driver. Only used to key diagnostics back to
/// a path; the core never opens files itself.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileId(pub u16);

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

/// A source location: file, 1-based line and column, and the lexeme length in
/// characters. Attached to every token and AST node.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
    pub len: u32,
}

impl Span {
    pub fn new(file: FileId, line: u32, col: u32, len: u32) -> Span {
        debug_assert!(line >= 1 && col >= 1);
        Span {
            file,
            line,
            col,
            len,
        }
    }

    /// Attaches this span to a value.
    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A value paired with the span it originated from.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token { kind, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

// This is not the most efficient way of representing a token kind, but it
// suffices for this simple compiler implementation.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Let,
    If,
    For,
    While,
    End,
    Do,
    Import,
    Const,
    Macro,
    Match,
    Fn,
    Struct,
    /// The `type` keyword (type aliases), not to be confused with
    /// [`TokenKind::TypeName`].
    Type,

    True,
    False,
    Null,

    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `=`
    Assign,
    /// `==`
    Eq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Semicolon,
    Question,
    Bang,
    Dot,
    Comma,

    Ident(Box<str>),
    /// An uppercase-initial identifier; classified here so the parser never
    /// re-inspects text.
    TypeName(Box<str>),
    Uint(u64),
    Sint(i64),
    Float(f64),
    Str(Box<str>),

    Eof,
    Error(lexer::Error),
}

impl TokenKind {
    /// Whether `self` and `other` are the same variant, ignoring payloads.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TokenKind::Error(_))
    }

    /// Whether a token of this kind may end an operand. Used by the lexer to
    /// decide if a following `-` starts a signed literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::TypeName(_)
                | TokenKind::Uint(_)
                | TokenKind::Sint(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "let" => TokenKind::Let,
    "if" => TokenKind::If,
    "for" => TokenKind::For,
    "while" => TokenKind::While,
    "end" => TokenKind::End,
    "do" => TokenKind::Do,
    "import" => TokenKind::Import,
    "const" => TokenKind::Const,
    "macro" => TokenKind::Macro,
    "match" => TokenKind::Match,
    "fn" => TokenKind::Fn,
    "struct" => TokenKind::Struct,
    "type" => TokenKind::Type,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
};
