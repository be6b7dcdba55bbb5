use crate::{
    ast::Block,
    codegen, macros, parser,
    token::{FileId, Spanned},
    util::fmt::tree,
};

pub fn format_errors<E>(errors: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: std::fmt::Display,
{
    errors.iter().map(|e| format!("{e:#}")).collect()
}

/// Parses the source, returning the printed tree and formatted errors.
pub fn parse(src: &str) -> (String, Vec<String>) {
    let (root, errors) = parse_raw(src);
    (tree::print_block_string(&root), format_errors(&errors))
}

pub fn parse_raw(src: &str) -> (Block, Vec<Spanned<parser::Error>>) {
    let tokens = &mut Vec::with_capacity(64);
    match parser::parse_program(src, FileId(0), tokens) {
        Ok(root) => (root, Vec::new()),
        Err((root, errors)) => (root, errors),
    }
}

/// Parses the source, asserting that no errors were produced.
#[track_caller]
pub fn parse_ok(src: &str) -> String {
    let (tree, errors) = parse(src);
    let no_errors: &[&str] = &[];
    ::pretty_assertions::assert_eq!(errors, no_errors);
    tree
}

/// Parses and macro-expands the source, which must be syntactically valid.
/// Returns the printed tree and formatted expansion errors.
#[track_caller]
pub fn expand(src: &str) -> (String, Vec<String>) {
    let (root, errors) = expand_raw(src);
    (tree::print_block_string(&root), format_errors(&errors))
}

#[track_caller]
pub fn expand_raw(src: &str) -> (Block, Vec<Spanned<macros::Error>>) {
    let (root, errors) = parse_raw(src);
    assert!(
        errors.is_empty(),
        "unexpected parse errors: {:?}",
        format_errors(&errors)
    );
    match macros::expand_program(root) {
        Ok(root) => (root, Vec::new()),
        Err((root, errors)) => (root, errors),
    }
}

#[track_caller]
pub fn expand_ok(src: &str) -> String {
    let (tree, errors) = expand(src);
    let no_errors: &[&str] = &[];
    ::pretty_assertions::assert_eq!(errors, no_errors);
    tree
}

/// Runs the full parse, expand and lower pipeline on a source which must be
/// free of parse and macro errors. Returns the printed unit and formatted
/// codegen errors.
#[track_caller]
pub fn lower(src: &str) -> (String, Vec<String>) {
    let (root, errors) = expand_raw(src);
    assert!(
        errors.is_empty(),
        "unexpected macro errors: {:?}",
        format_errors(&errors)
    );
    let (unit, errors) = match codegen::lower(&root) {
        Ok(unit) => (unit, Vec::new()),
        Err((unit, errors)) => (unit, errors),
    };
    (unit.to_string(), format_errors(&errors))
}

#[track_caller]
pub fn lower_ok(src: &str) -> String {
    let (unit, errors) = lower(src);
    let no_errors: &[&str] = &[];
    ::pretty_assertions::assert_eq!(errors, no_errors);
    unit
}
