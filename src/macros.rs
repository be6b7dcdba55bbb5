use std::{collections::HashMap, mem};

use crate::{
    ast::{Block, Expr, ExprKind, Ident, MacroDef, Stmt, StmtKind},
    token::{Span, Spanned},
};

/// Upper bound on nested expansions. A self-recursive macro is reported once
/// this limit is reached instead of hanging the compiler.
pub const MAX_EXPANSION_DEPTH: usize = 256;

pub type ExpandResult<T> = Result<T, (T, Vec<Spanned<Error>>)>;

/// Collects all top level macro definitions and expands every invocation in
/// the remaining tree. The returned block contains no macro definitions and
/// no macro calls.
///
/// A tree without macros is returned unchanged.
pub fn expand_program(root: Block) -> ExpandResult<Block> {
    let mut expander = Expander {
        table: HashMap::with_capacity(8),
        errors: Vec::new(),
        gensyms: 0,
    };
    let root = expander.run(root);
    if expander.errors.is_empty() {
        Ok(root)
    } else {
        Err((root, expander.errors))
    }
}

type ParamMap = HashMap<Box<str>, Expr>;
type RenameMap = HashMap<Box<str>, Box<str>>;

struct Expander {
    table: HashMap<Box<str>, MacroDef>,
    errors: Vec<Spanned<Error>>,
    /// Counter used to make the names bound inside expanded bodies unique.
    gensyms: u32,
}

impl Expander {
    fn run(&mut self, mut root: Block) -> Block {
        // First pass: collect definitions and drop them from the tree.
        let mut stmts = Vec::with_capacity(root.stmts.len());
        for stmt in root.stmts {
            match stmt.kind {
                StmtKind::MacroDef(def) => self.define(def),
                _ => stmts.push(stmt),
            }
        }
        root.stmts = stmts;

        // Second pass: expand every invocation.
        for stmt in &mut root.stmts {
            self.expand_stmt(stmt, 0);
        }
        root
    }

    /// Definitions are write once. On redefinition the first one wins.
    fn define(&mut self, def: MacroDef) {
        if let Some(other) = self.table.get(&def.name.name) {
            let error = Error::Duplicate {
                name: def.name.name.clone(),
                other_definition_span: other.name.span,
            };
            self.errors.push(def.name.span.wrap(error));
            return;
        }
        self.table.insert(def.name.name.clone(), def);
    }

    fn expand_block(&mut self, block: &mut Block, depth: usize) {
        for stmt in &mut block.stmts {
            self.expand_stmt(stmt, depth);
        }
    }

    fn expand_stmt(&mut self, stmt: &mut Stmt, depth: usize) {
        match &mut stmt.kind {
            StmtKind::Let(binding) | StmtKind::Const(binding) => {
                self.expand_expr(&mut binding.value, depth);
            }
            StmtKind::If { cond, body } | StmtKind::While { cond, body } => {
                self.expand_expr(cond, depth);
                self.expand_block(body, depth);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.expand_stmt(init, depth);
                self.expand_expr(cond, depth);
                self.expand_expr(step, depth);
                self.expand_block(body, depth);
            }
            StmtKind::Match { scrutinee, arms } => {
                self.expand_expr(scrutinee, depth);
                for arm in arms {
                    self.expand_expr(&mut arm.pattern, depth);
                    self.expand_expr(&mut arm.body, depth);
                }
            }
            StmtKind::Fn(def) => self.expand_block(&mut def.body, depth),
            StmtKind::Struct(_) | StmtKind::Import { .. } => {}
            StmtKind::MacroDef(_) => {
                self.errors
                    .push(stmt.span.wrap(Error::DefinitionNotTopLevel));
                stmt.kind = StmtKind::Expr(Expr::dummy(stmt.span));
            }
            StmtKind::Expr(expr) => self.expand_expr(expr, depth),
        }
    }

    fn expand_expr(&mut self, expr: &mut Expr, depth: usize) {
        match &mut expr.kind {
            ExprKind::Assign { value, .. } => self.expand_expr(value, depth),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expand_expr(lhs, depth);
                self.expand_expr(rhs, depth);
            }
            ExprKind::Unary { expr: inner, .. } => self.expand_expr(inner, depth),
            ExprKind::Index { base, index } => {
                self.expand_expr(base, depth);
                self.expand_expr(index, depth);
            }
            ExprKind::Do(block) => self.expand_block(block, depth),
            ExprKind::Paren(inner) => self.expand_expr(inner, depth),
            ExprKind::Call { args, .. } | ExprKind::MacroCall { args, .. } => {
                for arg in args.iter_mut() {
                    self.expand_expr(arg, depth);
                }
                self.maybe_invoke(expr, depth);
            }
            ExprKind::Id(_)
            | ExprKind::Uint(_)
            | ExprKind::Sint(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Dummy => {}
        }
    }

    /// Replaces the expression with its expansion.
    ///
    /// A `name!(...)` invocation of an unknown macro is an error. A plain call
    /// is expanded only when its callee names a collected macro and is left
    /// alone otherwise, so ordinary function calls pass through unchanged.
    fn maybe_invoke(&mut self, expr: &mut Expr, depth: usize) {
        let span = expr.span;
        let kind = mem::replace(&mut expr.kind, ExprKind::Dummy);
        *expr = match kind {
            ExprKind::MacroCall { name, args } => {
                if self.table.contains_key(&name.name) {
                    self.expand_invocation(&name, args, span, depth)
                } else {
                    let error = Error::Undefined {
                        name: name.name.clone(),
                    };
                    self.errors.push(name.span.wrap(error));
                    Expr::dummy(span)
                }
            }
            ExprKind::Call { callee, args } if self.table.contains_key(&callee.name) => {
                self.expand_invocation(&callee, args, span, depth)
            }
            other => Expr { kind: other, span },
        };
    }

    fn expand_invocation(
        &mut self,
        name: &Ident,
        args: Vec<Expr>,
        span: Span,
        depth: usize,
    ) -> Expr {
        if depth >= MAX_EXPANSION_DEPTH {
            let error = Error::DepthExceeded {
                name: name.name.clone(),
            };
            self.errors.push(span.wrap(error));
            return Expr::dummy(span);
        }

        let def = self.table[&name.name].clone();
        if args.len() != def.params.len() {
            let error = Error::ArityMismatch {
                name: name.name.clone(),
                expected: def.params.len(),
                actual: args.len(),
            };
            self.errors.push(span.wrap(error));
            return Expr::dummy(span);
        }

        let params: ParamMap = def
            .params
            .iter()
            .map(|param| param.name.clone())
            .zip(args)
            .collect();
        let mut body = def.body;
        self.substitute_block(&mut body, &params, &RenameMap::new());

        let mut result = splice(body, span);
        // The expansion may itself contain invocations.
        self.expand_expr(&mut result, depth + 1);
        result
    }

    fn substitute_block(&mut self, block: &mut Block, params: &ParamMap, renames: &RenameMap) {
        let mut scope = renames.clone();
        for stmt in &mut block.stmts {
            self.substitute_stmt(stmt, params, &mut scope);
        }
    }

    fn substitute_stmt(&mut self, stmt: &mut Stmt, params: &ParamMap, renames: &mut RenameMap) {
        match &mut stmt.kind {
            StmtKind::Let(binding) | StmtKind::Const(binding) => {
                // The initializer is evaluated in the enclosing scope, so it
                // must be substituted before the binding shadows its name.
                self.substitute_expr(&mut binding.value, params, renames);
                let fresh = self.gensym(&binding.name.name);
                renames.insert(binding.name.name.clone(), fresh.clone());
                binding.name.name = fresh;
            }
            StmtKind::If { cond, body } | StmtKind::While { cond, body } => {
                self.substitute_expr(cond, params, renames);
                self.substitute_block(body, params, renames);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let mut scope = renames.clone();
                self.substitute_stmt(init, params, &mut scope);
                self.substitute_expr(cond, params, &scope);
                self.substitute_expr(step, params, &scope);
                self.substitute_block(body, params, &scope);
            }
            StmtKind::Match { scrutinee, arms } => {
                self.substitute_expr(scrutinee, params, renames);
                for arm in arms {
                    self.substitute_expr(&mut arm.pattern, params, renames);
                    self.substitute_expr(&mut arm.body, params, renames);
                }
            }
            StmtKind::Fn(def) => {
                // The function's own parameters shadow macro parameters and
                // any renamed locals.
                let mut params = params.clone();
                let mut renames = renames.clone();
                for param in &def.params {
                    params.remove(&param.name.name);
                    renames.remove(&param.name.name);
                }
                self.substitute_block(&mut def.body, &params, &renames);
            }
            StmtKind::Struct(_) | StmtKind::Import { .. } | StmtKind::MacroDef(_) => {}
            StmtKind::Expr(expr) => self.substitute_expr(expr, params, renames),
        }
    }

    fn substitute_expr(&mut self, expr: &mut Expr, params: &ParamMap, renames: &RenameMap) {
        match &mut expr.kind {
            ExprKind::Id(ident) => {
                if let Some(fresh) = renames.get(&ident.name) {
                    ident.name = fresh.clone();
                } else if let Some(arg) = params.get(&ident.name) {
                    *expr = arg.clone();
                }
            }
            ExprKind::Assign { target, value } => {
                self.substitute_expr(value, params, renames);
                rename_place(target, params, renames);
            }
            ExprKind::Call { callee, args } => {
                rename_place(callee, params, renames);
                for arg in args {
                    self.substitute_expr(arg, params, renames);
                }
            }
            ExprKind::MacroCall { args, .. } => {
                for arg in args {
                    self.substitute_expr(arg, params, renames);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.substitute_expr(lhs, params, renames);
                self.substitute_expr(rhs, params, renames);
            }
            ExprKind::Unary { expr: inner, .. } => self.substitute_expr(inner, params, renames),
            ExprKind::Index { base, index } => {
                self.substitute_expr(base, params, renames);
                self.substitute_expr(index, params, renames);
            }
            ExprKind::Do(block) => self.substitute_block(block, params, renames),
            ExprKind::Paren(inner) => self.substitute_expr(inner, params, renames),
            ExprKind::Uint(_)
            | ExprKind::Sint(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Dummy => {}
        }
    }

    fn gensym(&mut self, name: &str) -> Box<str> {
        let n = self.gensyms;
        self.gensyms += 1;
        format!("{name}__{n}").into()
    }
}

/// Renames an identifier which occurs in a position that requires a name,
/// such as an assignment target or a callee. A parameter is substituted only
/// when the corresponding argument is itself an identifier.
fn rename_place(ident: &mut Ident, params: &ParamMap, renames: &RenameMap) {
    if let Some(fresh) = renames.get(&ident.name) {
        ident.name = fresh.clone();
    } else if let Some(Expr {
        kind: ExprKind::Id(arg),
        ..
    }) = params.get(&ident.name)
    {
        ident.name = arg.name.clone();
    }
}

/// A body with a single expression statement expands to that expression.
/// Anything else is wrapped in a `do` block. Either way the expansion takes
/// the span of the invocation.
fn splice(mut body: Block, span: Span) -> Expr {
    if body.stmts.len() == 1 && matches!(body.stmts[0].kind, StmtKind::Expr(_)) {
        let Some(Stmt {
            kind: StmtKind::Expr(mut expr),
            ..
        }) = body.stmts.pop()
        else {
            unreachable!("checked above");
        };
        expr.span = span;
        expr
    } else {
        body.span = span;
        Expr {
            kind: ExprKind::Do(body),
            span,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A `name!(...)` invocation of a macro that was never defined.
    Undefined { name: Box<str> },
    ArityMismatch {
        name: Box<str>,
        expected: usize,
        actual: usize,
    },
    Duplicate {
        name: Box<str>,
        other_definition_span: Span,
    },
    DepthExceeded { name: Box<str> },
    DefinitionNotTopLevel,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::util::test_utils::{expand, expand_ok, parse_ok};

    #[test]
    fn single_expression_body_splices_as_expression() {
        let tree = expand_ok(indoc! {"
            macro double(x)
              x + x
            end
            let y = double!(5)
        "});
        assert_eq!(
            tree,
            indoc! {"
                let y (4:1)
                  binary Add (4:9)
                    uint 5 (4:17)
                    uint 5 (4:17)
            "}
        );
    }

    #[test]
    fn plain_call_of_collected_macro_expands() {
        let tree = expand_ok(indoc! {"
            macro double(x) x + x end
            double(5)
        "});
        assert_eq!(
            tree,
            indoc! {"
                binary Add (2:1)
                  uint 5 (2:8)
                  uint 5 (2:8)
            "}
        );
    }

    #[test]
    fn hygiene_renames_body_locals() {
        let tree = expand_ok(indoc! {"
            macro swapadd(a, b)
              let t = a
              t + b
            end
            let t = 1
            let u = swapadd!(t, 2)
        "});
        assert_eq!(
            tree,
            indoc! {"
                let t (5:1)
                  uint 1 (5:9)
                let u (6:1)
                  do (6:9)
                    let t__0 (2:3)
                      ident t (6:18)
                    binary Add (3:3)
                      ident t__0 (3:3)
                      uint 2 (6:21)
            "}
        );
    }

    #[test]
    fn expansion_is_idempotent_on_macro_free_trees() {
        let src = indoc! {"
            let x = 1 + 2
            if x < 3
              f(x)
            end
        "};
        assert_eq!(expand_ok(src), parse_ok(src));
    }

    #[test]
    fn undefined_macro_invocation() {
        let (tree, errors) = expand("nope!(1)");
        assert_eq!(errors, ["1:1: undefined macro nope"]);
        assert_eq!(tree, "dummy (1:1)\n");
    }

    #[test]
    fn arity_mismatch() {
        let (_, errors) = expand(indoc! {"
            macro double(x) x + x end
            double!(1, 2)
        "});
        assert_eq!(
            errors,
            ["2:1: incorrect number of arguments to macro double: expected 1, but got 2"]
        );
    }

    #[test]
    fn duplicate_definition_keeps_the_first() {
        let (tree, errors) = expand(indoc! {"
            macro m() 1 end
            macro m() 2 end
            let x = m!()
        "});
        assert_eq!(errors, ["2:7: macro m already defined at 1:7"]);
        assert!(tree.contains("uint 1 (3:9)"));
    }

    #[test]
    fn self_recursion_is_bounded() {
        let (_, errors) = expand(indoc! {"
            macro f(x) f!(x) end
            f!(1)
        "});
        assert_eq!(
            errors,
            ["2:1: maximum expansion depth exceeded while expanding macro f"]
        );
    }

    #[test]
    fn definition_below_top_level_is_rejected() {
        let (_, errors) = expand(indoc! {"
            if true
              macro m() 1 end
            end
        "});
        assert_eq!(
            errors,
            ["2:3: macro definitions are only allowed at the top level"]
        );
    }
}
