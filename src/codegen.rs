use std::{collections::HashMap, fmt, mem};

use crate::{
    ast::{BinaryOp, Binding, Block, Expr, ExprKind, FnDef, Ident, Stmt, StmtKind, UnaryOp},
    ir::{Function, Instr, Label, Slot, StructLayout, Symbol, Unit, Value},
    token::{Span, Spanned},
};

pub type LowerResult<T> = Result<T, (T, Vec<Spanned<Error>>)>;

/// Lowers a macro-free tree into an IR unit.
///
/// Top level function and struct definitions are declared before any code is
/// lowered, so forward references resolve. Lowering continues past errors to
/// report as many as possible in one pass; the partial unit accompanying them
/// must not be handed to a backend.
pub fn lower(root: &Block) -> LowerResult<Unit> {
    let mut lowerer = Lowerer::default();
    let unit = lowerer.run(root);
    if lowerer.errors.is_empty() {
        Ok(unit)
    } else {
        Err((unit, lowerer.errors))
    }
}

/// The literal kind inferred for a slot. Used to flag operators applied to
/// operands of differing known kinds; `Unknown` unifies with everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ty {
    Uint,
    Sint,
    Float,
    Str,
    Bool,
    Null,
    Unknown,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Uint => "uint",
            Ty::Sint => "sint",
            Ty::Float => "float",
            Ty::Str => "str",
            Ty::Bool => "bool",
            Ty::Null => "null",
            Ty::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy)]
struct Local {
    slot: Slot,
    ty: Ty,
    is_const: bool,
}

/// Instruction buffer and slot counter for the entry currently being lowered,
/// either a function body or the top level code.
#[derive(Default)]
struct FnCtx {
    code: Vec<Instr>,
    slots: u32,
}

#[derive(Default)]
struct Lowerer {
    unit: Unit,
    current: FnCtx,
    /// One frame per block or function, innermost last.
    scopes: Vec<HashMap<Box<str>, Local>>,
    /// Index of the first frame visible to name resolution. Function bodies
    /// raise it past the enclosing frames, since their slot numbering cannot
    /// reference the top level code's slots.
    scope_base: usize,
    /// Label counter, shared by every entry in the unit.
    labels: u32,
    /// Parallel to `unit.fns`. Guards against lowering a duplicate definition
    /// over the first one.
    fn_lowered: Vec<bool>,
    errors: Vec<Spanned<Error>>,
}

impl Lowerer {
    fn run(&mut self, root: &Block) -> Unit {
        self.scopes.push(HashMap::new());
        self.declare_items(root);
        for stmt in &root.stmts {
            self.lower_stmt(stmt, true);
        }
        self.scopes.pop();

        let ctx = mem::take(&mut self.current);
        let mut unit = mem::take(&mut self.unit);
        unit.code = ctx.code;
        unit
    }

    /// Declares every top level function and struct before lowering begins,
    /// so code may refer to definitions that appear later in the file.
    fn declare_items(&mut self, root: &Block) {
        for stmt in &root.stmts {
            match &stmt.kind {
                StmtKind::Fn(def) => {
                    let idx = self.unit.fns.len();
                    let name = &def.name;
                    match self
                        .unit
                        .symbols
                        .define(name.name.clone(), name.span, Symbol::Fn(idx))
                    {
                        Ok(()) => {
                            self.unit.fns.push(Function {
                                name: name.name.clone(),
                                params: Vec::new(),
                                code: Vec::new(),
                                slots: 0,
                            });
                            self.fn_lowered.push(false);
                        }
                        Err(other) => self.duplicate(name.name.clone(), name.span, other),
                    }
                }
                StmtKind::Struct(def) => {
                    let idx = self.unit.structs.len();
                    let name = &def.name;
                    match self
                        .unit
                        .symbols
                        .define(name.name.clone(), name.span, Symbol::Struct(idx))
                    {
                        Ok(()) => self.unit.structs.push(StructLayout {
                            name: name.name.clone(),
                            fields: def
                                .fields
                                .iter()
                                .map(|field| (field.name.name.clone(), field.ty.name.clone()))
                                .collect(),
                        }),
                        Err(other) => self.duplicate(name.name.clone(), name.span, other),
                    }
                }
                _ => {}
            }
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt, top_level: bool) {
        match &stmt.kind {
            StmtKind::Let(binding) => self.lower_binding(binding, false),
            StmtKind::Const(binding) => self.lower_binding(binding, true),
            StmtKind::If { cond, body } => {
                let (cond, _) = self.lower_expr(cond);
                let end = self.fresh_label();
                self.emit(Instr::Branch { cond, target: end });
                self.lower_block(body);
                self.emit(Instr::Label(end));
            }
            StmtKind::While { cond, body } => {
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.emit(Instr::Label(start));
                let (cond, _) = self.lower_expr(cond);
                self.emit(Instr::Branch { cond, target: end });
                self.lower_block(body);
                self.emit(Instr::Jump(start));
                self.emit(Instr::Label(end));
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                // The init binding is scoped to the loop.
                self.scopes.push(HashMap::new());
                self.lower_stmt(init, false);
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.emit(Instr::Label(start));
                let (cond, _) = self.lower_expr(cond);
                self.emit(Instr::Branch { cond, target: end });
                self.lower_block(body);
                self.lower_expr(step);
                self.emit(Instr::Jump(start));
                self.emit(Instr::Label(end));
                self.scopes.pop();
            }
            StmtKind::Match { scrutinee, arms } => {
                let (scrutinee, _) = self.lower_expr(scrutinee);
                let end = self.fresh_label();
                for arm in arms {
                    let is_wildcard =
                        matches!(&arm.pattern.kind, ExprKind::Id(id) if &*id.name == "_");
                    // A wildcard arm always runs, so it gets no test and no
                    // fall-through label.
                    let next = if is_wildcard {
                        None
                    } else {
                        let next = self.fresh_label();
                        let (pattern, _) = self.lower_expr(&arm.pattern);
                        let test = self.alloc();
                        self.emit(Instr::Binary {
                            dst: test,
                            op: BinaryOp::Eq,
                            lhs: scrutinee,
                            rhs: pattern,
                        });
                        self.emit(Instr::Branch {
                            cond: test,
                            target: next,
                        });
                        Some(next)
                    };
                    self.lower_expr(&arm.body);
                    self.emit(Instr::Jump(end));
                    if let Some(next) = next {
                        self.emit(Instr::Label(next));
                    }
                }
                self.emit(Instr::Label(end));
            }
            StmtKind::Fn(def) => {
                if !top_level {
                    self.errors.push(stmt.span.wrap(Error::ItemNotTopLevel));
                    return;
                }
                let Some(Symbol::Fn(idx)) = self.unit.symbols.get(&def.name.name) else {
                    return;
                };
                if self.fn_lowered[idx] {
                    // Duplicate definition, already reported. The first wins.
                    return;
                }
                self.lower_fn(idx, def);
            }
            StmtKind::Struct(_) => {
                // The layout was recorded by `declare_items`.
                if !top_level {
                    self.errors.push(stmt.span.wrap(Error::ItemNotTopLevel));
                }
            }
            StmtKind::Import { path } => self.unit.imports.push(path.clone()),
            // Macro definitions do not survive expansion.
            StmtKind::MacroDef(_) => {}
            StmtKind::Expr(expr) => {
                self.lower_expr(expr);
            }
        }
    }

    /// Allocates a fresh slot for the binding and lowers the initializer into
    /// it.
    fn lower_binding(&mut self, binding: &Binding, is_const: bool) {
        let (src, inferred) = self.lower_expr(&binding.value);
        let dst = self.alloc();
        self.emit(Instr::Copy { dst, src });
        let ty = match &binding.ty {
            Some(annot) => ty_from_name(&annot.name),
            None => inferred,
        };
        self.scope_mut().insert(
            binding.name.name.clone(),
            Local {
                slot: dst,
                ty,
                is_const,
            },
        );
    }

    /// Lowers a block in its own scope frame, returning the slot of its final
    /// expression statement, if any.
    fn lower_block(&mut self, block: &Block) -> Option<(Slot, Ty)> {
        self.scopes.push(HashMap::new());
        let mut last = None;
        for stmt in &block.stmts {
            last = match &stmt.kind {
                StmtKind::Expr(expr) => Some(self.lower_expr(expr)),
                _ => {
                    self.lower_stmt(stmt, false);
                    None
                }
            };
        }
        self.scopes.pop();
        last
    }

    /// Lowers a function body into its own context. The body's final
    /// expression, when present, becomes the return value.
    fn lower_fn(&mut self, idx: usize, def: &FnDef) {
        let saved = mem::take(&mut self.current);
        let saved_base = mem::replace(&mut self.scope_base, self.scopes.len());
        self.scopes.push(HashMap::new());

        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let slot = self.alloc();
            params.push(slot);
            self.scope_mut().insert(
                param.name.name.clone(),
                Local {
                    slot,
                    ty: ty_from_name(&param.ty.name),
                    is_const: false,
                },
            );
        }

        let last = self.lower_block(&def.body);
        self.emit(Instr::Ret(last.map(|(slot, _)| slot)));

        self.scopes.pop();
        self.scope_base = saved_base;
        let ctx = mem::replace(&mut self.current, saved);
        let function = &mut self.unit.fns[idx];
        function.params = params;
        function.code = ctx.code;
        function.slots = ctx.slots;
        self.fn_lowered[idx] = true;
    }

    fn lower_expr(&mut self, expr: &Expr) -> (Slot, Ty) {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Uint(val) => (self.emit_const(Value::Uint(*val)), Ty::Uint),
            ExprKind::Sint(val) => (self.emit_const(Value::Sint(*val)), Ty::Sint),
            ExprKind::Float(val) => (self.emit_const(Value::Float(*val)), Ty::Float),
            ExprKind::Str(val) => (self.emit_const(Value::Str(val.clone())), Ty::Str),
            ExprKind::Bool(val) => (self.emit_const(Value::Bool(*val)), Ty::Bool),
            ExprKind::Null => (self.emit_const(Value::Null), Ty::Null),
            ExprKind::Id(ident) => match self.resolve(&ident.name) {
                Some(local) => (local.slot, local.ty),
                None => self.undeclared(ident),
            },
            ExprKind::Assign { target, value } => {
                let (src, ty) = self.lower_expr(value);
                match self.resolve(&target.name) {
                    None => {
                        self.undeclared(target);
                        (src, ty)
                    }
                    Some(local) if local.is_const => {
                        let error = Error::AssignToConst {
                            name: target.name.clone(),
                        };
                        self.errors.push(target.span.wrap(error));
                        (src, ty)
                    }
                    Some(local) => {
                        self.emit(Instr::Copy {
                            dst: local.slot,
                            src,
                        });
                        if let Some(entry) = self.resolve_mut(&target.name) {
                            entry.ty = ty;
                        }
                        (local.slot, ty)
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, lhs_ty) = self.lower_expr(lhs);
                let (rhs, rhs_ty) = self.lower_expr(rhs);
                let ty = self.binary_ty(*op, lhs_ty, rhs_ty, span);
                let dst = self.alloc();
                self.emit(Instr::Binary {
                    dst,
                    op: *op,
                    lhs,
                    rhs,
                });
                (dst, ty)
            }
            ExprKind::Unary { op, expr: inner } => {
                let (src, ty) = self.lower_expr(inner);
                let dst = self.alloc();
                self.emit(Instr::Unary { dst, op: *op, src });
                let ty = match op {
                    UnaryOp::Neg => ty,
                    UnaryOp::AddrOf => Ty::Unknown,
                };
                (dst, ty)
            }
            ExprKind::Call { callee, args } => {
                let args: Vec<_> = args.iter().map(|arg| self.lower_expr(arg).0).collect();
                if self.unit.symbols.get(&callee.name).is_none()
                    && self.resolve(&callee.name).is_none()
                {
                    self.undeclared(callee);
                }
                let dst = self.alloc();
                self.emit(Instr::Call {
                    dst,
                    name: callee.name.clone(),
                    args,
                });
                (dst, Ty::Unknown)
            }
            // Macro calls do not survive expansion; lowered defensively.
            ExprKind::MacroCall { .. } | ExprKind::Dummy => {
                (self.emit_const(Value::Null), Ty::Unknown)
            }
            ExprKind::Index { base, index } => {
                let (base, _) = self.lower_expr(base);
                let (index, _) = self.lower_expr(index);
                let dst = self.alloc();
                self.emit(Instr::Index { dst, base, index });
                (dst, Ty::Unknown)
            }
            ExprKind::Do(block) => match self.lower_block(block) {
                Some(last) => last,
                None => (self.emit_const(Value::Null), Ty::Null),
            },
            ExprKind::Paren(inner) => self.lower_expr(inner),
        }
    }

    /// Arithmetic propagates its operand kind and flags operands of differing
    /// known kinds. Comparisons yield a bool; `==` additionally accepts any
    /// operand pairing so null checks stay legal.
    fn binary_ty(&mut self, op: BinaryOp, lhs: Ty, rhs: Ty, span: Span) -> Ty {
        use BinaryOp::*;
        let mismatch = lhs != Ty::Unknown && rhs != Ty::Unknown && lhs != rhs;
        match op {
            Add | Sub | Mul | Div => {
                if mismatch {
                    self.errors
                        .push(span.wrap(Error::TypeMismatch { op, lhs, rhs }));
                    Ty::Unknown
                } else if lhs == Ty::Unknown {
                    rhs
                } else {
                    lhs
                }
            }
            Lt | Gt | Leq | Geq => {
                if mismatch {
                    self.errors
                        .push(span.wrap(Error::TypeMismatch { op, lhs, rhs }));
                }
                Ty::Bool
            }
            Eq => Ty::Bool,
        }
    }

    fn resolve(&self, name: &str) -> Option<Local> {
        self.scopes[self.scope_base..]
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).copied())
    }

    fn resolve_mut(&mut self, name: &str) -> Option<&mut Local> {
        self.scopes[self.scope_base..]
            .iter_mut()
            .rev()
            .find_map(|frame| frame.get_mut(name))
    }

    fn undeclared(&mut self, ident: &Ident) -> (Slot, Ty) {
        let error = Error::UndeclaredIdentifier {
            name: ident.name.clone(),
        };
        self.errors.push(ident.span.wrap(error));
        (self.alloc(), Ty::Unknown)
    }

    fn duplicate(&mut self, name: Box<str>, span: Span, other_definition_span: Span) {
        let error = Error::DuplicateDeclaration {
            name,
            other_definition_span,
        };
        self.errors.push(span.wrap(error));
    }

    fn scope_mut(&mut self) -> &mut HashMap<Box<str>, Local> {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn alloc(&mut self) -> Slot {
        let slot = Slot(self.current.slots);
        self.current.slots += 1;
        slot
    }

    fn fresh_label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    fn emit(&mut self, instr: Instr) {
        self.current.code.push(instr);
    }

    fn emit_const(&mut self, value: Value) -> Slot {
        let dst = self.alloc();
        self.emit(Instr::Const { dst, value });
        dst
    }
}

fn ty_from_name(name: &str) -> Ty {
    match name {
        "Uint" => Ty::Uint,
        "Sint" | "Int" => Ty::Sint,
        "Float" => Ty::Float,
        "Str" | "String" => Ty::Str,
        "Bool" => Ty::Bool,
        _ => Ty::Unknown,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    UndeclaredIdentifier { name: Box<str> },
    AssignToConst { name: Box<str> },
    TypeMismatch { op: BinaryOp, lhs: Ty, rhs: Ty },
    DuplicateDeclaration {
        name: Box<str>,
        other_definition_span: Span,
    },
    ItemNotTopLevel,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::util::test_utils::{lower, lower_ok};

    #[test]
    fn operands_are_lowered_before_their_operator() {
        let unit = lower_ok("let x = 1 + 2 * 3 end");
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 1
                  s1 = const 2
                  s2 = const 3
                  s3 = mul s1, s2
                  s4 = add s0, s3
                  s5 = copy s4
            "}
        );
    }

    #[test]
    fn expanded_macro_lowers_without_folding() {
        let unit = lower_ok(indoc! {"
            macro double(a) a + a end
            double(5)
        "});
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 5
                  s1 = const 5
                  s2 = add s0, s1
            "}
        );
    }

    #[test]
    fn while_lowers_to_labeled_blocks() {
        let unit = lower_ok(indoc! {"
            let x = 0
            while x < 3
              x = x + 1
            end
        "});
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 0
                  s1 = copy s0
                  L0:
                  s2 = const 3
                  s3 = lt s1, s2
                  branch_false s3, L1
                  s4 = const 1
                  s5 = add s1, s4
                  s1 = copy s5
                  jump L0
                  L1:
            "}
        );
    }

    #[test]
    fn for_loop_steps_after_the_body() {
        let unit = lower_ok(indoc! {"
            for let i = 0; i < 2; i = i + 1
              let j = i
            end
        "});
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 0
                  s1 = copy s0
                  L0:
                  s2 = const 2
                  s3 = lt s1, s2
                  branch_false s3, L1
                  s4 = copy s1
                  s5 = const 1
                  s6 = add s1, s5
                  s1 = copy s6
                  jump L0
                  L1:
            "}
        );
    }

    #[test]
    fn match_compares_each_arm_and_wildcard_always_matches() {
        let unit = lower_ok(indoc! {"
            let x = 2
            let y = 0
            match x
              1: y = 1;
              _: y = 9;
            end
        "});
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 2
                  s1 = copy s0
                  s2 = const 0
                  s3 = copy s2
                  s4 = const 1
                  s5 = eq s1, s4
                  branch_false s5, L1
                  s6 = const 1
                  s3 = copy s6
                  jump L0
                  L1:
                  s7 = const 9
                  s3 = copy s7
                  jump L0
                  L0:
            "}
        );
    }

    #[test]
    fn functions_get_their_own_slot_numbering_and_forward_refs_resolve() {
        let unit = lower_ok(indoc! {"
            let y = add(1, 2)
            fn add(a: Int, b: Int): Int
              a + b
            end
        "});
        assert_eq!(
            unit,
            indoc! {"
                fn add(s0, s1):
                  s2 = add s0, s1
                  ret s2
                main:
                  s0 = const 1
                  s1 = const 2
                  s2 = call add(s0, s1)
                  s3 = copy s2
            "}
        );
    }

    #[test]
    fn function_bodies_cannot_reach_top_level_bindings() {
        // `h` lives in the top level numbering, which the function's own
        // numbering cannot reference, so the body must not resolve it.
        let (unit, errors) = lower(indoc! {"
            let g = 7
            let h = 8
            fn f(): Int
              h
            end
        "});
        assert_eq!(errors, ["4:3: use of undeclared identifier h"]);
        assert!(!unit.contains("ret s3"));
    }

    #[test]
    fn structs_and_imports_are_recorded_not_executed() {
        let unit = lower_ok(indoc! {"
            import 'math'
            struct Point
              x: Int;
              y: Int;
            end
        "});
        assert_eq!(
            unit,
            indoc! {"
                import 'math'
                struct Point { x: Int, y: Int }
                main:
            "}
        );
    }

    #[test]
    fn macro_locals_stay_separate_from_caller_locals() {
        let unit = lower_ok(indoc! {"
            macro inc(v)
              let t = 1
              v + t
            end
            let t = 10
            let r = inc!(t)
        "});
        assert_eq!(
            unit,
            indoc! {"
                main:
                  s0 = const 10
                  s1 = copy s0
                  s2 = const 1
                  s3 = copy s2
                  s4 = add s1, s3
                  s5 = copy s4
            "}
        );
    }

    #[test]
    fn undeclared_identifier() {
        let (_, errors) = lower("x + 1");
        assert_eq!(errors, ["1:1: use of undeclared identifier x"]);
    }

    #[test]
    fn assignment_to_const_is_rejected() {
        let (_, errors) = lower(indoc! {"
            const x = 1
            x = 2
        "});
        assert_eq!(errors, ["2:1: cannot assign to const binding x"]);
    }

    #[test]
    fn mismatched_operand_kinds() {
        let (_, errors) = lower("1 + 2.5");
        assert_eq!(
            errors,
            ["1:1: operator Add applied to mismatched operands: uint and float"]
        );
    }

    #[test]
    fn duplicate_top_level_declaration() {
        let (_, errors) = lower(indoc! {"
            fn f() 1 end
            fn f() 2 end
        "});
        assert_eq!(errors, ["2:4: f already defined at 1:4"]);
    }

    #[test]
    fn nested_definitions_are_rejected() {
        let (_, errors) = lower(indoc! {"
            if true
              fn f() 1 end
            end
        "});
        assert_eq!(
            errors,
            ["2:3: function and struct definitions are only allowed at the top level"]
        );
    }
}
