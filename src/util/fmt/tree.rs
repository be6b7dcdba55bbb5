use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_block_string(block: &Block) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_block(&mut buf, 0, block).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    print_expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_block(w: &mut impl Write, i: usize, block: &Block) -> std::io::Result<()> {
    for stmt in &block.stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    let span = stmt.span;
    match &stmt.kind {
        StmtKind::Let(binding) => {
            sp(w, i)?;
            write!(w, "let ")?;
            print_binding(w, i, span, binding)?;
        }
        StmtKind::Const(binding) => {
            sp(w, i)?;
            write!(w, "const ")?;
            print_binding(w, i, span, binding)?;
        }
        StmtKind::If { cond, body } => {
            sp(w, i)?;
            writeln!(w, "if ({span})")?;
            print_expr(w, i + 1, cond)?;
            sp(w, i + 1)?;
            writeln!(w, "body")?;
            print_block(w, i + 2, body)?;
        }
        StmtKind::While { cond, body } => {
            sp(w, i)?;
            writeln!(w, "while ({span})")?;
            print_expr(w, i + 1, cond)?;
            sp(w, i + 1)?;
            writeln!(w, "body")?;
            print_block(w, i + 2, body)?;
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            sp(w, i)?;
            writeln!(w, "for ({span})")?;
            print_stmt(w, i + 1, init)?;
            print_expr(w, i + 1, cond)?;
            print_expr(w, i + 1, step)?;
            sp(w, i + 1)?;
            writeln!(w, "body")?;
            print_block(w, i + 2, body)?;
        }
        StmtKind::Match { scrutinee, arms } => {
            sp(w, i)?;
            writeln!(w, "match ({span})")?;
            print_expr(w, i + 1, scrutinee)?;
            for arm in arms {
                sp(w, i + 1)?;
                writeln!(w, "arm")?;
                print_expr(w, i + 2, &arm.pattern)?;
                print_expr(w, i + 2, &arm.body)?;
            }
        }
        StmtKind::Fn(FnDef {
            name,
            params,
            return_ty,
            body,
        }) => {
            sp(w, i)?;
            write!(w, "fn {}(", name.name)?;
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}: {}", param.name.name, param.ty.name)?;
            }
            write!(w, ")")?;
            if let Some(ret) = return_ty {
                write!(w, ": {}", ret.name)?;
            }
            writeln!(w, " ({span})")?;
            print_block(w, i + 1, body)?;
        }
        StmtKind::Struct(StructDef { name, fields }) => {
            sp(w, i)?;
            writeln!(w, "struct {} ({span})", name.name)?;
            for field in fields {
                sp(w, i + 1)?;
                writeln!(w, "field {}: {}", field.name.name, field.ty.name)?;
            }
        }
        StmtKind::Import { path } => {
            sp(w, i)?;
            writeln!(w, "import '{path}' ({span})")?;
        }
        StmtKind::MacroDef(MacroDef { name, params, body }) => {
            sp(w, i)?;
            write!(w, "macro {}(", name.name)?;
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}", param.name)?;
            }
            writeln!(w, ") ({span})")?;
            print_block(w, i + 1, body)?;
        }
        StmtKind::Expr(expr) => {
            print_expr(w, i, expr)?;
        }
    }
    Ok(())
}

fn print_binding(
    w: &mut impl Write,
    i: usize,
    span: crate::token::Span,
    binding: &Binding,
) -> std::io::Result<()> {
    write!(w, "{}", binding.name.name)?;
    if let Some(ty) = &binding.ty {
        write!(w, ": {}", ty.name)?;
    }
    writeln!(w, " ({span})")?;
    print_expr(w, i + 1, &binding.value)
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Assign { target, value } => {
            writeln!(w, "assign {} ({span})", target.name)?;
            print_expr(w, i + 1, value)?;
        }
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?} ({span})")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Unary { op, expr: inner } => {
            writeln!(w, "unary {op:?} ({span})")?;
            print_expr(w, i + 1, inner)?;
        }
        ExprKind::Call { callee, args } => {
            writeln!(w, "call {} ({span})", callee.name)?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::MacroCall { name, args } => {
            writeln!(w, "macro-call {} ({span})", name.name)?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Index { base, index } => {
            writeln!(w, "index ({span})")?;
            print_expr(w, i + 1, base)?;
            print_expr(w, i + 1, index)?;
        }
        ExprKind::Do(block) => {
            writeln!(w, "do ({span})")?;
            print_block(w, i + 1, block)?;
        }
        ExprKind::Paren(inner) => {
            writeln!(w, "paren ({span})")?;
            print_expr(w, i + 1, inner)?;
        }
        ExprKind::Id(ident) => {
            writeln!(w, "ident {} ({span})", ident.name)?;
        }
        ExprKind::Uint(val) => {
            writeln!(w, "uint {val} ({span})")?;
        }
        ExprKind::Sint(val) => {
            writeln!(w, "sint {val} ({span})")?;
        }
        ExprKind::Float(val) => {
            writeln!(w, "float {val} ({span})")?;
        }
        ExprKind::Str(val) => {
            writeln!(w, "string '{val}' ({span})")?;
        }
        ExprKind::Bool(val) => {
            writeln!(w, "bool {val} ({span})")?;
        }
        ExprKind::Null => {
            writeln!(w, "null ({span})")?;
        }
        ExprKind::Dummy => {
            writeln!(w, "dummy ({span})")?;
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
