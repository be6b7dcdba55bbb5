use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
};

use crate::{
    ast::{BinaryOp, UnaryOp},
    token::Span,
};

/// The output artifact of the code generator. Holds the top level instruction
/// sequence, one entry per function, the struct layouts and the symbol table.
#[derive(Clone, Debug, Default)]
pub struct Unit {
    pub code: Vec<Instr>,
    pub fns: Vec<Function>,
    pub structs: Vec<StructLayout>,
    pub symbols: SymbolTable,
    pub imports: Vec<Box<str>>,
}

/// A function body with its own slot numbering. Labels are numbered across
/// the whole unit.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Box<str>,
    pub params: Vec<Slot>,
    pub code: Vec<Instr>,
    /// Number of slots used by the body, parameters included.
    pub slots: u32,
}

/// Ordered field name to type name mapping of a `struct` definition.
#[derive(Clone, Debug)]
pub struct StructLayout {
    pub name: Box<str>,
    pub fields: Vec<(Box<str>, Box<str>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// Index into [`Unit::fns`].
    Fn(usize),
    /// Index into [`Unit::structs`].
    Struct(usize),
}

/// Maps top level declaration names to their definitions. Names are write
/// once, redefinition reports the span of the first definition.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    map: HashMap<Box<str>, (Span, Symbol)>,
}

impl SymbolTable {
    pub fn define(&mut self, name: Box<str>, span: Span, symbol: Symbol) -> Result<(), Span> {
        match self.map.entry(name) {
            Entry::Occupied(entry) => Err(entry.get().0),
            Entry::Vacant(entry) => {
                entry.insert((span, symbol));
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.map.get(name).map(|&(_, symbol)| symbol)
    }
}

/// A virtual register local to one function (or to the top level code).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot(pub u32);

/// A jump target, unique across the whole unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Uint(u64),
    Sint(i64),
    Float(f64),
    Str(Box<str>),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Const {
        dst: Slot,
        value: Value,
    },
    Copy {
        dst: Slot,
        src: Slot,
    },
    Unary {
        dst: Slot,
        op: UnaryOp,
        src: Slot,
    },
    Binary {
        dst: Slot,
        op: BinaryOp,
        lhs: Slot,
        rhs: Slot,
    },
    Index {
        dst: Slot,
        base: Slot,
        index: Slot,
    },
    Call {
        dst: Slot,
        name: Box<str>,
        args: Vec<Slot>,
    },
    Jump(Label),
    /// Jumps to `target` when `cond` is false, falls through otherwise.
    Branch {
        cond: Slot,
        target: Label,
    },
    Label(Label),
    Ret(Option<Slot>),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(val) => write!(f, "{val}"),
            Value::Sint(val) => write!(f, "{val}"),
            Value::Float(val) => write!(f, "{val}"),
            Value::Str(val) => write!(f, "'{val}'"),
            Value::Bool(val) => write!(f, "{val}"),
            Value::Null => write!(f, "null"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const { dst, value } => write!(f, "{dst} = const {value}"),
            Instr::Copy { dst, src } => write!(f, "{dst} = copy {src}"),
            Instr::Unary { dst, op, src } => {
                let op = match op {
                    UnaryOp::Neg => "neg",
                    UnaryOp::AddrOf => "addr",
                };
                write!(f, "{dst} = {op} {src}")
            }
            Instr::Binary { dst, op, lhs, rhs } => {
                let op = match op {
                    BinaryOp::Add => "add",
                    BinaryOp::Sub => "sub",
                    BinaryOp::Mul => "mul",
                    BinaryOp::Div => "div",
                    BinaryOp::Eq => "eq",
                    BinaryOp::Lt => "lt",
                    BinaryOp::Gt => "gt",
                    BinaryOp::Leq => "leq",
                    BinaryOp::Geq => "geq",
                };
                write!(f, "{dst} = {op} {lhs}, {rhs}")
            }
            Instr::Index { dst, base, index } => write!(f, "{dst} = index {base}, {index}"),
            Instr::Call { dst, name, args } => {
                write!(f, "{dst} = call {name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instr::Jump(target) => write!(f, "jump {target}"),
            Instr::Branch { cond, target } => write!(f, "branch_false {cond}, {target}"),
            Instr::Label(label) => write!(f, "{label}:"),
            Instr::Ret(Some(src)) => write!(f, "ret {src}"),
            Instr::Ret(None) => write!(f, "ret"),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for path in &self.imports {
            writeln!(f, "import '{path}'")?;
        }
        for layout in &self.structs {
            write!(f, "struct {} {{ ", layout.name)?;
            for (idx, (name, ty)) in layout.fields.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}: {ty}")?;
            }
            writeln!(f, " }}")?;
        }
        for function in &self.fns {
            write!(f, "fn {}(", function.name)?;
            for (idx, param) in function.params.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            writeln!(f, "):")?;
            for instr in &function.code {
                writeln!(f, "  {instr}")?;
            }
        }
        writeln!(f, "main:")?;
        for instr in &self.code {
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}
