// src/sema/cfg.rs
//
// The storage-level IR produced by lowering: registers, lvalue places,
// instructions, and basic-block segments. Instructions refer to registers by
// index into the per-function table, so a single type update is visible
// everywhere without aliasing.

use crate::frontend::Span;
use crate::sema::registry::{FuncId, Registry, StructId};
use crate::sema::types::Type;

/// Index of a storage slot in a function's register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId(u32);

impl RegisterId {
    /// Register 0 is reserved for the function's return value.
    pub const RETURN: RegisterId = RegisterId(0);

    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a basic block in a function's segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(u32);

impl SegmentId {
    /// Segment 0 is the function entry.
    pub const ENTRY: SegmentId = SegmentId(0);

    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    pub ty: Type,
    pub span: Span,
}

/// A name-to-register association with lexical scope. Bindings form a stack;
/// leaving a block marks its bindings out of scope but never pops them.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub register: RegisterId,
    pub mutable: bool,
    pub decl_span: Span,
    pub in_scope: bool,
}

/// A (possibly nested) lvalue path. Always bottoms out at a register, except
/// for `Discard`, the write sink for unobserved intermediate results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Register(RegisterId),
    Field { base: Box<Place>, index: usize },
    Deref(Box<Place>),
    Discard,
}

impl Place {
    pub fn field(self, index: usize) -> Place {
        Place::Field {
            base: Box::new(self),
            index,
        }
    }

    pub fn deref(self) -> Place {
        Place::Deref(Box::new(self))
    }

    /// The register this path bottoms out at, if any.
    pub fn base_register(&self) -> Option<RegisterId> {
        match self {
            Place::Register(r) => Some(*r),
            Place::Field { base, .. } => base.base_register(),
            Place::Deref(inner) => inner.base_register(),
            Place::Discard => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Inst {
    pub dest: Place,
    pub kind: InstKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum InstKind {
    Copy(Place),
    ConstBool(bool),
    ConstInt(i64),
    MakeTuple(Vec<Place>),
    MakeStruct {
        struct_id: StructId,
        fields: Vec<Place>,
    },
    FuncRef(FuncId),
    AddrOf {
        place: Place,
        mutable: bool,
    },
    Call {
        callee: Place,
        args: Vec<Place>,
    },
}

#[derive(Debug, Clone)]
pub enum Terminator {
    Branch {
        cond: Place,
        then_seg: SegmentId,
        else_seg: SegmentId,
    },
    Goto(SegmentId),
    End,
}

#[derive(Debug)]
pub struct Segment {
    pub insts: Vec<Inst>,
    pub terminator: Terminator,
}

impl Segment {
    pub fn new() -> Self {
        Self {
            insts: Vec::new(),
            terminator: Terminator::End,
        }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

/// One function's lowered body. Segments, registers, and bindings only grow
/// during lowering; after it, inference is the only pass that mutates types.
#[derive(Debug)]
pub struct FuncBody {
    pub name: String,
    pub span: Span,
    pub segments: Vec<Segment>,
    pub registers: Vec<Register>,
    pub bindings: Vec<Binding>,
    pub param_count: usize,
}

impl FuncBody {
    pub fn new(name: String, span: Span, param_count: usize) -> Self {
        Self {
            name,
            span,
            segments: vec![Segment::new()],
            registers: Vec::new(),
            bindings: Vec::new(),
            param_count,
        }
    }

    /// The declared return type: register 0 carries it from lowering on.
    pub fn return_type(&self) -> &Type {
        &self.registers[RegisterId::RETURN.index()].ty
    }

    pub fn register(&self, id: RegisterId) -> &Register {
        &self.registers[id.index()]
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.index()]
    }

    pub fn add_register(&mut self, ty: Type, span: Span) -> RegisterId {
        let id = RegisterId(self.registers.len() as u32);
        self.registers.push(Register { ty, span });
        id
    }

    pub fn add_segment(&mut self) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(Segment::new());
        id
    }

    /// Nearest in-scope binding for a name, honoring shadowing.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.in_scope && b.name == name)
    }

    /// Most recent binding owning a register, in or out of scope.
    pub fn binding_for(&self, register: RegisterId) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| b.register == register)
    }

    /// Best-known type of a place from the current register types. Field
    /// types come from the struct declaration; unresolved bases yield
    /// `Placeholder`.
    pub fn place_type(&self, place: &Place, registry: &Registry) -> Type {
        match place {
            Place::Register(r) => self.registers[r.index()].ty.clone(),
            Place::Field { base, index } => match self.place_type(base, registry) {
                Type::Struct(id) => registry
                    .struct_def(id)
                    .fields
                    .get(*index)
                    .map(|f| f.ty.clone())
                    .unwrap_or(Type::Error),
                Type::Error => Type::Error,
                _ => Type::Placeholder,
            },
            Place::Deref(inner) => match self.place_type(inner, registry) {
                Type::Pointer { pointee, .. } => *pointee,
                Type::Error => Type::Error,
                _ => Type::Placeholder,
            },
            Place::Discard => Type::Placeholder,
        }
    }

    /// Whether a write through this place is allowed once the target is
    /// already initialized: register writes need a mutable binding, field
    /// writes additionally a mutable field, pointer writes a mutable pointer.
    /// Unnamed temporaries are writable.
    pub fn place_is_mutable(&self, place: &Place, registry: &Registry) -> bool {
        match place {
            Place::Register(r) => self
                .binding_for(*r)
                .map(|b| b.mutable)
                .unwrap_or(true),
            Place::Field { base, index } => {
                if !self.place_is_mutable(base, registry) {
                    return false;
                }
                match self.place_type(base, registry) {
                    Type::Struct(id) => registry
                        .struct_def(id)
                        .fields
                        .get(*index)
                        .map(|f| f.mutable)
                        .unwrap_or(true),
                    _ => true,
                }
            }
            Place::Deref(inner) => match self.place_type(inner, registry) {
                Type::Pointer { mutable, .. } => mutable,
                _ => true,
            },
            Place::Discard => true,
        }
    }

    /// A span to hang place-related diagnostics on: the base register's
    /// declaration site, falling back to the function's.
    pub fn place_span(&self, place: &Place) -> Span {
        place
            .base_register()
            .map(|r| self.registers[r.index()].span)
            .unwrap_or(self.span)
    }
}
