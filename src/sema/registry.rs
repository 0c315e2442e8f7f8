// src/sema/registry.rs
//
// Declaration tables consumed by the analysis passes: struct field layouts,
// function signatures, and the well-known builtin types. Module and name
// resolution happen before this crate runs; the registry only indexes their
// results.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{Diagnostics, SemaError};
use crate::frontend::{FuncDecl, Span, TypeExpr};
use crate::sema::types::Type;

/// Identity of a struct declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(u32);

impl StructId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a function declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(u32);

impl FuncId {
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
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub span: Span,
}

impl FuncSig {
    /// The function's type as seen by the analysis.
    pub fn ty(&self) -> Type {
        Type::funct(self.params.clone(), self.ret.clone())
    }
}

/// Well-known builtin struct ids, interned by [`Registry::with_builtins`].
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    pub bool_id: StructId,
    pub int_id: StructId,
}

#[derive(Debug)]
pub struct Registry {
    structs: Vec<StructDef>,
    struct_names: FxHashMap<String, StructId>,
    funcs: Vec<FuncSig>,
    /// Same-named declarations are all kept; ambiguity is deferred to the
    /// analysis passes.
    func_names: FxHashMap<String, SmallVec<[FuncId; 1]>>,
    well_known: WellKnown,
}

impl Registry {
    /// Create a registry with the builtin `Bool` and `Int` structs interned.
    pub fn with_builtins() -> Self {
        let mut registry = Registry {
            structs: Vec::new(),
            struct_names: FxHashMap::default(),
            funcs: Vec::new(),
            func_names: FxHashMap::default(),
            well_known: WellKnown {
                bool_id: StructId(0),
                int_id: StructId(0),
            },
        };
        let bool_id = registry.declare_struct("Bool");
        let int_id = registry.declare_struct("Int");
        registry.well_known = WellKnown { bool_id, int_id };
        registry
    }

    #[inline]
    pub fn well_known(&self) -> WellKnown {
        self.well_known
    }

    pub fn bool_type(&self) -> Type {
        Type::Struct(self.well_known.bool_id)
    }

    pub fn int_type(&self) -> Type {
        Type::Struct(self.well_known.int_id)
    }

    /// Declare a struct with no fields yet; later declarations shadow earlier
    /// ones in the name table.
    pub fn declare_struct(&mut self, name: &str) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructDef {
            name: name.to_string(),
            fields: Vec::new(),
        });
        self.struct_names.insert(name.to_string(), id);
        id
    }

    /// Attach the resolved field layout to a declared struct.
    pub fn define_fields(&mut self, id: StructId, fields: Vec<FieldDef>) {
        self.structs[id.index()].fields = fields;
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    pub fn func_sig(&self, id: FuncId) -> &FuncSig {
        &self.funcs[id.index()]
    }

    /// All function declarations sharing a name, oldest first.
    pub fn funcs_by_name(&self, name: &str) -> &[FuncId] {
        self.func_names
            .get(name)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a declaration's signature and record it. Unknown annotation
    /// names degrade to `Type::Error` with a diagnostic.
    pub fn register_func(&mut self, decl: &FuncDecl, diags: &mut Diagnostics) -> FuncId {
        let params = decl
            .params
            .iter()
            .map(|p| self.resolve_type_expr(&p.ty, p.span, diags))
            .collect();
        let ret = decl
            .return_type
            .as_ref()
            .map(|t| self.resolve_type_expr(t, decl.span, diags))
            .unwrap_or_else(Type::unit);

        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(FuncSig {
            name: decl.name.clone(),
            params,
            ret,
            span: decl.span,
        });
        self.func_names
            .entry(decl.name.clone())
            .or_default()
            .push(id);
        id
    }

    /// Resolve a source-level annotation to a semantic type.
    pub fn resolve_type_expr(
        &self,
        annotation: &TypeExpr,
        span: Span,
        diags: &mut Diagnostics,
    ) -> Type {
        match annotation {
            TypeExpr::Named(name) => match self.struct_by_name(name) {
                Some(id) => Type::Struct(id),
                None => {
                    diags.push(SemaError::UnknownType {
                        name: name.clone(),
                        span: span.into(),
                    });
                    Type::Error
                }
            },
            TypeExpr::Pointer { mutable, pointee } => Type::pointer(
                *mutable,
                self.resolve_type_expr(pointee, span, diags),
            ),
            TypeExpr::Tuple(elems) => Type::Tuple(
                elems
                    .iter()
                    .map(|e| self.resolve_type_expr(e, span, diags))
                    .collect(),
            ),
            TypeExpr::Func { params, ret } => Type::funct(
                params
                    .iter()
                    .map(|p| self.resolve_type_expr(p, span, diags))
                    .collect(),
                self.resolve_type_expr(ret, span, diags),
            ),
        }
    }
}
