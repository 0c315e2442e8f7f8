// src/sema/check.rs
//! Validates the fully-inferred CFG without mutating it.
//!
//! Every storage mutation is checked for structural compatibility between
//! the produced type and the destination's type. `Error` and any remaining
//! `Placeholder` are compatible with everything so one failure does not
//! cascade; unresolved named bindings get their own diagnostic at the end.

use crate::errors::{Diagnostics, SemaError};
use crate::frontend::Span;
use crate::sema::cfg::{FuncBody, Inst, InstKind, Place, RegisterId, Terminator};
use crate::sema::registry::Registry;
use crate::sema::types::Type;

pub fn run(body: &FuncBody, registry: &Registry, diags: &mut Diagnostics) {
    let mut checker = Checker {
        body,
        registry,
        diags,
    };
    checker.check();
}

struct Checker<'a> {
    body: &'a FuncBody,
    registry: &'a Registry,
    diags: &'a mut Diagnostics,
}

impl Checker<'_> {
    fn check(&mut self) {
        let body = self.body;
        for segment in &body.segments {
            for inst in &segment.insts {
                self.check_inst(inst);
            }
            if let Terminator::Branch { cond, .. } = &segment.terminator {
                self.check_condition(cond);
            }
        }
        self.check_resolution();
    }

    fn check_inst(&mut self, inst: &Inst) {
        self.validate_place(&inst.dest, inst.span);

        let produced = match &inst.kind {
            InstKind::Copy(src) => {
                self.validate_place(src, inst.span);
                self.place_type(src)
            }
            InstKind::ConstBool(_) => self.registry.bool_type(),
            InstKind::ConstInt(_) => self.registry.int_type(),
            InstKind::MakeTuple(elems) => {
                for place in elems {
                    self.validate_place(place, inst.span);
                }
                Type::Tuple(elems.iter().map(|p| self.place_type(p)).collect())
            }
            InstKind::MakeStruct { struct_id, fields } => {
                for (place, field) in fields
                    .iter()
                    .zip(&self.registry.struct_def(*struct_id).fields)
                {
                    self.validate_place(place, inst.span);
                    let found = self.place_type(place);
                    if !compatible(&found, &field.ty) {
                        self.push_move_mismatch(&field.ty, &found, inst.span, false);
                    }
                }
                Type::Struct(*struct_id)
            }
            InstKind::FuncRef(id) => self.registry.func_sig(*id).ty(),
            InstKind::AddrOf { place, mutable } => {
                self.validate_place(place, inst.span);
                if *mutable && !self.body.place_is_mutable(place, self.registry) {
                    self.diags.push(SemaError::IncompatibleMutability {
                        span: inst.span.into(),
                    });
                }
                Type::pointer(*mutable, self.place_type(place))
            }
            InstKind::Call { callee, args } => {
                match self.check_call(callee, args, inst.span) {
                    Some(ret) => ret,
                    None => return,
                }
            }
        };

        let expected = self.place_type(&inst.dest);
        if !compatible(&produced, &expected) {
            let to_return = inst.dest == Place::Register(RegisterId::RETURN);
            self.push_move_mismatch(&expected, &produced, inst.span, to_return);
        }
    }

    fn check_call(&mut self, callee: &Place, args: &[Place], span: Span) -> Option<Type> {
        self.validate_place(callee, span);
        for arg in args {
            self.validate_place(arg, span);
        }
        let callee_ty = self.place_type(callee);
        let (params, ret) = match callee_ty {
            Type::Funct { params, ret } => (params, ret),
            Type::Error | Type::Placeholder => return None,
            other => {
                self.diags.push(SemaError::UncallableType {
                    ty: other.display(self.registry).to_string(),
                    span: span.into(),
                });
                return None;
            }
        };

        if args.len() != params.len() {
            self.diags.push(SemaError::WrongNumberOfArguments {
                expected: params.len(),
                found: args.len(),
                span: span.into(),
            });
        }
        for (arg, param) in args.iter().zip(&params) {
            let found = self.place_type(arg);
            if !compatible(&found, param) {
                self.push_move_mismatch(param, &found, span, false);
            }
        }
        Some(*ret)
    }

    fn check_condition(&mut self, cond: &Place) {
        let expected = self.registry.bool_type();
        let found = self.place_type(cond);
        if !compatible(&found, &expected) {
            let span = self.body.place_span(cond);
            self.push_move_mismatch(&expected, &found, span, false);
        }
    }

    /// Dereferences of a resolved non-pointer are the one place error, so
    /// they are checked wherever a place appears.
    fn validate_place(&mut self, place: &Place, span: Span) {
        match place {
            Place::Register(_) | Place::Discard => {}
            Place::Field { base, .. } => self.validate_place(base, span),
            Place::Deref(inner) => {
                self.validate_place(inner, span);
                match self.place_type(inner) {
                    Type::Pointer { .. } | Type::Placeholder | Type::Error => {}
                    other => {
                        self.diags.push(SemaError::CannotDereferenceType {
                            ty: other.display(self.registry).to_string(),
                            span: span.into(),
                        });
                    }
                }
            }
        }
    }

    /// Named bindings that never resolved get a source-facing diagnostic.
    /// Unresolved temporaries with no other error in the function mean the
    /// analysis itself dropped a constraint.
    fn check_resolution(&mut self) {
        let body = self.body;
        let mut unresolved_temps = Vec::new();
        let mut named_failure = false;
        for (index, register) in body.registers.iter().enumerate() {
            if register.ty.is_resolved() {
                continue;
            }
            match body.binding_for(RegisterId::new(index as u32)) {
                Some(binding) => {
                    self.diags.push(SemaError::InferenceFailed {
                        name: binding.name.clone(),
                        span: binding.decl_span.into(),
                    });
                    named_failure = true;
                }
                None => unresolved_temps.push(index),
            }
        }
        if named_failure || self.diags.has_errors() {
            return;
        }
        for index in unresolved_temps {
            self.diags.push(SemaError::Internal {
                message: format!("register r{index} left unresolved"),
                span: body.registers[index].span.into(),
            });
        }
    }

    fn place_type(&self, place: &Place) -> Type {
        self.body.place_type(place, self.registry)
    }

    fn push_move_mismatch(&mut self, expected: &Type, found: &Type, span: Span, to_return: bool) {
        let expected = expected.display(self.registry).to_string();
        let found = found.display(self.registry).to_string();
        if to_return {
            self.diags.push(SemaError::WrongReturnType {
                expected,
                found,
                span: span.into(),
            });
        } else {
            self.diags.push(SemaError::IncompatibleMove {
                expected,
                found,
                span: span.into(),
            });
        }
    }
}

/// Structural compatibility. Structs compare by identity; pointers must
/// agree on mutability; `Error` and `Placeholder` match anything so earlier
/// failures stay single diagnostics.
fn compatible(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Error, _) | (_, Type::Error) => true,
        (Type::Placeholder, _) | (_, Type::Placeholder) => true,
        (Type::Struct(x), Type::Struct(y)) => x == y,
        (
            Type::Pointer {
                mutable: ma,
                pointee: pa,
            },
            Type::Pointer {
                mutable: mb,
                pointee: pb,
            },
        ) => ma == mb && compatible(pa, pb),
        (Type::Tuple(ea), Type::Tuple(eb)) => {
            ea.len() == eb.len() && ea.iter().zip(eb).all(|(x, y)| compatible(x, y))
        }
        (
            Type::Funct { params: pa, ret: ra },
            Type::Funct { params: pb, ret: rb },
        ) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(x, y)| compatible(x, y))
                && compatible(ra, rb)
        }
        _ => false,
    }
}
