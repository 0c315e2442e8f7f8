// src/sema/infer.rs
//! Fixpoint type inference over the lowered CFG.
//!
//! Each sweep walks every instruction and pushes type information across it
//! in both directions: destinations learn from sources and sources learn
//! from destinations. The only mutation is filling a `Placeholder` with a
//! more concrete type, so progress is monotonic and the sweep loop
//! terminates once no register changes.
//!
//! Conflicting concrete types are left alone here; the checker reports them.

use crate::sema::cfg::{FuncBody, Inst, InstKind, Place, Terminator};
use crate::sema::registry::Registry;
use crate::sema::types::Type;

/// Sweep until no register type changes. Self-referential bindings could
/// otherwise grow a pointer type without bound, so the sweep count is capped
/// and the checker reports whatever is left unresolved.
pub fn run(body: &mut FuncBody, registry: &Registry) {
    let max_sweeps = body.registers.len() + 8;
    let mut sweeps = 0;
    while sweep(body, registry) {
        sweeps += 1;
        if sweeps >= max_sweeps {
            tracing::debug!(sweeps, "inference sweep cap reached");
            return;
        }
    }
    tracing::trace!(sweeps, "inference converged");
}

fn sweep(body: &mut FuncBody, registry: &Registry) -> bool {
    let mut changed = false;
    for seg_idx in 0..body.segments.len() {
        for inst_idx in 0..body.segments[seg_idx].insts.len() {
            let inst = body.segments[seg_idx].insts[inst_idx].clone();
            changed |= propagate(body, registry, &inst);
        }
        if let Terminator::Branch { cond, .. } = body.segments[seg_idx].terminator.clone() {
            changed |= store_place_type(body, registry, &cond, &registry.bool_type());
        }
    }
    changed
}

fn propagate(body: &mut FuncBody, registry: &Registry, inst: &Inst) -> bool {
    match &inst.kind {
        InstKind::Copy(src) => unify_places(body, registry, src, &inst.dest),

        InstKind::ConstBool(_) => {
            store_place_type(body, registry, &inst.dest, &registry.bool_type())
        }
        InstKind::ConstInt(_) => {
            store_place_type(body, registry, &inst.dest, &registry.int_type())
        }

        InstKind::MakeTuple(elems) => {
            let elem_tys = elems
                .iter()
                .map(|p| body.place_type(p, registry))
                .collect();
            let mut tuple = Type::Tuple(elem_tys);
            let mut dst = body.place_type(&inst.dest, registry);
            unify(&mut tuple, &mut dst);
            let mut changed = store_place_type(body, registry, &inst.dest, &tuple);
            if let Type::Tuple(elem_tys) = &tuple {
                for (place, ty) in elems.iter().zip(elem_tys) {
                    changed |= store_place_type(body, registry, place, ty);
                }
            }
            changed
        }

        InstKind::MakeStruct { struct_id, fields } => {
            let mut changed =
                store_place_type(body, registry, &inst.dest, &Type::Struct(*struct_id));
            let field_tys: Vec<Type> = registry
                .struct_def(*struct_id)
                .fields
                .iter()
                .map(|f| f.ty.clone())
                .collect();
            for (place, ty) in fields.iter().zip(&field_tys) {
                changed |= store_place_type(body, registry, place, ty);
            }
            changed
        }

        InstKind::FuncRef(id) => {
            store_place_type(body, registry, &inst.dest, &registry.func_sig(*id).ty())
        }

        InstKind::AddrOf { place, mutable } => {
            let mut pointer = Type::pointer(*mutable, body.place_type(place, registry));
            let mut dst = body.place_type(&inst.dest, registry);
            unify(&mut pointer, &mut dst);
            let mut changed = store_place_type(body, registry, &inst.dest, &pointer);
            if let Type::Pointer { pointee, .. } = pointer {
                changed |= store_place_type(body, registry, place, &pointee);
            }
            changed
        }

        InstKind::Call { callee, args } => {
            // Until the callee resolves to a function type there is nothing
            // to push through the call.
            let Type::Funct { mut params, mut ret } = body.place_type(callee, registry) else {
                return false;
            };
            let mut changed = false;
            let mut dst = body.place_type(&inst.dest, registry);
            unify(&mut ret, &mut dst);
            changed |= store_place_type(body, registry, &inst.dest, &ret);
            for (index, arg) in args.iter().enumerate() {
                if let Some(param) = params.get_mut(index) {
                    let mut arg_ty = body.place_type(arg, registry);
                    unify(param, &mut arg_ty);
                    changed |= store_place_type(body, registry, arg, param);
                }
            }
            changed |= store_place_type(body, registry, callee, &Type::Funct { params, ret });
            changed
        }
    }
}

/// Unify the types of two places and store whatever either side learned.
fn unify_places(body: &mut FuncBody, registry: &Registry, a: &Place, b: &Place) -> bool {
    let mut ta = body.place_type(a, registry);
    let mut tb = body.place_type(b, registry);
    unify(&mut ta, &mut tb);
    store_place_type(body, registry, a, &ta) | store_place_type(body, registry, b, &tb)
}

/// Fill placeholders on either side from the other. Same-kind composites
/// recurse; mismatched kinds are left for the checker. Returns whether
/// either side changed.
pub fn unify(a: &mut Type, b: &mut Type) -> bool {
    if matches!(a, Type::Placeholder) && !matches!(b, Type::Placeholder) {
        *a = b.clone();
        return true;
    }
    if matches!(b, Type::Placeholder) && !matches!(a, Type::Placeholder) {
        *b = a.clone();
        return true;
    }
    match (a, b) {
        (Type::Pointer { pointee: pa, .. }, Type::Pointer { pointee: pb, .. }) => unify(pa, pb),
        (Type::Tuple(ea), Type::Tuple(eb)) if ea.len() == eb.len() => {
            let mut changed = false;
            for (x, y) in ea.iter_mut().zip(eb.iter_mut()) {
                changed |= unify(x, y);
            }
            changed
        }
        (
            Type::Funct { params: pa, ret: ra },
            Type::Funct { params: pb, ret: rb },
        ) if pa.len() == pb.len() => {
            let mut changed = false;
            for (x, y) in pa.iter_mut().zip(pb.iter_mut()) {
                changed |= unify(x, y);
            }
            changed | unify(ra, rb)
        }
        _ => false,
    }
}

/// One-directional refinement: placeholders in `slot` are filled from
/// `from`; nothing concrete is ever overwritten.
fn refine(slot: &mut Type, from: &Type) -> bool {
    if matches!(slot, Type::Placeholder) {
        if matches!(from, Type::Placeholder) {
            return false;
        }
        *slot = from.clone();
        return true;
    }
    match (slot, from) {
        (Type::Pointer { pointee: pa, .. }, Type::Pointer { pointee: pb, .. }) => refine(pa, pb),
        (Type::Tuple(ea), Type::Tuple(eb)) if ea.len() == eb.len() => {
            let mut changed = false;
            for (x, y) in ea.iter_mut().zip(eb) {
                changed |= refine(x, y);
            }
            changed
        }
        (
            Type::Funct { params: pa, ret: ra },
            Type::Funct { params: pb, ret: rb },
        ) if pa.len() == pb.len() => {
            let mut changed = false;
            for (x, y) in pa.iter_mut().zip(pb) {
                changed |= refine(x, y);
            }
            changed | refine(ra, rb)
        }
        _ => false,
    }
}

/// Push a learned type back into the storage a place names. Only register
/// table mutations count as change; field types are fixed by declarations,
/// and `Discard` has no storage.
fn store_place_type(body: &mut FuncBody, registry: &Registry, place: &Place, ty: &Type) -> bool {
    match place {
        Place::Register(r) => refine(&mut body.registers[r.index()].ty, ty),
        Place::Field { .. } => false,
        Place::Deref(inner) => match body.place_type(inner, registry) {
            Type::Pointer { mutable, .. } => {
                store_place_type(body, registry, inner, &Type::pointer(mutable, ty.clone()))
            }
            _ => false,
        },
        Place::Discard => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Diagnostics;
    use crate::frontend::{Expr, ExprKind, FuncDecl, Span};
    use crate::sema::cfg::SegmentId;

    fn body_with_return(ret: Type) -> FuncBody {
        let mut body = FuncBody::new("f".into(), Span::default(), 0);
        body.add_register(ret, Span::default());
        body
    }

    fn push(body: &mut FuncBody, dest: Place, kind: InstKind) {
        body.segments[SegmentId::ENTRY.index()].insts.push(Inst {
            dest,
            kind,
            span: Span::default(),
        });
    }

    #[test]
    fn literals_type_their_registers() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let r = body.add_register(Type::Placeholder, Span::default());
        push(&mut body, Place::Register(r), InstKind::ConstInt(7));

        run(&mut body, &registry);
        assert_eq!(body.register(r).ty, registry.int_type());
    }

    #[test]
    fn copy_propagates_both_directions() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let src = body.add_register(registry.int_type(), Span::default());
        let dst = body.add_register(Type::Placeholder, Span::default());
        push(&mut body, Place::Register(dst), InstKind::Copy(Place::Register(src)));

        // Backward: annotated destination types an unknown source.
        let src2 = body.add_register(Type::Placeholder, Span::default());
        let dst2 = body.add_register(registry.bool_type(), Span::default());
        push(&mut body, Place::Register(dst2), InstKind::Copy(Place::Register(src2)));

        run(&mut body, &registry);
        assert_eq!(body.register(dst).ty, registry.int_type());
        assert_eq!(body.register(src2).ty, registry.bool_type());
    }

    #[test]
    fn call_pushes_params_and_return() {
        let mut registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let decl = FuncDecl {
            name: "g".into(),
            params: vec![crate::frontend::Param {
                name: "a".into(),
                ty: crate::frontend::TypeExpr::Named("Int".into()),
                span: Span::default(),
            }],
            return_type: Some(crate::frontend::TypeExpr::Named("Bool".into())),
            body: Expr::new(ExprKind::Block(Vec::new()), Span::default()),
            span: Span::default(),
        };
        let id = registry.register_func(&decl, &mut diags);
        assert!(diags.is_empty());

        let mut body = body_with_return(Type::unit());
        let callee = body.add_register(Type::Placeholder, Span::default());
        let arg = body.add_register(Type::Placeholder, Span::default());
        let out = body.add_register(Type::Placeholder, Span::default());
        push(&mut body, Place::Register(callee), InstKind::FuncRef(id));
        push(
            &mut body,
            Place::Register(out),
            InstKind::Call {
                callee: Place::Register(callee),
                args: vec![Place::Register(arg)],
            },
        );

        run(&mut body, &registry);
        assert_eq!(body.register(arg).ty, registry.int_type());
        assert_eq!(body.register(out).ty, registry.bool_type());
    }

    #[test]
    fn branch_condition_becomes_bool() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let cond = body.add_register(Type::Placeholder, Span::default());
        let then_seg = body.add_segment();
        let else_seg = body.add_segment();
        body.segments[SegmentId::ENTRY.index()].terminator = Terminator::Branch {
            cond: Place::Register(cond),
            then_seg,
            else_seg,
        };

        run(&mut body, &registry);
        assert_eq!(body.register(cond).ty, registry.bool_type());
    }

    #[test]
    fn run_reaches_a_fixpoint() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let a = body.add_register(Type::Placeholder, Span::default());
        let b = body.add_register(Type::Placeholder, Span::default());
        push(&mut body, Place::Register(a), InstKind::ConstInt(1));
        push(&mut body, Place::Register(b), InstKind::Copy(Place::Register(a)));

        run(&mut body, &registry);
        assert!(!sweep(&mut body, &registry));
    }

    #[test]
    fn conflicting_concrete_types_are_left_alone() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let r = body.add_register(registry.bool_type(), Span::default());
        push(&mut body, Place::Register(r), InstKind::ConstInt(1));

        run(&mut body, &registry);
        // No coercion, no overwrite; the checker owns the mismatch.
        assert_eq!(body.register(r).ty, registry.bool_type());
    }

    #[test]
    fn tuple_elements_learn_from_annotation() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let elem = body.add_register(Type::Placeholder, Span::default());
        let dst = body.add_register(
            Type::Tuple(vec![registry.int_type()]),
            Span::default(),
        );
        push(
            &mut body,
            Place::Register(dst),
            InstKind::MakeTuple(vec![Place::Register(elem)]),
        );

        run(&mut body, &registry);
        assert_eq!(body.register(elem).ty, registry.int_type());
    }

    #[test]
    fn write_through_pointer_types_the_pointee() {
        let registry = Registry::with_builtins();
        let mut body = body_with_return(Type::unit());
        let ptr = body.add_register(
            Type::pointer(true, Type::Placeholder),
            Span::default(),
        );
        push(
            &mut body,
            Place::Register(ptr).deref(),
            InstKind::ConstInt(4),
        );

        run(&mut body, &registry);
        assert_eq!(
            body.register(ptr).ty,
            Type::pointer(true, registry.int_type())
        );
    }
}
