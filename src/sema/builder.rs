// src/sema/builder.rs
//! Lowers the expression tree to a control-flow graph of storage mutations.
//!
//! Lowering is a single recursive walk. Each expression is lowered "into" a
//! destination place; sub-expressions get fresh placeholder registers. A
//! failed sub-lowering returns `None` after recording its diagnostic, and the
//! enclosing block resumes with the next statement so one bad expression does
//! not hide the rest of the function.

use crate::errors::{Diagnostics, SemaError};
use crate::frontend::{Expr, ExprKind, FuncDecl, Span};
use crate::sema::cfg::{
    Binding, FuncBody, Inst, InstKind, Place, RegisterId, SegmentId, Terminator,
};
use crate::sema::infer;
use crate::sema::registry::Registry;
use crate::sema::types::Type;

/// Lower one declaration to its CFG. Register 0 carries the declared return
/// type; registers 1..=n are the parameters, pre-bound and immutable.
pub fn lower_function(
    registry: &Registry,
    decl: &FuncDecl,
    diags: &mut Diagnostics,
) -> FuncBody {
    let mut body = FuncBody::new(decl.name.clone(), decl.span, decl.params.len());

    let ret_ty = decl
        .return_type
        .as_ref()
        .map(|t| registry.resolve_type_expr(t, decl.span, diags))
        .unwrap_or_else(Type::unit);
    body.add_register(ret_ty, decl.span);

    for param in &decl.params {
        let ty = registry.resolve_type_expr(&param.ty, param.span, diags);
        let register = body.add_register(ty, param.span);
        body.bindings.push(Binding {
            name: param.name.clone(),
            register,
            mutable: false,
            decl_span: param.span,
            in_scope: true,
        });
    }

    let mut builder = Builder {
        registry,
        diags,
        body,
    };
    builder.lower_expr(
        &decl.body,
        SegmentId::ENTRY,
        Place::Register(RegisterId::RETURN),
    );

    tracing::debug!(
        segments = builder.body.segments.len(),
        registers = builder.body.registers.len(),
        "lowered function"
    );
    builder.body
}

struct Builder<'a> {
    registry: &'a Registry,
    diags: &'a mut Diagnostics,
    body: FuncBody,
}

impl Builder<'_> {
    fn emit(&mut self, seg: SegmentId, dest: Place, kind: InstKind, span: Span) {
        self.body.segments[seg.index()].insts.push(Inst { dest, kind, span });
    }

    fn set_terminator(&mut self, seg: SegmentId, terminator: Terminator) {
        self.body.segments[seg.index()].terminator = terminator;
    }

    fn fresh(&mut self, span: Span) -> RegisterId {
        self.body.add_register(Type::Placeholder, span)
    }

    /// Lower an expression into a fresh placeholder register.
    fn lower_to_register(
        &mut self,
        expr: &Expr,
        seg: SegmentId,
    ) -> Option<(RegisterId, SegmentId)> {
        let register = self.fresh(expr.span);
        let seg = self.lower_expr(expr, seg, Place::Register(register))?;
        Some((register, seg))
    }

    /// Lower `expr` into `out`, starting in `seg`. Returns the segment where
    /// control continues, or `None` if lowering failed (diagnostic recorded).
    fn lower_expr(&mut self, expr: &Expr, seg: SegmentId, out: Place) -> Option<SegmentId> {
        match &expr.kind {
            ExprKind::Block(stmts) => self.lower_block(expr, stmts, seg, out),

            ExprKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond_reg = self.body.add_register(self.registry.bool_type(), cond.span);
                let seg = self.lower_expr(cond, seg, Place::Register(cond_reg))?;

                let then_seg = self.body.add_segment();
                let else_seg = self.body.add_segment();
                let after = self.body.add_segment();
                self.set_terminator(
                    seg,
                    Terminator::Branch {
                        cond: Place::Register(cond_reg),
                        then_seg,
                        else_seg,
                    },
                );

                if let Some(end) = self.lower_expr(then_block, then_seg, out.clone()) {
                    self.set_terminator(end, Terminator::Goto(after));
                }
                match else_block {
                    Some(else_block) => {
                        if let Some(end) = self.lower_expr(else_block, else_seg, out) {
                            self.set_terminator(end, Terminator::Goto(after));
                        }
                    }
                    None => {
                        // A one-armed if is worth the empty tuple; any other
                        // use of its value surfaces as a move mismatch.
                        self.emit(else_seg, out, InstKind::MakeTuple(Vec::new()), expr.span);
                        self.set_terminator(else_seg, Terminator::Goto(after));
                    }
                }
                Some(after)
            }

            ExprKind::Let {
                name,
                mutable,
                annotation,
                init,
            } => {
                let ty = match annotation {
                    Some(annotation) => {
                        self.registry.resolve_type_expr(annotation, expr.span, self.diags)
                    }
                    None => Type::Placeholder,
                };
                let register = self.body.add_register(ty, expr.span);
                self.body.bindings.push(Binding {
                    name: name.clone(),
                    register,
                    mutable: *mutable,
                    decl_span: expr.span,
                    in_scope: true,
                });
                let mut seg = seg;
                if let Some(init) = init {
                    if let Some(next) = self.lower_expr(init, seg, Place::Register(register)) {
                        seg = next;
                    }
                }
                self.emit(seg, out, InstKind::MakeTuple(Vec::new()), expr.span);
                Some(seg)
            }

            ExprKind::Assign { target, value } => {
                let (place, seg) = self.lower_place(target, seg)?;
                let seg = self.lower_expr(value, seg, place)?;
                self.emit(seg, out, InstKind::MakeTuple(Vec::new()), expr.span);
                Some(seg)
            }

            ExprKind::Field { .. } | ExprKind::Deref(_) => {
                let (place, seg) = self.lower_place(expr, seg)?;
                self.emit(seg, out, InstKind::Copy(place), expr.span);
                Some(seg)
            }

            ExprKind::Call { callee, args } => {
                let (callee_reg, mut seg) = self.lower_to_register(callee, seg)?;
                let mut arg_places = Vec::with_capacity(args.len());
                for arg in args {
                    let (register, next) = self.lower_to_register(arg, seg)?;
                    seg = next;
                    arg_places.push(Place::Register(register));
                }
                self.emit(
                    seg,
                    out,
                    InstKind::Call {
                        callee: Place::Register(callee_reg),
                        args: arg_places,
                    },
                    expr.span,
                );
                Some(seg)
            }

            ExprKind::Name(name) => {
                if let Some(register) = self.body.lookup(name).map(|b| b.register) {
                    self.emit(seg, out, InstKind::Copy(Place::Register(register)), expr.span);
                    return Some(seg);
                }
                // Bindings shadow functions.
                if let Some(&id) = self.registry.funcs_by_name(name).first() {
                    self.emit(seg, out, InstKind::FuncRef(id), expr.span);
                    return Some(seg);
                }
                self.diags.push(SemaError::Undeclared {
                    name: name.clone(),
                    span: expr.span.into(),
                });
                None
            }

            ExprKind::Bool(value) => {
                self.emit(seg, out, InstKind::ConstBool(*value), expr.span);
                Some(seg)
            }

            ExprKind::Int(value) => {
                self.emit(seg, out, InstKind::ConstInt(*value), expr.span);
                Some(seg)
            }

            ExprKind::Tuple(elems) => {
                let mut seg = seg;
                let mut places = Vec::with_capacity(elems.len());
                for elem in elems {
                    let (register, next) = self.lower_to_register(elem, seg)?;
                    seg = next;
                    places.push(Place::Register(register));
                }
                self.emit(seg, out, InstKind::MakeTuple(places), expr.span);
                Some(seg)
            }

            ExprKind::StructLiteral { name, fields } => {
                self.lower_struct_literal(expr, name, fields, seg, out)
            }

            ExprKind::AddrOf { mutable, operand } => {
                let (place, seg) = self.lower_place(operand, seg)?;
                self.emit(
                    seg,
                    out,
                    InstKind::AddrOf {
                        place,
                        mutable: *mutable,
                    },
                    expr.span,
                );
                Some(seg)
            }

            ExprKind::Group(inner) => self.lower_expr(inner, seg, out),

            ExprKind::Return(value) => {
                let seg = match value {
                    Some(value) => {
                        self.lower_expr(value, seg, Place::Register(RegisterId::RETURN))?
                    }
                    None => {
                        self.emit(
                            seg,
                            Place::Register(RegisterId::RETURN),
                            InstKind::MakeTuple(Vec::new()),
                            expr.span,
                        );
                        seg
                    }
                };
                self.set_terminator(seg, Terminator::End);
                // Anything after the return lands in a segment no edge leads
                // to. Its destination register may stay unresolved.
                Some(self.body.add_segment())
            }
        }
    }

    fn lower_block(
        &mut self,
        expr: &Expr,
        stmts: &[Expr],
        seg: SegmentId,
        out: Place,
    ) -> Option<SegmentId> {
        let scope_mark = self.body.bindings.len();
        let mut seg = seg;

        if stmts.is_empty() {
            self.emit(seg, out, InstKind::MakeTuple(Vec::new()), expr.span);
        } else {
            let (body_stmts, last) = stmts.split_at(stmts.len() - 1);
            for stmt in body_stmts {
                // Recovery point: a failed statement keeps the current
                // segment so the rest of the block is still analyzed.
                if let Some(next) = self.lower_expr(stmt, seg, Place::Discard) {
                    seg = next;
                }
            }
            if let Some(next) = self.lower_expr(&last[0], seg, out) {
                seg = next;
            }
        }

        for binding in &mut self.body.bindings[scope_mark..] {
            binding.in_scope = false;
        }
        Some(seg)
    }

    fn lower_struct_literal(
        &mut self,
        expr: &Expr,
        name: &str,
        fields: &[(String, Expr)],
        seg: SegmentId,
        out: Place,
    ) -> Option<SegmentId> {
        let Some(struct_id) = self.registry.struct_by_name(name) else {
            self.diags.push(SemaError::UnknownType {
                name: name.to_string(),
                span: expr.span.into(),
            });
            return None;
        };

        // Field initializers run in written order; the instruction stores
        // them in declaration order.
        let mut seg = seg;
        let mut written = Vec::with_capacity(fields.len());
        for (field_name, field_expr) in fields {
            let (register, next) = self.lower_to_register(field_expr, seg)?;
            seg = next;
            written.push((field_name.as_str(), field_expr.span, register));
        }

        let def = self.registry.struct_def(struct_id);
        let mut ordered: Vec<Option<Place>> = vec![None; def.fields.len()];
        let mut failed = false;
        for (field_name, span, register) in &written {
            match def.field_index(field_name) {
                Some(index) => ordered[index] = Some(Place::Register(*register)),
                None => {
                    self.diags.push(SemaError::UnknownField {
                        name: field_name.to_string(),
                        span: (*span).into(),
                    });
                    failed = true;
                }
            }
        }
        for (index, slot) in ordered.iter().enumerate() {
            if slot.is_none() {
                self.diags.push(SemaError::MissingField {
                    struct_name: def.name.clone(),
                    field: def.fields[index].name.clone(),
                    span: expr.span.into(),
                });
                failed = true;
            }
        }
        if failed {
            return None;
        }

        let places = ordered.into_iter().flatten().collect();
        self.emit(
            seg,
            out,
            InstKind::MakeStruct {
                struct_id,
                fields: places,
            },
            expr.span,
        );
        Some(seg)
    }

    /// Lower an expression in lvalue position. Non-path expressions evaluate
    /// into a fresh register reused as the place.
    fn lower_place(&mut self, expr: &Expr, seg: SegmentId) -> Option<(Place, SegmentId)> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(register) = self.body.lookup(name).map(|b| b.register) {
                    return Some((Place::Register(register), seg));
                }
                self.diags.push(SemaError::Undeclared {
                    name: name.clone(),
                    span: expr.span.into(),
                });
                None
            }
            ExprKind::Field { base, name } => {
                let (base_place, seg) = self.lower_place(base, seg)?;
                let index = self.resolve_field(&base_place, name, expr.span)?;
                Some((base_place.field(index), seg))
            }
            ExprKind::Deref(inner) => {
                let (place, seg) = self.lower_place(inner, seg)?;
                Some((place.deref(), seg))
            }
            ExprKind::Group(inner) => self.lower_place(inner, seg),
            _ => {
                let (register, seg) = self.lower_to_register(expr, seg)?;
                Some((Place::Register(register), seg))
            }
        }
    }

    /// Map a field name to its declaration index. Field names can only be
    /// resolved against a known base type, so the partial graph is inferred
    /// first; lowering and inference interleave here.
    fn resolve_field(&mut self, base: &Place, name: &str, span: Span) -> Option<usize> {
        infer::run(&mut self.body, self.registry);
        match self.body.place_type(base, self.registry) {
            Type::Struct(id) => {
                let def = self.registry.struct_def(id);
                match def.field_index(name) {
                    Some(index) => Some(index),
                    None => {
                        self.diags.push(SemaError::UnknownField {
                            name: name.to_string(),
                            span: span.into(),
                        });
                        None
                    }
                }
            }
            Type::Error => None,
            other => {
                self.diags.push(SemaError::NotAStruct {
                    ty: other.display(self.registry).to_string(),
                    span: span.into(),
                });
                None
            }
        }
    }
}
