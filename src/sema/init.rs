// src/sema/init.rs
//! Flow-sensitive definite-initialization and mutability analysis.
//!
//! Each register carries an initialization status tree that starts as a
//! single leaf and expands to per-field leaves on first field access. Status
//! nodes live in an append-only arena; a flow state is just a vector of node
//! indices, so forking it at a branch is a cheap clone and mutation is a
//! path-copy of the touched spine. Sibling branches never see each other's
//! writes.
//!
//! Loops are handled conservatively: a segment already on the active
//! recursion path is not re-descended, so loop-carried initialization is not
//! assumed on re-entry.

use rustc_hash::FxHashSet;

use crate::errors::{Diagnostics, SemaError};
use crate::frontend::Span;
use crate::sema::cfg::{FuncBody, Inst, InstKind, Place, RegisterId, SegmentId, Terminator};
use crate::sema::registry::Registry;
use crate::sema::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
enum StatusNode {
    Leaf(bool),
    Fields(Vec<NodeId>),
}

/// Append-only arena of status nodes. Mutation allocates new nodes; states
/// holding old indices are unaffected.
#[derive(Debug, Default)]
struct StatusArena {
    nodes: Vec<StatusNode>,
}

impl StatusArena {
    fn leaf(&mut self, initialized: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StatusNode::Leaf(initialized));
        id
    }

    fn fields(&mut self, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StatusNode::Fields(children));
        id
    }

    fn node(&self, id: NodeId) -> &StatusNode {
        &self.nodes[id.index()]
    }

    fn is_initialized(&self, id: NodeId) -> bool {
        match &self.nodes[id.index()] {
            StatusNode::Leaf(initialized) => *initialized,
            StatusNode::Fields(children) => {
                children.iter().all(|&child| self.is_initialized(child))
            }
        }
    }

    /// A field-bearing view of a node: leaves split into `count` children
    /// inheriting the leaf's status, field nodes pass through.
    fn expand(&mut self, id: NodeId, count: usize) -> NodeId {
        match self.nodes[id.index()].clone() {
            StatusNode::Fields(_) => id,
            StatusNode::Leaf(initialized) => {
                let children = (0..count).map(|_| self.leaf(initialized)).collect();
                self.fields(children)
            }
        }
    }
}

/// Per-path initialization state: one status node per register.
#[derive(Debug, Clone)]
struct FlowState {
    regs: Vec<NodeId>,
}

pub fn run(body: &FuncBody, registry: &Registry, diags: &mut Diagnostics) {
    let mut arena = StatusArena::default();
    let regs = (0..body.registers.len())
        .map(|index| arena.leaf(index >= 1 && index <= body.param_count))
        .collect();

    let mut checker = InitChecker {
        body,
        registry,
        diags,
        arena,
        write_spans: vec![FxHashSet::default(); body.registers.len()],
        reported_uninit: FxHashSet::default(),
        reported_immutable: FxHashSet::default(),
        reported_return: FxHashSet::default(),
        on_path: vec![false; body.segments.len()],
    };
    checker.walk(SegmentId::ENTRY, FlowState { regs });
    checker.finish();
}

struct InitChecker<'a> {
    body: &'a FuncBody,
    registry: &'a Registry,
    diags: &'a mut Diagnostics,
    arena: StatusArena,
    /// Distinct write sites per register; joins revisit segments, so sites
    /// are counted by span rather than by visit.
    write_spans: Vec<FxHashSet<Span>>,
    reported_uninit: FxHashSet<Span>,
    reported_immutable: FxHashSet<Span>,
    reported_return: FxHashSet<Span>,
    on_path: Vec<bool>,
}

impl InitChecker<'_> {
    fn walk(&mut self, seg: SegmentId, mut state: FlowState) {
        if self.on_path[seg.index()] {
            return;
        }
        self.on_path[seg.index()] = true;

        let body = self.body;
        for inst in &body.segments[seg.index()].insts {
            self.check_inst(inst, &mut state);
        }
        match &body.segments[seg.index()].terminator {
            Terminator::Branch {
                cond,
                then_seg,
                else_seg,
            } => {
                self.check_read(cond, &mut state, body.place_span(cond));
                self.walk(*then_seg, state.clone());
                self.walk(*else_seg, state);
            }
            Terminator::Goto(next) => self.walk(*next, state),
            Terminator::End => self.check_return(&mut state),
        }

        self.on_path[seg.index()] = false;
    }

    fn check_inst(&mut self, inst: &Inst, state: &mut FlowState) {
        match &inst.kind {
            InstKind::Copy(src) => self.check_read(src, state, inst.span),
            InstKind::ConstBool(_) | InstKind::ConstInt(_) | InstKind::FuncRef(_) => {}
            InstKind::MakeTuple(elems) => {
                for place in elems {
                    self.check_read(place, state, inst.span);
                }
            }
            InstKind::MakeStruct { fields, .. } => {
                for place in fields {
                    self.check_read(place, state, inst.span);
                }
            }
            InstKind::AddrOf { place, mutable } => {
                self.check_read(place, state, inst.span);
                // A mutable borrow hands out write access, so it counts as a
                // write site for the warning sweep.
                if *mutable && !contains_deref(place) {
                    if let Some(base) = place.base_register() {
                        self.write_spans[base.index()].insert(inst.span);
                    }
                }
            }
            InstKind::Call { callee, args } => {
                self.check_read(callee, state, inst.span);
                for arg in args {
                    self.check_read(arg, state, inst.span);
                }
            }
        }
        self.check_write(&inst.dest, state, inst.span);
    }

    /// A dereference read only requires the pointer itself to be
    /// initialized; what it points at is outside this model.
    fn check_read(&mut self, place: &Place, state: &mut FlowState, span: Span) {
        match place {
            Place::Discard => {}
            Place::Deref(inner) => self.check_read(inner, state, span),
            _ => {
                // Field paths may cross a pointer; the pointer itself still
                // has to be initialized even though the leaf is untracked.
                self.check_path_pointers(place, state, span);
                if let Some(node) = self.resolve_node(place, state) {
                    if !self.arena.is_initialized(node) {
                        self.report_uninit(span);
                    }
                }
            }
        }
    }

    fn check_write(&mut self, place: &Place, state: &mut FlowState, span: Span) {
        if matches!(place, Place::Discard) {
            return;
        }
        self.check_path_pointers(place, state, span);

        match self.resolve_node(place, state) {
            Some(node) => {
                // First writes initialize; only overwrites need mutability.
                if self.arena.is_initialized(node)
                    && !self.body.place_is_mutable(place, self.registry)
                {
                    self.report_immutable(span);
                }
                let done = self.arena.leaf(true);
                self.replace_node(place, done, state);
            }
            None => {
                // The path reaches through a pointer; pointee state is
                // untracked, so the write only needs the path to be mutable.
                if !self.body.place_is_mutable(place, self.registry) {
                    self.report_immutable(span);
                }
            }
        }

        if !contains_deref(place) {
            if let Some(base) = place.base_register() {
                self.write_spans[base.index()].insert(span);
            }
        }
    }

    /// Pointers crossed by an access path must themselves be initialized.
    fn check_path_pointers(&mut self, place: &Place, state: &mut FlowState, span: Span) {
        match place {
            Place::Deref(inner) => self.check_read(inner, state, span),
            Place::Field { base, .. } => self.check_path_pointers(base, state, span),
            Place::Register(_) | Place::Discard => {}
        }
    }

    /// The status node a place currently names, expanding leaves into field
    /// trees on the way down. `None` for paths crossing a pointer.
    fn resolve_node(&mut self, place: &Place, state: &mut FlowState) -> Option<NodeId> {
        match place {
            Place::Register(r) => Some(state.regs[r.index()]),
            Place::Field { base, index } => {
                let base_node = self.resolve_node(base, state)?;
                let count = match self.body.place_type(base, self.registry) {
                    Type::Struct(id) => self.registry.struct_def(id).fields.len(),
                    _ => return None,
                };
                let expanded = self.arena.expand(base_node, count);
                if expanded != base_node {
                    self.replace_node(base, expanded, state);
                }
                match self.arena.node(expanded) {
                    StatusNode::Fields(children) => children.get(*index).copied(),
                    StatusNode::Leaf(_) => None,
                }
            }
            Place::Deref(_) | Place::Discard => None,
        }
    }

    /// Path-copy: swap in a new node for `place`, rebuilding each ancestor.
    fn replace_node(&mut self, place: &Place, node: NodeId, state: &mut FlowState) {
        match place {
            Place::Register(r) => state.regs[r.index()] = node,
            Place::Field { base, index } => {
                let Some(base_node) = self.resolve_node(base, state) else {
                    return;
                };
                if let StatusNode::Fields(children) = self.arena.node(base_node) {
                    let mut children = children.clone();
                    if *index < children.len() {
                        children[*index] = node;
                        let new_base = self.arena.fields(children);
                        self.replace_node(base, new_base, state);
                    }
                }
            }
            Place::Deref(_) | Place::Discard => {}
        }
    }

    /// At a path's end, register 0 must have been written; unit-returning
    /// functions get the write synthesized.
    fn check_return(&mut self, state: &mut FlowState) {
        let ret = state.regs[RegisterId::RETURN.index()];
        if self.arena.is_initialized(ret) {
            return;
        }
        let span = self.body.span;
        if self.body.return_type().is_unit() {
            self.check_write(&Place::Register(RegisterId::RETURN), state, span);
            return;
        }
        if self.reported_return.insert(span) {
            self.diags.push(SemaError::MissingReturn { span: span.into() });
        }
    }

    /// Mutable bindings with at most one write site never needed `mut`.
    fn finish(&mut self) {
        let body = self.body;
        for binding in &body.bindings {
            if !binding.mutable {
                continue;
            }
            if self.write_spans[binding.register.index()].len() <= 1 {
                self.diags.push(SemaError::UnusedMutability {
                    name: binding.name.clone(),
                    span: binding.decl_span.into(),
                });
            }
        }
    }

    fn report_uninit(&mut self, span: Span) {
        if self.reported_uninit.insert(span) {
            self.diags
                .push(SemaError::UninitializedUse { span: span.into() });
        }
    }

    fn report_immutable(&mut self, span: Span) {
        if self.reported_immutable.insert(span) {
            self.diags
                .push(SemaError::IncompatibleMutability { span: span.into() });
        }
    }
}

fn contains_deref(place: &Place) -> bool {
    match place {
        Place::Deref(_) => true,
        Place::Field { base, .. } => contains_deref(base),
        Place::Register(_) | Place::Discard => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::cfg::Binding;
    use crate::sema::registry::{FieldDef, StructId};

    fn registry_with_data() -> (Registry, StructId) {
        let mut registry = Registry::with_builtins();
        let int = registry.int_type();
        let bool_ty = registry.bool_type();
        let data = registry.declare_struct("Data");
        registry.define_fields(
            data,
            vec![
                FieldDef {
                    name: "i".into(),
                    ty: int,
                    mutable: true,
                },
                FieldDef {
                    name: "b".into(),
                    ty: bool_ty,
                    mutable: true,
                },
            ],
        );
        (registry, data)
    }

    fn body_with_return(ret: Type) -> FuncBody {
        let mut body = FuncBody::new("f".into(), Span::new(0, 1), 0);
        body.add_register(ret, Span::new(0, 1));
        body
    }

    fn push(body: &mut FuncBody, seg: SegmentId, dest: Place, kind: InstKind, at: u32) {
        body.segments[seg.index()].insts.push(Inst {
            dest,
            kind,
            span: Span::new(at, at + 1),
        });
    }

    fn bind(body: &mut FuncBody, name: &str, register: RegisterId, mutable: bool) {
        body.bindings.push(Binding {
            name: name.into(),
            register,
            mutable,
            decl_span: Span::new(90, 91),
            in_scope: true,
        });
    }

    #[test]
    fn read_before_write_is_reported() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let x = body.add_register(registry.int_type(), Span::new(2, 3));
        let y = body.add_register(registry.int_type(), Span::new(4, 5));
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(y),
            InstKind::Copy(Place::Register(x)),
            10,
        );
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            11,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UninitializedUse { .. })));
    }

    #[test]
    fn field_writes_track_partial_initialization() {
        let (registry, data) = registry_with_data();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let d = body.add_register(Type::Struct(data), Span::new(2, 3));
        let y = body.add_register(registry.int_type(), Span::new(4, 5));
        // d.i = 0; y = d.i
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(d).field(0),
            InstKind::ConstInt(0),
            10,
        );
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(y),
            InstKind::Copy(Place::Register(d).field(0)),
            11,
        );
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            12,
        );

        run(&body, &registry, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags.iter().collect::<Vec<_>>());
    }

    #[test]
    fn unwritten_field_read_is_reported() {
        let (registry, data) = registry_with_data();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let d = body.add_register(Type::Struct(data), Span::new(2, 3));
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(d).field(0),
            InstKind::ConstInt(0),
            10,
        );
        // d.b was never written.
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Discard,
            InstKind::Copy(Place::Register(d).field(1)),
            11,
        );
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            12,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UninitializedUse { .. })));
    }

    #[test]
    fn sibling_branches_do_not_share_writes() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let cond = body.add_register(registry.bool_type(), Span::new(2, 3));
        let x = body.add_register(registry.int_type(), Span::new(4, 5));

        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(cond),
            InstKind::ConstBool(true),
            10,
        );
        let then_seg = body.add_segment();
        let else_seg = body.add_segment();
        body.segments[SegmentId::ENTRY.index()].terminator = Terminator::Branch {
            cond: Place::Register(cond),
            then_seg,
            else_seg,
        };
        // Only the then-arm writes x; the else-arm reads it.
        push(&mut body, then_seg, Place::Register(x), InstKind::ConstInt(1), 11);
        push(
            &mut body,
            else_seg,
            Place::Discard,
            InstKind::Copy(Place::Register(x)),
            12,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UninitializedUse { .. })));
    }

    #[test]
    fn overwrite_through_immutable_binding_is_reported() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let x = body.add_register(registry.int_type(), Span::new(2, 3));
        bind(&mut body, "x", x, false);
        push(&mut body, SegmentId::ENTRY, Place::Register(x), InstKind::ConstInt(1), 10);
        push(&mut body, SegmentId::ENTRY, Place::Register(x), InstKind::ConstInt(2), 11);

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::IncompatibleMutability { .. })));
    }

    #[test]
    fn single_write_mutable_binding_warns() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let x = body.add_register(registry.int_type(), Span::new(2, 3));
        bind(&mut body, "x", x, true);
        push(&mut body, SegmentId::ENTRY, Place::Register(x), InstKind::ConstInt(1), 10);
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            11,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UnusedMutability { name, .. } if name == "x")));
    }

    #[test]
    fn twice_written_mutable_binding_is_quiet() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let x = body.add_register(registry.int_type(), Span::new(2, 3));
        bind(&mut body, "x", x, true);
        push(&mut body, SegmentId::ENTRY, Place::Register(x), InstKind::ConstInt(1), 10);
        push(&mut body, SegmentId::ENTRY, Place::Register(x), InstKind::ConstInt(2), 11);
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            12,
        );

        run(&body, &registry, &mut diags);
        assert!(!diags
            .iter()
            .any(|d| matches!(d, SemaError::UnusedMutability { .. })));
    }

    #[test]
    fn missing_return_on_non_unit_function() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let body = body_with_return(registry.int_type());

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::MissingReturn { .. })));
    }

    #[test]
    fn unit_return_is_synthesized() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let body = body_with_return(Type::unit());

        run(&body, &registry, &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn write_through_immutable_pointer_is_reported() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let p = body.add_register(
            Type::pointer(false, registry.int_type()),
            Span::new(2, 3),
        );
        push(&mut body, SegmentId::ENTRY, Place::Register(p).deref(), InstKind::ConstInt(1), 10);
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            11,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::IncompatibleMutability { .. })));
        // The pointer itself was never initialized either.
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UninitializedUse { .. })));
    }

    #[test]
    fn field_read_through_unwritten_pointer_is_reported() {
        let (registry, data) = registry_with_data();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        let p = body.add_register(
            Type::pointer(false, Type::Struct(data)),
            Span::new(2, 3),
        );
        // (*p).i with p never written
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Discard,
            InstKind::Copy(Place::Register(p).deref().field(0)),
            10,
        );
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            11,
        );

        run(&body, &registry, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d, SemaError::UninitializedUse { .. })));
    }

    #[test]
    fn loop_back_edge_is_not_re_descended() {
        let registry = Registry::with_builtins();
        let mut diags = Diagnostics::new();
        let mut body = body_with_return(Type::unit());
        push(
            &mut body,
            SegmentId::ENTRY,
            Place::Register(RegisterId::RETURN),
            InstKind::MakeTuple(Vec::new()),
            10,
        );
        // Entry loops to itself; the walk must terminate.
        body.segments[SegmentId::ENTRY.index()].terminator =
            Terminator::Goto(SegmentId::ENTRY);

        run(&body, &registry, &mut diags);
        assert!(diags.is_empty());
    }
}
