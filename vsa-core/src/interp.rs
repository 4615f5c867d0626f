//! The WTO-driven, interprocedural abstract interpreter that ties the
//! other components together: statement and expression evaluation over the
//! strided-interval/value-set/region/state stack, a fixpoint driver that
//! walks a precomputed weak topological ordering (recursive
//! `run_components`/`visit_block` rather than a mutable worklist queue,
//! since the ordering already fixes a safe visit order), and interprocedural
//! call handling (context save/restore around each call target, the
//! `ESP += 4` return-address compensation, frame discard on a known stack
//! boundary).

use std::collections::{BTreeMap, HashMap, HashSet};

use vsa_ir::cfg::{BasicBlockId, EdgeKind};
use vsa_ir::expr::{BinOp, CastKind, Expr, Lvalue, TempName, UnOp};
use vsa_ir::program::{Function, Prog};
use vsa_ir::registers::RegisterTable;
use vsa_ir::stmt::Stmt;
use vsa_ir::wto::WtoComponent;
use vsa_types::{ProgramCounter, STACK_REGION, WORD_SIZE};

use crate::context::{Context, ContextMode};
use crate::error::{AnalysisError, Result};
use crate::interval::StridedInterval;
use crate::region::WarningKind;
use crate::state::State;
use crate::valueset::ValueSet;

/// Ceiling on interprocedural call-stack depth.
/// Ordinary recursion never reaches this: it is caught immediately by the
/// call-stack membership check below. This backstop exists only for
/// pathologically deep, non-recursive call chains.
const MAX_CALL_DEPTH: usize = 512;

fn is_alloc_family(name: &str) -> bool {
    matches!(name, "malloc" | "calloc" | "realloc")
}

/// String-copying library calls the interpreter recognizes syntactically but
/// models with no effect: their actual byte-level effect on memory isn't
/// modeled.
fn is_string_family(name: &str) -> bool {
    matches!(name, "memcpy" | "strcpy" | "strcat" | "strncpy" | "sprintf" | "snprintf")
}

/// Calls whose effect on the abstract state is modeled as "nothing happens"
/// rather than stepped into.
fn is_blacklisted(name: &str) -> bool {
    matches!(
        name,
        "free" | "exit" | "_exit" | "abort" | "__assert_fail" | "printf" | "fprintf" | "puts" | "putchar" | "syslog"
    )
}

/// One analysis warning, bound to the program point and calling context it
/// fired in. Mirrors `vsa_storage::WarningRecord`'s shape; `vsa-core` can't
/// depend on `vsa-storage` (the dependency direction runs the other way), so
/// the CLI driver converts these at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub address: ProgramCounter,
    /// The calling context's call-site chain, standing in for a true
    /// dataflow backward slice — a documented simplification, see DESIGN.md.
    pub backward_slice: Vec<ProgramCounter>,
}

/// Knobs controlling one [`analyze`] run: the context-sensitivity mode and
/// whether calls are stepped into at all.
#[derive(Debug, Clone, Copy)]
pub struct InterpConfig {
    pub mode: ContextMode,
    /// `false`: calls are treated as opaque no-ops rather than stepped into.
    pub interprocedural: bool,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self { mode: ContextMode::Insensitive, interprocedural: true }
    }
}

/// The result of analyzing one entry function to fixpoint.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub final_state: State,
    pub warnings: Vec<Warning>,
}

/// Runs the WTO-driven fixpoint to completion starting from `entry`.
pub fn analyze(prog: &Prog, entry: ProgramCounter, config: InterpConfig) -> Result<AnalysisOutcome> {
    let func = prog
        .function_at(entry)
        .ok_or_else(|| AnalysisError::EntryFunctionNotFound(format!("{entry:#x}")))?;
    if func.cfg.blocks.is_empty() {
        return Err(AnalysisError::EmptyCfg(entry));
    }

    let registers = RegisterTable;
    let mut interp = Interp {
        prog,
        registers,
        config,
        warnings: Vec::new(),
        heap_sites: HashMap::new(),
        call_stack: Vec::new(),
        recursion_warned: HashSet::new(),
    };
    let mut tables = PrePostTables::default();
    let init_state = State::init_for_main(&interp.registers);
    let final_state = interp.run_function(&mut tables, func, Context::root(), init_state)?;
    Ok(AnalysisOutcome { final_state, warnings: interp.warnings })
}

type FixKey = (ProgramCounter, Context, BasicBlockId);

fn key(func: &Function, context: &Context, bb: BasicBlockId) -> FixKey {
    (func.address, context.clone(), bb)
}

/// Per-`(function, context, block)` pre/post-state tables. Kept for the
/// whole analysis run rather than discarded per call, so that re-entering a
/// function under a context it has already been analyzed in (two distinct,
/// non-recursive call chains whose retained call-site suffix happens to
/// coincide under k-sensitive or insensitive modes) reuses that context's
/// own fixpoint state instead of one belonging to a different caller.
#[derive(Debug, Default)]
struct PrePostTables {
    pre: HashMap<FixKey, State>,
    post: HashMap<FixKey, State>,
}

impl PrePostTables {
    fn pre(&self, key: &FixKey) -> Option<&State> {
        self.pre.get(key)
    }

    fn post(&self, key: &FixKey) -> Option<&State> {
        self.post.get(key)
    }

    fn set_pre(&mut self, key: FixKey, state: State) {
        self.pre.insert(key, state);
    }

    fn set_post(&mut self, key: FixKey, state: State) {
        self.post.insert(key, state);
    }
}

struct Interp<'p> {
    prog: &'p Prog,
    registers: RegisterTable,
    config: InterpConfig,
    warnings: Vec<Warning>,
    /// Allocation call-site → heap region id, for the strong→weak transition
    /// on revisit when an allocation site is reached again inside a loop.
    heap_sites: HashMap<ProgramCounter, u32>,
    /// Function addresses on the current interprocedural call path; recursive
    /// calls are detected by membership in this stack rather than by
    /// comparing `Context` values.
    call_stack: Vec<ProgramCounter>,
    recursion_warned: HashSet<ProgramCounter>,
}

impl<'p> Interp<'p> {
    fn run_function(&mut self, tables: &mut PrePostTables, func: &Function, context: Context, incoming: State) -> Result<State> {
        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return Err(AnalysisError::CallStackOverflow(MAX_CALL_DEPTH));
        }
        tracing::debug!(function = %func.name, context = %context, "entering function");

        self.call_stack.push(func.address);
        let entry_key = key(func, &context, func.cfg.entry);
        tables.set_pre(entry_key, incoming);
        self.run_components(tables, func, &context, &func.wto.components)?;

        let mut final_state: Option<State> = None;
        for exit in func.cfg.exits() {
            if let Some(post) = tables.post(&key(func, &context, exit)) {
                final_state = Some(match final_state {
                    Some(acc) => acc.join(post),
                    None => post.clone(),
                });
            }
        }
        self.call_stack.pop();
        tracing::debug!(function = %func.name, context = %context, "leaving function");

        match final_state {
            Some(s) => Ok(s),
            // A function with no reachable exit (e.g. every path ends in an
            // unresolved tail call): fall back to the entry pre-state rather
            // than lose the caller's state entirely.
            None => Ok(tables.pre(&key(func, &context, func.cfg.entry)).cloned().unwrap_or_else(State::bot_placeholder)),
        }
    }

    fn run_components(&mut self, tables: &mut PrePostTables, func: &Function, context: &Context, components: &[WtoComponent]) -> Result<()> {
        for component in components {
            match component {
                WtoComponent::Vertex(bb) => self.visit_block(tables, func, context, *bb)?,
                WtoComponent::Component { head, body } => {
                    self.visit_block(tables, func, context, *head)?;
                    loop {
                        self.run_components(tables, func, context, body)?;
                        let head_key = key(func, context, *head);
                        let prev_pre = tables
                            .pre(&head_key)
                            .cloned()
                            .expect("a component head always has a pre-state after its first visit");
                        match self.incoming_state(tables, func, context, *head) {
                            Some(candidate) if !candidate.subsumed_by(&prev_pre) => {
                                tracing::debug!(function = %func.name, block = ?head, "widening at loop header");
                                tables.set_pre(head_key, candidate);
                                self.visit_block(tables, func, context, *head)?;
                            }
                            _ => break,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Forward edges whose source has a recorded
    /// post-state join in; a back edge whose source has a recorded
    /// post-state widens in instead, marking this a widening visit. `None`
    /// if no predecessor has been evaluated yet (the block retains whatever
    /// pre-state it was last given, typically its entry seed).
    fn incoming_state(&self, tables: &PrePostTables, func: &Function, context: &Context, bb: BasicBlockId) -> Option<State> {
        let mut acc: Option<State> = None;
        for edge in func.cfg.predecessors(bb) {
            let src_key = key(func, context, edge.from);
            let Some(src_post) = tables.post(&src_key) else { continue };
            acc = Some(match (acc, edge.kind) {
                (Some(a), EdgeKind::Back) => a.widen(src_post),
                (None, EdgeKind::Back) => src_post.clone(),
                (Some(a), _) => a.join(src_post),
                (None, _) => src_post.clone(),
            });
        }
        acc
    }

    fn visit_block(&mut self, tables: &mut PrePostTables, func: &Function, context: &Context, bb: BasicBlockId) -> Result<()> {
        let bb_key = key(func, context, bb);
        if let Some(incoming) = self.incoming_state(tables, func, context, bb) {
            tables.set_pre(bb_key.clone(), incoming);
        }
        let pre_state = tables
            .pre(&bb_key)
            .cloned()
            .expect("a block's pre-state is seeded before it is ever visited");

        tracing::trace!(function = %func.name, block = ?bb, "evaluating block");
        let post_state = self.eval_block_body(tables, func, context, bb, pre_state)?;
        tables.set_post(bb_key, post_state);
        Ok(())
    }

    fn eval_block_body(&mut self, tables: &mut PrePostTables, func: &Function, context: &Context, bb: BasicBlockId, pre_state: State) -> Result<State> {
        let block = func
            .cfg
            .block(bb)
            .ok_or_else(|| AnalysisError::DanglingCfgEdge { address: func.address, block: format!("{bb:?}") })?;

        let mut state = pre_state;
        // A fresh temp map per block: the lifter never carries an analysis
        // temporary across a block boundary (each is defined and consumed
        // within the same straight-line run), so there is nothing to thread.
        // `None` means "declared by `vardecl` but not yet assigned" (a read
        // in that state is flagged); an absent entry means "never declared
        // at all", the condition-code pseudo-temp case, which is allowed to
        // read as TOP silently.
        let mut temps: HashMap<TempName, Option<ValueSet>> = HashMap::new();

        for instr in &block.instructions {
            for stmt in &instr.statements {
                state = self.eval_stmt(tables, func, context, &mut temps, state, stmt, instr.address)?;
            }
        }
        Ok(state)
    }

    fn eval_stmt(
        &mut self,
        tables: &mut PrePostTables,
        func: &Function,
        context: &Context,
        temps: &mut HashMap<TempName, Option<ValueSet>>,
        state: State,
        stmt: &Stmt,
        pc: ProgramCounter,
    ) -> Result<State> {
        match stmt {
            Stmt::Move { lhs, rhs } => {
                let value = self.eval_expr(&state, temps, rhs, pc, context);
                self.eval_store(state, temps, lhs, value, pc, context)
            }
            Stmt::VarDecl(name) => {
                temps.insert(name.clone(), None);
                Ok(state)
            }
            Stmt::Call { targets, .. } => self.eval_call(tables, context, state, targets, pc),
            // Control flow lives entirely in the CFG's edges; these
            // statements carry no lattice effect of their own.
            Stmt::Return(_) | Stmt::Jmp(_) | Stmt::CJmp { .. } => Ok(state),
            Stmt::Label(_) | Stmt::Comment(_) | Stmt::Assert(_) | Stmt::Special(_) => Ok(state),
        }
    }

    fn eval_store(
        &mut self,
        state: State,
        temps: &mut HashMap<TempName, Option<ValueSet>>,
        lhs: &Lvalue,
        value: ValueSet,
        pc: ProgramCounter,
        context: &Context,
    ) -> Result<State> {
        match lhs {
            Lvalue::Register(name) => {
                let (next, warnings) = state.write_register(name, value, &self.registers);
                self.record_warnings(warnings, pc, context);
                Ok(next)
            }
            Lvalue::Temp(name) => {
                temps.insert(name.clone(), Some(value));
                Ok(state)
            }
            Lvalue::Mem { address, width } => {
                let addr_vs = self.eval_expr(&state, temps, address, pc, context);
                let access = access_vs(&addr_vs, width.bytes());
                let (next, warnings) = state.write_vs(&access, value);
                self.record_warnings(warnings, pc, context);
                Ok(next)
            }
        }
    }

    fn eval_expr(&mut self, state: &State, temps: &HashMap<TempName, Option<ValueSet>>, expr: &Expr, pc: ProgramCounter, context: &Context) -> ValueSet {
        match expr {
            Expr::Constant { value, .. } => ValueSet::constant(*value as i64),
            Expr::Temp(name) => match self.registers.lookup(&name.0) {
                Some(entry) => state.read_register(entry.name, &self.registers).0,
                None => match temps.get(name) {
                    Some(Some(v)) => v.clone(),
                    // `vardecl`'d but not yet assigned: a flagged read of an
                    // undefined temporary, per the statement's semantics.
                    Some(None) => {
                        tracing::debug!(temp = %name.0, address = pc, "read of a vardecl'd temporary before it was defined");
                        ValueSet::top()
                    }
                    // Never declared at all: a Vine-style condition-code
                    // pseudo-temp, which is allowed to be undefined and
                    // evaluates to TOP silently.
                    None => ValueSet::top(),
                },
            },
            Expr::BinOp(op, l, r) => {
                let lv = self.eval_expr(state, temps, l, pc, context);
                let rv = self.eval_expr(state, temps, r, pc, context);
                eval_binop(*op, &lv, &rv)
            }
            Expr::UnOp(UnOp::Not, e) => self.eval_expr(state, temps, e, pc, context).not(),
            Expr::Mem { address, width } => {
                let addr_vs = self.eval_expr(state, temps, address, pc, context);
                let access = access_vs(&addr_vs, width.bytes());
                let (value, warnings) = state.read_vs(&access);
                self.record_warnings(warnings, pc, context);
                value
            }
            Expr::Cast { kind, from_bits, to_bits, operand } => {
                let v = self.eval_expr(state, temps, operand, pc, context);
                eval_cast(*kind, *from_bits, *to_bits, &v)
            }
        }
    }

    fn record_warnings(&mut self, warnings: Vec<WarningKind>, pc: ProgramCounter, context: &Context) {
        for kind in warnings {
            tracing::trace!(?kind, address = pc, "analysis warning");
            self.warnings.push(Warning { kind, address: pc, backward_slice: context.call_sites().to_vec() });
        }
    }

    /// Dispatch each possible call target — allocation modeling,
    /// string/blacklist no-ops, or a genuine interprocedural step — and join
    /// the resulting states across all targets (an indirect call's true
    /// target is exactly one of them, statically unknown which).
    fn eval_call(&mut self, tables: &mut PrePostTables, context: &Context, state: State, targets: &[ProgramCounter], pc: ProgramCounter) -> Result<State> {
        if targets.is_empty() {
            self.record_warnings(vec![WarningKind::UnresolvedIndirectCall], pc, context);
            return Ok(state);
        }

        let mut results: Vec<State> = Vec::with_capacity(targets.len());

        for &target in targets {
            let callee_name = self.prog.function_at(target).map(|f| f.name.clone());

            if let Some(name) = callee_name.as_deref() {
                if is_alloc_family(name) {
                    results.push(self.eval_alloc(state.clone(), name, pc, context));
                    continue;
                }
                if is_string_family(name) {
                    tracing::trace!(function = name, address = pc, "modeled string-family call as a no-op");
                    results.push(state.clone());
                    continue;
                }
                if is_blacklisted(name) {
                    tracing::debug!(function = name, address = pc, "skipped blacklisted call");
                    results.push(state.clone());
                    continue;
                }
            }

            if !self.config.interprocedural {
                results.push(state.clone());
                continue;
            }

            let Some(callee) = self.prog.function_at(target) else {
                self.record_warnings(vec![WarningKind::UnresolvedIndirectCall], pc, context);
                results.push(state.clone());
                continue;
            };

            if self.call_stack.contains(&callee.address) {
                if self.recursion_warned.insert(callee.address) {
                    tracing::debug!(function = %callee.name, "recursive call skipped");
                }
                results.push(state.clone());
                continue;
            }

            let new_context = context.extend(pc, self.config.mode);
            let callee_entry = self.prepare_callee_entry(&state);
            let callee_result = self.run_function(tables, callee, new_context, callee_entry)?;
            results.push(self.restore_after_call(&state, &callee_result));
        }

        let mut iter = results.into_iter();
        let first = iter.next().expect("at least one call target was iterated");
        Ok(iter.fold(first, |acc, s| acc.join(&s)))
    }

    /// The lifted `Call` statement never models
    /// pushing a return address onto the stack, so the callee's own `ret`
    /// popping one word would otherwise desynchronize the stack pointer;
    /// bumping ESP by a word before entering the callee keeps it consistent
    /// with the caller's view after the call returns.
    fn prepare_callee_entry(&self, caller_state: &State) -> State {
        let (esp, _) = caller_state.read_register("ESP", &self.registers);
        let bumped = esp.add(&ValueSet::constant(WORD_SIZE as i64));
        caller_state.write_register("ESP", bumped, &self.registers).0
    }

    /// Restore ESP/EBP from the caller's own snapshot and
    /// discard the callee's stack frame if its extent (relative to the
    /// caller's ESP) is known.
    fn restore_after_call(&self, caller_state: &State, callee_result: &State) -> State {
        let (esp, _) = caller_state.read_register("ESP", &self.registers);
        let (ebp, _) = caller_state.read_register("EBP", &self.registers);

        let mut state = callee_result.clone();
        if let Some(boundary) = esp.offset_in(STACK_REGION).and_then(StridedInterval::as_constant) {
            state = state.discard_frame(boundary);
        }
        state = state.write_register("ESP", esp, &self.registers).0;
        state = state.write_register("EBP", ebp, &self.registers).0;
        state
    }

    /// `malloc` reads its size at `ESP`;
    /// `realloc` reads its size at `ESP+4` (its first argument is the old
    /// pointer); `calloc` reads count at `ESP` and element size at `ESP+4`
    /// and multiplies them. The resulting pointer is written into `EAX`.
    fn eval_alloc(&mut self, state: State, name: &str, pc: ProgramCounter, context: &Context) -> State {
        let (esp, _) = state.read_register("ESP", &self.registers);
        let next_arg = esp.add(&ValueSet::constant(WORD_SIZE as i64));

        let size = match name {
            "realloc" => state.read_vs(&next_arg).0,
            "calloc" => {
                let (count, _) = state.read_vs(&esp);
                let (elem_size, _) = state.read_vs(&next_arg);
                count.mul(&elem_size)
            }
            _ => state.read_vs(&esp).0,
        };

        let size_si = size.as_constant_si().copied().unwrap_or_else(StridedInterval::top);
        if size.is_top() || size_si.is_top() {
            self.record_warnings(vec![WarningKind::UnboundedMallocSize], pc, context);
        }

        let existing = self.heap_sites.get(&pc).copied();
        let (state, id) = state.add_heap_region(existing, &size_si);
        self.heap_sites.insert(pc, id);

        let (state, warnings) = state.write_register("EAX", ValueSet::pointer(id, 0), &self.registers);
        self.record_warnings(warnings, pc, context);
        state
    }
}

fn eval_binop(op: BinOp, l: &ValueSet, r: &ValueSet) -> ValueSet {
    match op {
        BinOp::Plus => l.add(r),
        BinOp::Minus => l.sub(r),
        BinOp::Times => l.mul(r),
        BinOp::BitAnd => l.bitand(r),
        BinOp::BitOr => l.bitor(r),
        BinOp::Xor => l.bitxor(r),
        BinOp::LShift => l.lshift(r),
        BinOp::RShift => l.rshift(r),
        BinOp::ArShift => l.arshift(r),
        BinOp::LRotate => l.lrotate(r),
        BinOp::RRotate => l.rrotate(r),
        BinOp::SDivide => l.sdivide(r),
        BinOp::UDivide => l.udivide(r),
        BinOp::SMod => l.smod(r),
        BinOp::UMod => l.umod(r),
        BinOp::Eq => l.cmp_eq(r),
        BinOp::Neq => l.cmp_neq(r),
        BinOp::Lt => l.cmp_slt(r),
        BinOp::Le => l.cmp_sle(r),
    }
}

/// A high-cast shifts right by `from - to` bits; low/signed/
/// unsigned downcasts all mask to `to_bits`; an upcast (`Unchanged`) returns
/// its operand as-is.
fn eval_cast(kind: CastKind, from_bits: u32, to_bits: u32, v: &ValueSet) -> ValueSet {
    match kind {
        CastKind::Unchanged => v.clone(),
        CastKind::High => v.rshift(&ValueSet::constant(from_bits.saturating_sub(to_bits) as i64)),
        CastKind::Low | CastKind::Unsigned | CastKind::Signed => v.bitand(&ValueSet::constant(mask_bits(to_bits))),
    }
}

fn mask_bits(n: u32) -> i64 {
    if n >= 64 {
        -1
    } else {
        (1i64 << n) - 1
    }
}

/// Expands a pointer-valued VS into the address interval an access of
/// `width_bytes` actually touches: a known constant address gets a tight,
/// aligned footprint; a ranging address gets a conservative byte-stride
/// envelope covering every possible access.
fn access_vs(addr: &ValueSet, width_bytes: u32) -> ValueSet {
    match addr {
        ValueSet::Entries(entries) => {
            let mut out = BTreeMap::new();
            for (region, si) in entries {
                out.insert(*region, access_interval(si, width_bytes));
            }
            ValueSet::Entries(out)
        }
        other => other.clone(),
    }
}

fn access_interval(addr: &StridedInterval, width_bytes: u32) -> StridedInterval {
    match addr.as_constant() {
        Some(c) => StridedInterval::new(c, c + width_bytes as i64 - 1, 1),
        None => StridedInterval::new(addr.lo(), addr.hi() + width_bytes as i64 - 1, 1),
    }
}

impl State {
    /// Used only when a function has no reachable exit block at all (every
    /// path diverges); an empty, regionless state is a safe (if useless)
    /// stand-in so the caller still gets *something* to join against.
    fn bot_placeholder() -> Self {
        State::init_for_main(&RegisterTable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsa_ir::cfg::{BasicBlock, Cfg, Edge};
    use vsa_ir::callgraph::CallGraph;
    use vsa_ir::expr::TempName;
    use vsa_ir::program::Prog;
    use vsa_ir::stmt::Instruction;
    use vsa_ir::wto::Wto;
    use vsa_types::{ByteWidth, WORD_SIZE};

    fn bb(n: u32) -> BasicBlockId {
        BasicBlockId(n)
    }

    fn reg(name: &str) -> Expr {
        Expr::Temp(TempName(name.to_string()))
    }

    fn const_expr(v: i32) -> Expr {
        Expr::Constant { value: v, width: ByteWidth::Word }
    }

    fn instr(address: ProgramCounter, statements: Vec<Stmt>) -> Instruction {
        Instruction { address, statements }
    }

    fn straight_line_function(name: &str, address: ProgramCounter, instructions: Vec<Instruction>) -> Function {
        let block = BasicBlock { id: bb(0), address, instructions };
        let cfg = Cfg { entry: bb(0), blocks: vec![block], edges: vec![] };
        let wto = Wto { components: vec![WtoComponent::Vertex(bb(0))] };
        Function { name: name.to_string(), address, module: "test".to_string(), cfg, wto }
    }

    fn single_function_prog(func: Function) -> Prog {
        let entry = func.address;
        Prog { modules: vec![], functions: vec![func], call_graph: CallGraph { edges: vec![], main_entry: entry } }
    }

    #[test]
    fn straight_line_move_assigns_register() {
        let func = straight_line_function(
            "f",
            0x1000,
            vec![instr(0x1000, vec![Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: const_expr(42) }])],
        );
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        assert_eq!(eax, ValueSet::constant(42));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn binop_and_cast_chain_evaluates() {
        let rhs = Expr::Cast {
            kind: CastKind::Low,
            from_bits: 32,
            to_bits: 8,
            operand: Box::new(Expr::BinOp(BinOp::Plus, Box::new(const_expr(250)), Box::new(const_expr(10)))),
        };
        let func = straight_line_function("f", 0x1000, vec![instr(0x1000, vec![Stmt::Move { lhs: Lvalue::Register("AL".into()), rhs }])]);
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (al, _) = outcome.final_state.read_register("AL", &RegisterTable);
        // 250 + 10 = 260, masked to 8 bits => 4.
        assert_eq!(al, ValueSet::constant(4));
    }

    #[test]
    fn vardecl_then_read_before_assignment_evaluates_to_top() {
        let t = TempName("t1".to_string());
        let func = straight_line_function(
            "f",
            0x1000,
            vec![instr(
                0x1000,
                vec![Stmt::VarDecl(t.clone()), Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: Expr::Temp(t) }],
            )],
        );
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        assert!(eax.is_top());
    }

    #[test]
    fn vardecl_then_assign_then_read_round_trips() {
        let t = TempName("t1".to_string());
        let func = straight_line_function(
            "f",
            0x1000,
            vec![instr(
                0x1000,
                vec![
                    Stmt::VarDecl(t.clone()),
                    Stmt::Move { lhs: Lvalue::Temp(t.clone()), rhs: const_expr(7) },
                    Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: Expr::Temp(t) },
                ],
            )],
        );
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        assert_eq!(eax, ValueSet::constant(7));
    }

    #[test]
    fn unresolved_indirect_call_warns() {
        let func = straight_line_function("f", 0x1000, vec![instr(0x1000, vec![Stmt::Call { targets: vec![], return_site: None }])]);
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        assert!(outcome.warnings.iter().any(|w| w.kind == WarningKind::UnresolvedIndirectCall));
    }

    #[test]
    fn malloc_call_points_eax_at_a_fresh_heap_region() {
        let malloc = straight_line_function("malloc", 0x2000, vec![instr(0x2000, vec![Stmt::Return(None)])]);
        let caller = straight_line_function(
            "caller",
            0x1000,
            vec![
                instr(0x1000, vec![Stmt::Move { lhs: Lvalue::Register("ESP".into()), rhs: reg("ESP") }]),
                instr(0x1004, vec![Stmt::Call { targets: vec![0x2000], return_site: Some(0x1008) }]),
            ],
        );
        let prog = Prog {
            modules: vec![],
            functions: vec![caller, malloc],
            call_graph: CallGraph { edges: vec![], main_entry: 0x1000 },
        };
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        assert!(eax.offset_in(vsa_types::FIRST_HEAP_REGION).is_some());
    }

    #[test]
    fn direct_recursion_terminates_without_hanging() {
        let f = straight_line_function("f", 0x1000, vec![instr(0x1000, vec![Stmt::Call { targets: vec![0x1000], return_site: Some(0x1004) }])]);
        let prog = single_function_prog(f);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default());
        assert!(outcome.is_ok());
    }

    #[test]
    fn intraproc_mode_treats_calls_as_opaque() {
        let callee = straight_line_function(
            "callee",
            0x2000,
            vec![instr(0x2000, vec![Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: const_expr(99) }])],
        );
        let caller = straight_line_function(
            "caller",
            0x1000,
            vec![
                instr(0x1000, vec![Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: const_expr(1) }]),
                instr(0x1004, vec![Stmt::Call { targets: vec![0x2000], return_site: Some(0x1008) }]),
            ],
        );
        let prog = Prog {
            modules: vec![],
            functions: vec![caller, callee],
            call_graph: CallGraph { edges: vec![], main_entry: 0x1000 },
        };
        let config = InterpConfig { mode: ContextMode::Insensitive, interprocedural: false };
        let outcome = analyze(&prog, 0x1000, config).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        assert_eq!(eax, ValueSet::constant(1));
    }

    #[test]
    fn loop_with_back_edge_terminates_via_widening() {
        // block 0 (entry): EAX := 0 -> block 1
        // block 1 (header): EAX := EAX + 1 -> block 2 (continue) / block 3 (exit)
        // block 2 (body, empty): -> block 1 (back edge)
        // block 3 (exit): no statements, no successors
        let entry = BasicBlock {
            id: bb(0),
            address: 0x1000,
            instructions: vec![instr(0x1000, vec![Stmt::Move { lhs: Lvalue::Register("EAX".into()), rhs: const_expr(0) }])],
        };
        let header = BasicBlock {
            id: bb(1),
            address: 0x1004,
            instructions: vec![instr(
                0x1004,
                vec![Stmt::Move {
                    lhs: Lvalue::Register("EAX".into()),
                    rhs: Expr::BinOp(BinOp::Plus, Box::new(reg("EAX")), Box::new(const_expr(1))),
                }],
            )],
        };
        let body = BasicBlock { id: bb(2), address: 0x1008, instructions: vec![] };
        let exit = BasicBlock { id: bb(3), address: 0x100c, instructions: vec![] };
        let cfg = Cfg {
            entry: bb(0),
            blocks: vec![entry, header, body, exit],
            edges: vec![
                Edge { from: bb(0), to: bb(1), kind: EdgeKind::Fallthrough },
                Edge { from: bb(1), to: bb(2), kind: EdgeKind::True },
                Edge { from: bb(1), to: bb(3), kind: EdgeKind::False },
                Edge { from: bb(2), to: bb(1), kind: EdgeKind::Back },
            ],
        };
        let wto = Wto {
            components: vec![
                WtoComponent::Vertex(bb(0)),
                WtoComponent::Component { head: bb(1), body: vec![WtoComponent::Vertex(bb(2))] },
                WtoComponent::Vertex(bb(3)),
            ],
        };
        let func = Function { name: "loop".to_string(), address: 0x1000, module: "test".to_string(), cfg, wto };
        let prog = single_function_prog(func);
        let outcome = analyze(&prog, 0x1000, InterpConfig::default()).unwrap();
        let (eax, _) = outcome.final_state.read_register("EAX", &RegisterTable);
        // Widening must have kicked in: the result is not the precise
        // singleton `{1}` a non-widening evaluator would stop at.
        assert_ne!(eax, ValueSet::constant(1));
    }

    #[test]
    fn access_interval_is_tight_for_a_known_address() {
        let addr = StridedInterval::constant(100);
        let access = access_interval(&addr, WORD_SIZE as u32);
        assert_eq!(access.lo(), 100);
        assert_eq!(access.hi(), 103);
        assert_eq!(access.stride(), 1);
    }
}
