//! Instruction selection
//!
//! Walks a function's typed IR and emits machine instructions over virtual
//! registers into a CFG whose block structure mirrors the analysis CFG
//! (same lowering walk, same labeling rules). Every intermediate value gets
//! a fresh virtual register; parameter and return marshalling goes through
//! the calling convention.

use crate::{
    Assignment, CallingConvention, Cond, MachineInst, Opcode, ParamLocation, VirtualRegId,
    VregAllocator,
};
use hashbrown::HashMap;
use log::debug;
use zenith_cfg::{BlockId, Cfg};
use zenith_common::{ZenithError, ZenithResult};
use zenith_sema::ir::{self, BinaryOp, Expr, ExprKind, Function, Stmt, UnaryOp, Value};
use zenith_sema::{SymbolId, SymbolKind, Type, Unit};

pub struct Selector<'a> {
    unit: &'a Unit,
    conv: &'a dyn CallingConvention,
    vregs: &'a mut VregAllocator,
    cfg: Cfg<MachineInst>,
    current: BlockId,
    /// Variable symbol → vreg holding its value (scalars) or address
    /// (locals with frame storage).
    symbol_regs: HashMap<SymbolId, VirtualRegId>,
    frame_size: u16,
    return_reg: Option<VirtualRegId>,
    string_count: usize,
}

impl<'a> Selector<'a> {
    /// Select machine code for one function.
    pub fn select(
        unit: &'a Unit,
        func: &Function,
        conv: &'a dyn CallingConvention,
        vregs: &'a mut VregAllocator,
    ) -> ZenithResult<Cfg<MachineInst>> {
        let cfg = Cfg::new();
        let entry = cfg.entry;
        let mut sel = Selector {
            unit,
            conv,
            vregs,
            cfg,
            current: entry,
            symbol_regs: HashMap::new(),
            frame_size: 0,
            return_reg: None,
            string_count: 0,
        };

        sel.bind_parameters(func);

        if let Some(ret_ty) = &func.return_type {
            let reg = sel.conv.return_location(ret_ty);
            let pinned = sel.vregs.alloc_pinned(ret_ty.byte_size(), Assignment::Register(reg));
            sel.return_reg = Some(pinned);
        }

        for stmt in &func.body.statements {
            sel.lower_stmt(stmt)?;
        }

        // Fall off the end of the body.
        let exit = sel.cfg.exit;
        sel.jump_to(exit);

        // Epilogue; the trailing return names the value register so it
        // stays live to the end.
        let mut epilogue = sel.conv.emit_epilogue(sel.frame_size);
        if let Some(ret_reg) = sel.return_reg {
            if let Some(ret) = epilogue.iter_mut().rev().find(|i| i.opcode == Opcode::Ret) {
                ret.operands.push(ret_reg);
            }
        }
        for inst in epilogue {
            sel.cfg.push(exit, inst);
        }

        // Prologue goes in front of everything already in the entry block.
        let prologue = sel.conv.emit_prologue(sel.frame_size);
        let entry_block = sel.cfg.block_mut(entry);
        entry_block.instructions.splice(0..0, prologue);

        debug!(
            "selected '{}': {} blocks, {} vregs, frame {} bytes",
            func.name,
            sel.cfg.len(),
            sel.vregs.len(),
            sel.frame_size
        );
        Ok(sel.cfg)
    }

    /// Marshal incoming parameters out of their ABI locations into fresh
    /// unconstrained registers.
    fn bind_parameters(&mut self, func: &Function) {
        for (index, &symbol) in func.params.iter().enumerate() {
            let info = self.unit.table.symbol(symbol);
            let ty = info.ty.clone();
            let size = ty.byte_size();
            let hint = info.usage;

            let dest = self.vregs.alloc_hinted(size, hint);
            match self.conv.parameter_location(index, &ty) {
                ParamLocation::Register(reg) => {
                    let home = self.vregs.alloc_pinned(size, Assignment::Register(reg));
                    self.emit(MachineInst::new(Opcode::Move).with_result(dest).with_operand(home));
                }
                ParamLocation::Stack { offset } => {
                    self.emit(MachineInst::new(Opcode::LoadSlot).with_result(dest).with_slot(offset));
                }
            }
            self.symbol_regs.insert(symbol, dest);
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) -> ZenithResult<()> {
        match stmt {
            Stmt::VarDecl { symbol, ty, init } => self.lower_var_decl(*symbol, ty, init.as_ref()),
            Stmt::Assign { target, value } => self.lower_assign(target, value),
            Stmt::If { condition, then_block, elsif_clauses, else_block } => {
                self.lower_if(condition, then_block, elsif_clauses, else_block.as_ref())
            }
            Stmt::For { init, condition, increment, body, .. } => {
                self.lower_for(init.as_deref(), condition.as_ref(), increment.as_ref(), body)
            }
            Stmt::Select { scrutinee, cases, else_block } => {
                self.lower_select(scrutinee, cases, else_block.as_ref())
            }
            Stmt::Return(value) => {
                if let Some(value_expr) = value {
                    let value_reg = self.lower_expr(value_expr)?;
                    if let Some(ret_reg) = self.return_reg {
                        self.emit(
                            MachineInst::new(Opcode::Move).with_result(ret_reg).with_operand(value_reg),
                        );
                    }
                }
                let exit = self.cfg.exit;
                self.jump_to(exit);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
        }
    }

    fn lower_var_decl(
        &mut self,
        symbol: SymbolId,
        ty: &Type,
        init: Option<&Expr>,
    ) -> ZenithResult<()> {
        if is_aggregate(ty) {
            let offset = self.alloc_frame(ty.byte_size());
            let addr = self.vregs.alloc(2);
            self.emit(MachineInst::new(Opcode::SlotAddr).with_result(addr).with_slot(offset));
            self.symbol_regs.insert(symbol, addr);

            match init.map(|e| &e.kind) {
                Some(ExprKind::StructInit { fields }) => {
                    for (name, value) in fields {
                        let field_offset = ty
                            .field(name)
                            .map(|f| f.offset)
                            .ok_or_else(|| ZenithError::codegen_error("struct field vanished"))?;
                        let value_reg = self.lower_expr(value)?;
                        let slot_addr = self.offset_address(addr, field_offset as i64)?;
                        self.emit(
                            MachineInst::new(Opcode::Store)
                                .with_operand(slot_addr)
                                .with_operand(value_reg),
                        );
                    }
                }
                Some(ExprKind::ArrayInit(elements)) => {
                    let elem_size = match ty {
                        Type::Array { element, .. } => element.byte_size(),
                        _ => 1,
                    };
                    for (i, element) in elements.iter().enumerate() {
                        let value_reg = self.lower_expr(element)?;
                        let slot_addr = self.offset_address(addr, i as i64 * elem_size as i64)?;
                        self.emit(
                            MachineInst::new(Opcode::Store)
                                .with_operand(slot_addr)
                                .with_operand(value_reg),
                        );
                    }
                }
                Some(_) => {
                    // Pointer-style initialization (string data, another
                    // array value).
                    let value_reg = self.lower_expr(init.unwrap())?;
                    self.symbol_regs.insert(symbol, value_reg);
                }
                None => {}
            }
            return Ok(());
        }

        let hint = self.unit.table.symbol(symbol).usage;
        let dest = self.vregs.alloc_hinted(ty.byte_size(), hint);
        self.symbol_regs.insert(symbol, dest);
        if let Some(init_expr) = init {
            let value_reg = self.lower_expr(init_expr)?;
            self.emit(MachineInst::new(Opcode::Move).with_result(dest).with_operand(value_reg));
        }
        Ok(())
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> ZenithResult<()> {
        let value_reg = self.lower_expr(value)?;
        match &target.kind {
            ExprKind::Symbol(symbol) => {
                if let Some(&dest) = self.symbol_regs.get(symbol) {
                    self.emit(
                        MachineInst::new(Opcode::Move).with_result(dest).with_operand(value_reg),
                    );
                } else {
                    let name = self.unit.table.symbol(*symbol).qualified_name.clone();
                    self.emit(
                        MachineInst::new(Opcode::StoreGlobal)
                            .with_symbol(name)
                            .with_operand(value_reg),
                    );
                }
            }
            ExprKind::Subscript { .. } | ExprKind::Member { .. } => {
                let addr = self.lower_address(target)?;
                self.emit(
                    MachineInst::new(Opcode::Store).with_operand(addr).with_operand(value_reg),
                );
            }
            _ => return Err(ZenithError::codegen_error("unsupported assignment target")),
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        condition: &Expr,
        then_block: &ir::Block,
        elsif_clauses: &[ir::ElsifClause],
        else_block: Option<&ir::Block>,
    ) -> ZenithResult<()> {
        let cond_reg = self.lower_expr(condition)?;
        let cond_id = self.current;

        let merge = self.fresh_block(format!("if.merge.{}", cond_id));
        let then = self.fresh_block(format!("if.then.{}", cond_id));
        self.cfg.add_edge(cond_id, then);
        let then_label = self.cfg.block(then).label.clone();
        self.cfg.push(
            cond_id,
            MachineInst::new(Opcode::Branch)
                .with_cond(Cond::NonZero)
                .with_operand(cond_reg)
                .with_target(then_label),
        );

        self.current = then;
        self.lower_body(then_block)?;
        self.jump_to(merge);

        let mut prev_cond = cond_id;
        for (i, clause) in elsif_clauses.iter().enumerate() {
            let elsif_cond = self.fresh_block(format!("elsif.{}.cond", i));
            self.cfg.add_edge(prev_cond, elsif_cond);
            let label = self.cfg.block(elsif_cond).label.clone();
            self.cfg.push(prev_cond, MachineInst::new(Opcode::Jump).with_target(label));

            self.current = elsif_cond;
            let clause_reg = self.lower_expr(&clause.condition)?;

            let elsif_then = self.fresh_block(format!("elsif.{}.then", i));
            self.cfg.add_edge(elsif_cond, elsif_then);
            let then_label = self.cfg.block(elsif_then).label.clone();
            self.cfg.push(
                elsif_cond,
                MachineInst::new(Opcode::Branch)
                    .with_cond(Cond::NonZero)
                    .with_operand(clause_reg)
                    .with_target(then_label),
            );

            self.current = elsif_then;
            self.lower_body(&clause.block)?;
            self.jump_to(merge);

            prev_cond = elsif_cond;
        }

        match else_block {
            Some(block) => {
                let else_id = self.fresh_block(format!("if.else.{}", prev_cond));
                self.cfg.add_edge(prev_cond, else_id);
                let label = self.cfg.block(else_id).label.clone();
                self.cfg.push(prev_cond, MachineInst::new(Opcode::Jump).with_target(label));

                self.current = else_id;
                self.lower_body(block)?;
                self.jump_to(merge);
            }
            None => {
                self.cfg.add_edge(prev_cond, merge);
                let label = self.cfg.block(merge).label.clone();
                self.cfg.push(prev_cond, MachineInst::new(Opcode::Jump).with_target(label));
            }
        }

        self.current = merge;
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &ir::Block,
    ) -> ZenithResult<()> {
        if let Some(init_stmt) = init {
            self.lower_stmt(init_stmt)?;
        }
        let init_id = self.current;

        let cond = self.fresh_block(format!("for.cond.{}", init_id));
        self.cfg.add_edge(init_id, cond);
        let cond_label = self.cfg.block(cond).label.clone();
        self.cfg.push(init_id, MachineInst::new(Opcode::Jump).with_target(cond_label.clone()));

        self.current = cond;
        let cond_reg = condition.map(|e| self.lower_expr(e)).transpose()?;

        let body_id = self.fresh_block(format!("for.body.{}", cond));
        self.cfg.add_edge(cond, body_id);
        let inc = self.fresh_block(format!("for.inc.{}", cond));
        let exit = self.fresh_block(format!("for.exit.{}", cond));
        self.cfg.add_edge(cond, exit);

        let body_label = self.cfg.block(body_id).label.clone();
        let exit_label = self.cfg.block(exit).label.clone();
        match cond_reg {
            Some(reg) => {
                self.cfg.push(
                    cond,
                    MachineInst::new(Opcode::Branch)
                        .with_cond(Cond::NonZero)
                        .with_operand(reg)
                        .with_target(body_label),
                );
                self.cfg.push(cond, MachineInst::new(Opcode::Jump).with_target(exit_label));
            }
            // No condition: loop forever.
            None => {
                self.cfg.push(cond, MachineInst::new(Opcode::Jump).with_target(body_label));
            }
        }

        self.current = body_id;
        self.lower_body(body)?;
        self.jump_to(inc);

        self.current = inc;
        if let Some(inc_expr) = increment {
            self.lower_expr(inc_expr)?;
        }
        self.cfg.add_edge(inc, cond);
        self.cfg.push(inc, MachineInst::new(Opcode::Jump).with_target(cond_label));

        self.current = exit;
        Ok(())
    }

    fn lower_select(
        &mut self,
        scrutinee: &Expr,
        cases: &[ir::CaseClause],
        else_block: Option<&ir::Block>,
    ) -> ZenithResult<()> {
        let scrut_id = self.current;
        let scrut_reg = self.lower_expr(scrutinee)?;

        let merge = self.fresh_block(format!("select.merge.{}", scrut_id));

        for (i, case) in cases.iter().enumerate() {
            let case_id = self.fresh_block(format!("select.case.{}", i));
            self.cfg.add_edge(scrut_id, case_id);

            // Compare-and-branch chain in the scrutinee block.
            self.current = scrut_id;
            let value_reg = self.lower_expr(&case.value)?;
            let flag = self.vregs.alloc(1);
            self.cfg.push(
                scrut_id,
                MachineInst::new(Opcode::Compare)
                    .with_cond(Cond::Eq)
                    .with_result(flag)
                    .with_operand(scrut_reg)
                    .with_operand(value_reg),
            );
            let case_label = self.cfg.block(case_id).label.clone();
            self.cfg.push(
                scrut_id,
                MachineInst::new(Opcode::Branch)
                    .with_cond(Cond::NonZero)
                    .with_operand(flag)
                    .with_target(case_label),
            );

            self.current = case_id;
            self.lower_body(&case.block)?;
            self.jump_to(merge);
        }

        match else_block {
            Some(block) => {
                let else_id = self.fresh_block(format!("select.else.{}", scrut_id));
                self.cfg.add_edge(scrut_id, else_id);
                let label = self.cfg.block(else_id).label.clone();
                self.cfg.push(scrut_id, MachineInst::new(Opcode::Jump).with_target(label));

                self.current = else_id;
                self.lower_body(block)?;
                self.jump_to(merge);
            }
            None => {
                self.cfg.add_edge(scrut_id, merge);
                let label = self.cfg.block(merge).label.clone();
                self.cfg.push(scrut_id, MachineInst::new(Opcode::Jump).with_target(label));
            }
        }

        self.current = merge;
        Ok(())
    }

    fn lower_body(&mut self, block: &ir::Block) -> ZenithResult<()> {
        for stmt in &block.statements {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn lower_expr(&mut self, expr: &Expr) -> ZenithResult<VirtualRegId> {
        match &expr.kind {
            ExprKind::Constant(value) => self.lower_constant(value, &expr.ty),
            ExprKind::Symbol(symbol) => self.lower_symbol(*symbol),
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, &expr.ty),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, &expr.ty),
            ExprKind::Call { callee, args } => self.lower_call(*callee, args, &expr.ty),
            ExprKind::Subscript { .. } => {
                let addr = self.lower_address(expr)?;
                let dest = self.vregs.alloc(expr.ty.byte_size());
                self.emit(MachineInst::new(Opcode::Load).with_result(dest).with_operand(addr));
                Ok(dest)
            }
            ExprKind::Member { object, field } => {
                if object.ty.is_array() && field == "length" {
                    let array_reg = self.lower_expr(object)?;
                    let dest = self.vregs.alloc(2);
                    self.emit(
                        MachineInst::new(Opcode::ArrayLen).with_result(dest).with_operand(array_reg),
                    );
                    return Ok(dest);
                }
                let addr = self.lower_address(expr)?;
                let dest = self.vregs.alloc(expr.ty.byte_size());
                self.emit(MachineInst::new(Opcode::Load).with_result(dest).with_operand(addr));
                Ok(dest)
            }
            ExprKind::StructInit { fields } => {
                // Materialize an anonymous frame temporary.
                let offset = self.alloc_frame(expr.ty.byte_size());
                let addr = self.vregs.alloc(2);
                self.emit(MachineInst::new(Opcode::SlotAddr).with_result(addr).with_slot(offset));
                for (name, value) in fields {
                    let field_offset =
                        expr.ty.field(name).map(|f| f.offset).unwrap_or_default();
                    let value_reg = self.lower_expr(value)?;
                    let slot_addr = self.offset_address(addr, field_offset as i64)?;
                    self.emit(
                        MachineInst::new(Opcode::Store)
                            .with_operand(slot_addr)
                            .with_operand(value_reg),
                    );
                }
                Ok(addr)
            }
            ExprKind::ArrayInit(elements) => {
                let offset = self.alloc_frame(expr.ty.byte_size());
                let addr = self.vregs.alloc(2);
                self.emit(MachineInst::new(Opcode::SlotAddr).with_result(addr).with_slot(offset));
                let elem_size = match &expr.ty {
                    Type::Array { element, .. } => element.byte_size(),
                    _ => 1,
                };
                for (i, element) in elements.iter().enumerate() {
                    let value_reg = self.lower_expr(element)?;
                    let slot_addr = self.offset_address(addr, i as i64 * elem_size as i64)?;
                    self.emit(
                        MachineInst::new(Opcode::Store)
                            .with_operand(slot_addr)
                            .with_operand(value_reg),
                    );
                }
                Ok(addr)
            }
        }
    }

    fn lower_constant(&mut self, value: &Value, ty: &Type) -> ZenithResult<VirtualRegId> {
        match value {
            Value::Int(v) => {
                let dest = self.vregs.alloc(ty.byte_size().max(1));
                self.emit(MachineInst::new(Opcode::LoadImm).with_result(dest).with_imm(*v));
                Ok(dest)
            }
            Value::Bool(v) => {
                let dest = self.vregs.alloc(1);
                self.emit(
                    MachineInst::new(Opcode::LoadImm).with_result(dest).with_imm(i64::from(*v)),
                );
                Ok(dest)
            }
            Value::Str(_) => {
                let label = format!("str.{}", self.string_count);
                self.string_count += 1;
                let dest = self.vregs.alloc(2);
                self.emit(MachineInst::new(Opcode::LoadAddr).with_result(dest).with_symbol(label));
                Ok(dest)
            }
        }
    }

    fn lower_symbol(&mut self, symbol: SymbolId) -> ZenithResult<VirtualRegId> {
        if let Some(&reg) = self.symbol_regs.get(&symbol) {
            return Ok(reg);
        }
        let info = self.unit.table.symbol(symbol);
        let dest = self.vregs.alloc(info.ty.byte_size().max(1));
        let opcode = match info.kind {
            SymbolKind::Function => Opcode::LoadAddr,
            _ => Opcode::LoadGlobal,
        };
        self.emit(
            MachineInst::new(opcode).with_result(dest).with_symbol(info.qualified_name.clone()),
        );
        Ok(dest)
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ty: &Type,
    ) -> ZenithResult<VirtualRegId> {
        let left_reg = self.lower_expr(left)?;
        let right_reg = self.lower_expr(right)?;

        if let Some(cond) = crate::cond_for(op) {
            let dest = self.vregs.alloc(1);
            self.emit(
                MachineInst::new(Opcode::Compare)
                    .with_cond(cond)
                    .with_result(dest)
                    .with_operand(left_reg)
                    .with_operand(right_reg),
            );
            return Ok(dest);
        }

        let opcode = match op {
            BinaryOp::Add => Opcode::Add,
            BinaryOp::Subtract => Opcode::Sub,
            BinaryOp::Multiply => Opcode::Mul,
            BinaryOp::Divide => Opcode::Div,
            BinaryOp::BitwiseAnd | BinaryOp::LogicalAnd => Opcode::And,
            BinaryOp::BitwiseOr | BinaryOp::LogicalOr => Opcode::Or,
            BinaryOp::BitwiseXor => Opcode::Xor,
            _ => return Err(ZenithError::codegen_error(format!("no opcode for operator {}", op))),
        };

        let dest = self.vregs.alloc(ty.byte_size().max(1));
        self.emit(
            MachineInst::new(opcode)
                .with_result(dest)
                .with_operand(left_reg)
                .with_operand(right_reg),
        );
        Ok(dest)
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        ty: &Type,
    ) -> ZenithResult<VirtualRegId> {
        let operand_reg = self.lower_expr(operand)?;
        match op {
            UnaryOp::Negate => {
                let dest = self.vregs.alloc(ty.byte_size().max(1));
                self.emit(
                    MachineInst::new(Opcode::Neg).with_result(dest).with_operand(operand_reg),
                );
                Ok(dest)
            }
            // Increment and decrement update the variable's register in
            // place.
            UnaryOp::Increment => {
                self.emit(
                    MachineInst::new(Opcode::Inc)
                        .with_result(operand_reg)
                        .with_operand(operand_reg),
                );
                Ok(operand_reg)
            }
            UnaryOp::Decrement => {
                self.emit(
                    MachineInst::new(Opcode::Dec)
                        .with_result(operand_reg)
                        .with_operand(operand_reg),
                );
                Ok(operand_reg)
            }
        }
    }

    fn lower_call(
        &mut self,
        callee: SymbolId,
        args: &[Expr],
        result_ty: &Type,
    ) -> ZenithResult<VirtualRegId> {
        let callee_name = self.unit.table.symbol(callee).name.clone();

        // Marshal arguments into their convention-defined locations. The
        // call names the register arguments so they stay live up to it.
        let mut arg_pins = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            let arg_reg = self.lower_expr(arg)?;
            match self.conv.parameter_location(index, &arg.ty) {
                ParamLocation::Register(reg) => {
                    let pinned =
                        self.vregs.alloc_pinned(arg.ty.byte_size().max(1), Assignment::Register(reg));
                    self.emit(
                        MachineInst::new(Opcode::Move).with_result(pinned).with_operand(arg_reg),
                    );
                    arg_pins.push(pinned);
                }
                ParamLocation::Stack { .. } => {
                    self.emit(MachineInst::new(Opcode::Push).with_operand(arg_reg));
                }
            }
        }

        if matches!(result_ty, Type::Void) {
            let mut call = MachineInst::new(Opcode::Call).with_symbol(callee_name);
            call.operands.extend(arg_pins);
            self.emit(call);
            // Void calls still yield a placeholder register for the
            // expression envelope; nothing defines or reads it.
            return Ok(self.vregs.alloc(1));
        }

        let ret_reg = self.conv.return_location(result_ty);
        let pinned =
            self.vregs.alloc_pinned(result_ty.byte_size().max(1), Assignment::Register(ret_reg));
        let mut call =
            MachineInst::new(Opcode::Call).with_result(pinned).with_symbol(callee_name);
        call.operands.extend(arg_pins);
        self.emit(call);

        // Copy out of the pinned register so its live range stays short.
        let dest = self.vregs.alloc(result_ty.byte_size().max(1));
        self.emit(MachineInst::new(Opcode::Move).with_result(dest).with_operand(pinned));
        Ok(dest)
    }

    /// Compute the address of a subscript or member lvalue.
    fn lower_address(&mut self, expr: &Expr) -> ZenithResult<VirtualRegId> {
        match &expr.kind {
            ExprKind::Subscript { array, index } => {
                let base = self.lower_expr(array)?;
                let index_reg = self.lower_expr(index)?;
                let elem_size = expr.ty.byte_size().max(1);

                let scaled = if elem_size > 1 {
                    let size_reg = self.vregs.alloc(2);
                    self.emit(
                        MachineInst::new(Opcode::LoadImm)
                            .with_result(size_reg)
                            .with_imm(elem_size as i64),
                    );
                    let scaled = self.vregs.alloc(2);
                    self.emit(
                        MachineInst::new(Opcode::Mul)
                            .with_result(scaled)
                            .with_operand(index_reg)
                            .with_operand(size_reg),
                    );
                    scaled
                } else {
                    index_reg
                };

                let addr = self.vregs.alloc(2);
                self.emit(
                    MachineInst::new(Opcode::Add)
                        .with_result(addr)
                        .with_operand(base)
                        .with_operand(scaled),
                );
                Ok(addr)
            }
            ExprKind::Member { object, field } => {
                let base = self.lower_expr(object)?;
                let offset = object.ty.field(field).map(|f| f.offset).unwrap_or_default();
                self.offset_address(base, offset as i64)
            }
            ExprKind::Symbol(_) => self.lower_expr(expr),
            _ => Err(ZenithError::codegen_error("expression has no address")),
        }
    }

    fn offset_address(&mut self, base: VirtualRegId, offset: i64) -> ZenithResult<VirtualRegId> {
        if offset == 0 {
            return Ok(base);
        }
        let offset_reg = self.vregs.alloc(2);
        self.emit(MachineInst::new(Opcode::LoadImm).with_result(offset_reg).with_imm(offset));
        let addr = self.vregs.alloc(2);
        self.emit(
            MachineInst::new(Opcode::Add)
                .with_result(addr)
                .with_operand(base)
                .with_operand(offset_reg),
        );
        Ok(addr)
    }

    // ------------------------------------------------------------------
    // Block plumbing
    // ------------------------------------------------------------------

    fn emit(&mut self, inst: MachineInst) {
        self.cfg.push(self.current, inst);
    }

    /// Jump from the current block to `target`, wiring the edge.
    fn jump_to(&mut self, target: BlockId) {
        self.cfg.add_edge(self.current, target);
        let label = self.cfg.block(target).label.clone();
        self.cfg.push(self.current, MachineInst::new(Opcode::Jump).with_target(label));
    }

    fn fresh_block(&mut self, label: String) -> BlockId {
        if !self.cfg.has_label(&label) {
            return self.cfg.add_block(label);
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{}", label, n);
            if !self.cfg.has_label(&candidate) {
                return self.cfg.add_block(candidate);
            }
            n += 1;
        }
    }

    /// Reserve `size` bytes of frame storage; word-sized slots stay 2-byte
    /// aligned.
    fn alloc_frame(&mut self, size: u16) -> i32 {
        if size > 1 && self.frame_size % 2 != 0 {
            self.frame_size += 1;
        }
        let offset = -(self.frame_size as i32) - size as i32;
        self.frame_size += size;
        offset
    }
}

fn is_aggregate(ty: &Type) -> bool {
    match ty {
        Type::Struct { .. } => true,
        Type::Array { len, .. } => len.is_some(),
        _ => false,
    }
}
