//! Lowering of typed function bodies into control-flow graphs

use crate::{BlockId, Cfg};
use log::debug;
use zenith_sema::ir::{Expr, Function, Stmt};

/// Builds one function's CFG from its typed IR body. Block instructions are
/// IR statements at this stage; instruction selection replaces them later.
pub struct CfgBuilder {
    cfg: Cfg<Stmt>,
    current: BlockId,
}

impl CfgBuilder {
    /// Lower `func` into a graph with explicit block structure for `if`,
    /// `for` and `select`.
    pub fn build(func: &Function) -> Cfg<Stmt> {
        let cfg = Cfg::new();
        let entry = cfg.entry;
        let mut builder = Self { cfg, current: entry };

        for stmt in &func.body.statements {
            builder.lower_stmt(stmt);
        }

        // Fall off the end of the body into the exit block.
        let exit = builder.cfg.exit;
        builder.cfg.add_edge(builder.current, exit);

        debug!("cfg for '{}': {} blocks", func.name, builder.cfg.len());
        builder.cfg
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::If { condition, then_block, elsif_clauses, else_block } => {
                self.lower_if(condition, then_block, elsif_clauses, else_block.as_ref());
            }
            Stmt::For { init, condition, increment, body, .. } => {
                self.lower_for(init.as_deref(), condition.as_ref(), increment.as_ref(), body);
            }
            Stmt::Select { scrutinee, cases, else_block } => {
                self.lower_select(scrutinee, cases, else_block.as_ref());
            }
            Stmt::Return(_) => {
                let exit = self.cfg.exit;
                self.cfg.push(self.current, stmt.clone());
                self.cfg.add_edge(self.current, exit);
            }
            _ => self.cfg.push(self.current, stmt.clone()),
        }
    }

    fn lower_if(
        &mut self,
        condition: &Expr,
        then_block: &zenith_sema::ir::Block,
        elsif_clauses: &[zenith_sema::ir::ElsifClause],
        else_block: Option<&zenith_sema::ir::Block>,
    ) {
        // The current block ends with the condition.
        let cond_id = self.current;
        self.cfg.push(cond_id, Stmt::Expr(condition.clone()));

        let merge = self.fresh_block(format!("if.merge.{}", cond_id));
        let then = self.fresh_block(format!("if.then.{}", cond_id));
        self.cfg.add_edge(cond_id, then);

        self.current = then;
        self.lower_block(then_block);
        self.cfg.add_edge(self.current, merge);

        // Each elsif chains off the previous condition's false edge.
        let mut prev_cond = cond_id;
        for (i, clause) in elsif_clauses.iter().enumerate() {
            let elsif_cond = self.fresh_block(format!("elsif.{}.cond", i));
            self.cfg.add_edge(prev_cond, elsif_cond);
            self.cfg.push(elsif_cond, Stmt::Expr(clause.condition.clone()));

            let elsif_then = self.fresh_block(format!("elsif.{}.then", i));
            self.cfg.add_edge(elsif_cond, elsif_then);
            self.current = elsif_then;
            self.lower_block(&clause.block);
            self.cfg.add_edge(self.current, merge);

            prev_cond = elsif_cond;
        }

        match else_block {
            Some(block) => {
                let else_id = self.fresh_block(format!("if.else.{}", prev_cond));
                self.cfg.add_edge(prev_cond, else_id);
                self.current = else_id;
                self.lower_block(block);
                self.cfg.add_edge(self.current, merge);
            }
            None => self.cfg.add_edge(prev_cond, merge),
        }

        self.current = merge;
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &zenith_sema::ir::Block,
    ) {
        if let Some(init_stmt) = init {
            self.cfg.push(self.current, init_stmt.clone());
        }
        let init_id = self.current;

        let cond = self.fresh_block(format!("for.cond.{}", init_id));
        self.cfg.add_edge(init_id, cond);
        if let Some(cond_expr) = condition {
            self.cfg.push(cond, Stmt::Expr(cond_expr.clone()));
        }

        let body_id = self.fresh_block(format!("for.body.{}", cond));
        self.cfg.add_edge(cond, body_id);
        let inc = self.fresh_block(format!("for.inc.{}", cond));
        let exit = self.fresh_block(format!("for.exit.{}", cond));
        self.cfg.add_edge(cond, exit);

        self.current = body_id;
        self.lower_block(body);
        self.cfg.add_edge(self.current, inc);

        if let Some(inc_expr) = increment {
            self.cfg.push(inc, Stmt::Expr(inc_expr.clone()));
        }
        self.cfg.add_edge(inc, cond); // back edge

        self.current = exit;
    }

    fn lower_select(
        &mut self,
        scrutinee: &Expr,
        cases: &[zenith_sema::ir::CaseClause],
        else_block: Option<&zenith_sema::ir::Block>,
    ) {
        let scrut_id = self.current;
        self.cfg.push(scrut_id, Stmt::Expr(scrutinee.clone()));

        let merge = self.fresh_block(format!("select.merge.{}", scrut_id));

        for (i, case) in cases.iter().enumerate() {
            let case_id = self.fresh_block(format!("select.case.{}", i));
            self.cfg.add_edge(scrut_id, case_id);
            self.current = case_id;
            self.lower_block(&case.block);
            self.cfg.add_edge(self.current, merge);
        }

        match else_block {
            Some(block) => {
                let else_id = self.fresh_block(format!("select.else.{}", scrut_id));
                self.cfg.add_edge(scrut_id, else_id);
                self.current = else_id;
                self.lower_block(block);
                self.cfg.add_edge(self.current, merge);
            }
            // Without an else the scrutinee can fall through.
            None => self.cfg.add_edge(scrut_id, merge),
        }

        self.current = merge;
    }

    fn lower_block(&mut self, block: &zenith_sema::ir::Block) {
        for stmt in &block.statements {
            self.lower_stmt(stmt);
        }
    }

    /// Labels are unique within a CFG; nested structures that would repeat
    /// a label get a numeric suffix.
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
}
