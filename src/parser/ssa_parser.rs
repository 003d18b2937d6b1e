use super::context::{BlockEnd, BuildContext};
use crate::compiler::dominator::common_dominator;
use crate::compiler::ir::{
    BlockId, BlockKind, CompareOp, ComputeOp, InstructionKind, MethodId, MethodKind, Program,
    State, Symbol, SymbolKind, ValueId, RETURN_BINDING,
};
use crate::error::{Diagnostic, Error, Result};
use crate::lexer::{Token, TokenKind};

/// Built-in calls: name, argument count, whether a value is produced
const BUILTINS: [(&str, usize, bool); 3] = [
    ("InputNum", 0, true),
    ("OutputNum", 1, false),
    ("OutputNewLine", 0, false),
];

/// Where a scalar lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// Held as an SSA value in the binding state
    Tracked,
    /// Memory-resident global, accessed with explicit load/store
    Global,
}

/// Recursive-descent parser that builds the SSA program as it goes
///
/// There is no syntax tree. Every grammar routine receives a
/// [`BuildContext`], emits instructions into its block and returns the
/// context control falls out of. Phis are placed at the three structural
/// merge shapes: the `if` join, the `while` header and the method exit.
pub struct SsaParser {
    tokens: Vec<Token>,
    current: usize,
    program: Program,
    diagnostics: Vec<Diagnostic>,
}

impl SsaParser {
    /// Creates a parser over a token stream
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, String::new(), line, column));
        }
        SsaParser {
            tokens,
            current: 0,
            program: Program::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Seeds the parser with diagnostics reported earlier (by the scanner)
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Parses the whole computation into an SSA program
    ///
    /// Recoverable problems are returned alongside the program. A fatal error
    /// discards the program and carries the diagnostics gathered so far.
    pub fn parse(mut self) -> Result<(Program, Vec<Diagnostic>)> {
        match self.computation() {
            Ok(()) => Ok((self.program, self.diagnostics)),
            Err(error) => Err(error.with_diagnostics(self.diagnostics)),
        }
    }

    // ---- declarations ----

    fn computation(&mut self) -> Result<()> {
        self.expect(&TokenKind::Main);
        let main = self.program.add_method("main", MethodKind::Main);
        let entry = self.program.method(main).entry;
        self.program.set_begin_state(entry, State::new());
        let mut ctx = BuildContext::new(main, entry, State::new());

        while self.check(&TokenKind::Var) || self.check(&TokenKind::Array) {
            self.var_decl(&mut ctx)?;
        }
        while self.check(&TokenKind::Function) || self.check(&TokenKind::Procedure) {
            self.func_decl()?;
        }

        let line = self.peek().line;
        self.expect(&TokenKind::LeftBrace);
        let ctx = self.begin_body(ctx, line);
        let ctx = self.stat_sequence(ctx)?;
        let line = self.peek().line;
        self.expect(&TokenKind::RightBrace);
        self.finish_body(ctx, line)?;
        self.expect(&TokenKind::Period);

        if !self.is_at_end() {
            let token = self.peek().clone();
            self.warning(&token, "ignoring input after the final `.`");
        }

        tracing::debug!(
            "Built {} method(s), {} value(s)",
            self.program.methods.len(),
            self.program.value_count()
        );
        Ok(())
    }

    fn var_decl(&mut self, ctx: &mut BuildContext) -> Result<()> {
        let kind = if self.match_token(&TokenKind::Var) {
            SymbolKind::Scalar
        } else {
            self.advance();
            let mut dimensions = Vec::new();
            loop {
                self.expect(&TokenKind::LeftBracket);
                let token = self.peek().clone();
                let TokenKind::Number(size) = token.kind else {
                    return Err(self.unexpected("array dimension"));
                };
                self.advance();
                if size <= 0 {
                    self.error_at(
                        &token,
                        format!("array dimension must be positive, found {}", size),
                    );
                }
                dimensions.push(size);
                self.expect(&TokenKind::RightBracket);
                if !self.check(&TokenKind::LeftBracket) {
                    break;
                }
            }
            SymbolKind::Array { dimensions }
        };

        loop {
            let (name, token) = self.identifier("variable name")?;
            self.declare(ctx, name, kind.clone(), &token);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon);
        Ok(())
    }

    /// Declares a variable in the scope of `ctx.method` and gives it its
    /// initial value (zero for scalars, reserved storage for arrays)
    fn declare(&mut self, ctx: &mut BuildContext, name: String, kind: SymbolKind, token: &Token) {
        let symbol = Symbol {
            name: name.clone(),
            kind: kind.clone(),
            parameter: false,
            line: token.line,
        };
        let declared = if self.program.method(ctx.method).kind == MethodKind::Main {
            self.program.globals.declare(symbol)
        } else {
            self.program.method_mut(ctx.method).symbols.declare(symbol)
        };
        if !declared {
            self.warning(token, format!("`{}` is already declared", name));
            return;
        }

        match kind {
            SymbolKind::Scalar => {
                let zero = self
                    .program
                    .emit(ctx.block, InstructionKind::Const(0), token.line);
                ctx.state.bind(name, zero);
            }
            SymbolKind::Array { dimensions } => {
                self.program.emit(
                    ctx.block,
                    InstructionKind::DeclareArray { name, dimensions },
                    token.line,
                );
            }
        }
    }

    fn declare_parameter(&mut self, ctx: &mut BuildContext, name: String, token: &Token) {
        let method = self.program.method_mut(ctx.method);
        let index = method.arity;
        method.arity += 1;
        let declared = method.symbols.declare(Symbol {
            name: name.clone(),
            kind: SymbolKind::Scalar,
            parameter: true,
            line: token.line,
        });
        if !declared {
            self.warning(token, format!("duplicate parameter `{}`", name));
            return;
        }

        let value = self.program.emit(
            ctx.block,
            InstructionKind::Param {
                name: name.clone(),
                index,
            },
            token.line,
        );
        self.program.add_parameter(ctx.block, value);
        ctx.state.bind(name, value);
    }

    fn func_decl(&mut self) -> Result<()> {
        let kind = if self.match_token(&TokenKind::Function) {
            MethodKind::Function
        } else {
            self.advance();
            MethodKind::Procedure
        };
        let (name, token) = self.identifier("method name")?;
        if BUILTINS.iter().any(|(builtin, _, _)| *builtin == name) {
            self.error_at(&token, format!("`{}` is a built-in", name));
        } else if self.program.method_by_name(&name).is_some() {
            self.error_at(&token, format!("method `{}` is already declared", name));
        }

        let method = self.program.add_method(name, kind);
        let entry = self.program.method(method).entry;
        self.program.set_begin_state(entry, State::new());
        let mut ctx = BuildContext::new(method, entry, State::new());

        if self.match_token(&TokenKind::LeftParen) {
            if !self.check(&TokenKind::RightParen) {
                loop {
                    let (param, token) = self.identifier("parameter name")?;
                    self.declare_parameter(&mut ctx, param, &token);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen);
        }
        self.expect(&TokenKind::Semicolon);

        while self.check(&TokenKind::Var) || self.check(&TokenKind::Array) {
            self.var_decl(&mut ctx)?;
        }

        let line = self.peek().line;
        self.expect(&TokenKind::LeftBrace);
        let ctx = self.begin_body(ctx, line);
        let ctx = self.stat_sequence(ctx)?;
        let line = self.peek().line;
        self.expect(&TokenKind::RightBrace);
        self.finish_body(ctx, line)?;
        self.expect(&TokenKind::Semicolon);
        Ok(())
    }

    // ---- method bodies ----

    /// Leaves the entry block for the first body block and creates the exit
    fn begin_body(&mut self, ctx: BuildContext, line: usize) -> BuildContext {
        let method = ctx.method;
        let first = self.program.new_block(method, BlockKind::Plain);
        let entry = self.jump_to(ctx, first, line);
        self.program.set_dominator(first, entry.block);
        self.program.set_begin_state(first, entry.state.clone());

        let exit = self.program.new_block(method, BlockKind::Exit);
        self.program.method_mut(method).exit = Some(exit);

        BuildContext::new(method, first, entry.state)
    }

    /// Falls through into the exit block, merges the return paths and seals
    /// the method
    fn finish_body(&mut self, ctx: BuildContext, line: usize) -> Result<()> {
        let method = ctx.method;
        let exit = self
            .program
            .method(method)
            .exit
            .ok_or_else(|| Error::compiler("method body was never opened"))?;
        self.jump_to(ctx, exit, line);

        let pruned = self.program.prune_unreachable(method);
        let name = self.program.method(method).name.clone();
        let kind = self.program.method(method).kind;
        let predecessors = self.program.block(exit).predecessors.clone();
        let ends: Vec<State> = predecessors
            .iter()
            .map(|p| self.program.block(*p).end_state.clone().unwrap_or_default())
            .collect();

        let Some(mut state) = ends.first().cloned() else {
            return Err(Error::NoCommonDominator {
                method: name,
                reason: "exit block is unreachable".to_string(),
            });
        };

        if kind == MethodKind::Function {
            let values = ends
                .iter()
                .map(|s| s.get(RETURN_BINDING))
                .collect::<Option<Vec<ValueId>>>()
                .ok_or_else(|| Error::MissingReturnValue {
                    method: name.clone(),
                })?;
            if values.windows(2).all(|pair| pair[0] == pair[1]) {
                state.bind(RETURN_BINDING, values[0]);
            } else {
                let operands = predecessors.iter().copied().zip(values).collect();
                let phi = self.program.add_phi(exit, RETURN_BINDING, operands, line);
                tracing::trace!("Placed return phi {} in `{}`", phi, name);
                state.bind(RETURN_BINDING, phi);
            }
        }

        let dominator = match predecessors.as_slice() {
            [only] => *only,
            _ => common_dominator(&self.program, method, &predecessors)?,
        };
        self.program.set_dominator(exit, dominator);
        self.program.set_begin_state(exit, state.clone());
        self.resolve_phi_operands(method)?;

        let value = match kind {
            MethodKind::Function => state.get(RETURN_BINDING),
            MethodKind::Main | MethodKind::Procedure => None,
        };
        self.program
            .emit(exit, InstructionKind::Return { value }, line);
        self.program.seal(exit, state);

        tracing::debug!(
            "Finished `{}`: {} block(s), {} pruned",
            name,
            self.program.method(method).blocks.len(),
            pruned
        );
        Ok(())
    }

    /// Recomputes every phi of the method from its predecessors' end-states
    ///
    /// Loop-header phis are created before the loop body exists, so their
    /// back-edge operands are only known once the whole body has been parsed.
    fn resolve_phi_operands(&mut self, method: MethodId) -> Result<()> {
        let blocks = self.program.method(method).blocks.clone();
        for block in blocks {
            let phis = self.program.block(block).phis.clone();
            if phis.is_empty() {
                continue;
            }
            let predecessors = self.program.block(block).predecessors.clone();
            for phi in phis {
                let InstructionKind::Phi { variable, .. } = &self.program.instruction(phi).kind
                else {
                    continue;
                };
                let variable = variable.clone();

                let mut operands = Vec::with_capacity(predecessors.len());
                for pred in &predecessors {
                    let value = self
                        .program
                        .block(*pred)
                        .end_state
                        .as_ref()
                        .and_then(|s| s.get(&variable))
                        .ok_or_else(|| {
                            Error::compiler(format!("no binding for `{}` leaving {}", variable, pred))
                        })?;
                    operands.push((*pred, value));
                }
                self.program.set_phi_operands(phi, operands);
            }
        }
        Ok(())
    }

    /// Ends the block of `ctx` with a jump to `target`
    ///
    /// The edge is only linked when the block is reachable, so dead code
    /// never feeds a merge point.
    fn jump_to(&mut self, ctx: BuildContext, target: BlockId, line: usize) -> BlockEnd {
        self.program
            .emit(ctx.block, InstructionKind::Jump { target }, line);
        self.program.seal(ctx.block, ctx.state.clone());
        if ctx.reachable {
            self.program.link(ctx.block, target);
        }
        BlockEnd {
            block: ctx.block,
            state: ctx.state,
            reachable: ctx.reachable,
        }
    }

    /// Scalars whose values live in the binding state of `method`
    fn tracked_symbols(&self, method: MethodId) -> Vec<String> {
        let method = self.program.method(method);
        let table = match method.kind {
            MethodKind::Main => &self.program.globals,
            MethodKind::Function | MethodKind::Procedure => &method.symbols,
        };
        table.scalars().map(str::to_string).collect()
    }

    // ---- statements ----

    fn stat_sequence(&mut self, mut ctx: BuildContext) -> Result<BuildContext> {
        let live_at_start = ctx.reachable;
        let mut warned = false;

        loop {
            if self.at_sequence_end() {
                break;
            }
            if !self.check(&TokenKind::Semicolon) {
                if live_at_start && !ctx.reachable && !warned {
                    let token = self.peek().clone();
                    self.warning(&token, "unreachable statement after `return`");
                    warned = true;
                }
                ctx = self.statement(ctx)?;
            }

            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            if self.starts_statement() {
                let token = self.peek().clone();
                self.error_at(&token, format!("expected `;` before `{}`", token.kind));
                continue;
            }
            break;
        }
        Ok(ctx)
    }

    fn statement(&mut self, mut ctx: BuildContext) -> Result<BuildContext> {
        match self.peek().kind {
            TokenKind::Let => self.assignment(ctx),
            TokenKind::Call => {
                self.call(&mut ctx, false)?;
                Ok(ctx)
            }
            TokenKind::If => self.if_statement(ctx),
            TokenKind::While => self.while_statement(ctx),
            TokenKind::Return => self.return_statement(ctx),
            _ => {
                let token = self.peek().clone();
                self.error_at(&token, format!("expected a statement, found `{}`", token.kind));
                self.synchronize();
                Ok(ctx)
            }
        }
    }

    fn assignment(&mut self, mut ctx: BuildContext) -> Result<BuildContext> {
        self.advance();
        let (name, token) = self.identifier("variable name")?;
        let (kind, storage) = self.resolve(ctx.method, &name, &token)?;
        let indices = self.indices(&mut ctx)?;
        self.expect(&TokenKind::Arrow);
        let value = self.expression(&mut ctx)?;

        match kind {
            SymbolKind::Scalar => {
                if !indices.is_empty() {
                    self.error_at(&token, format!("`{}` is not an array", name));
                }
                match storage {
                    Storage::Tracked => ctx.state.bind(name, value),
                    Storage::Global => {
                        self.program.emit(
                            ctx.block,
                            InstructionKind::StoreGlobal { name, value },
                            token.line,
                        );
                    }
                }
            }
            SymbolKind::Array { .. } => {
                let address = self.element_address(&mut ctx, &name, &kind, &indices, &token)?;
                self.program.emit(
                    ctx.block,
                    InstructionKind::Store { address, value },
                    token.line,
                );
            }
        }
        Ok(ctx)
    }

    fn if_statement(&mut self, mut ctx: BuildContext) -> Result<BuildContext> {
        let line = self.advance().line;
        let condition = self.relation(&mut ctx)?;
        self.expect(&TokenKind::Then);

        let method = ctx.method;
        let branch_block = ctx.block;
        let then_block = self.program.new_block(method, BlockKind::Plain);
        let else_block = self.program.new_block(method, BlockKind::Plain);
        let join = self
            .program
            .new_block(method, BlockKind::Join { loop_header: false });

        self.program.emit(
            branch_block,
            InstructionKind::Branch {
                condition,
                on_true: then_block,
                on_false: else_block,
            },
            line,
        );
        self.program.seal(branch_block, ctx.state.clone());
        for target in [then_block, else_block] {
            if ctx.reachable {
                self.program.link(branch_block, target);
            }
            self.program.set_dominator(target, branch_block);
            self.program.set_begin_state(target, ctx.state.clone());
        }

        let then_ctx = self.stat_sequence(ctx.fork(then_block))?;
        let then_line = self.peek().line;
        let then_end = self.jump_to(then_ctx, join, then_line);

        let else_ctx = if self.match_token(&TokenKind::Else) {
            self.stat_sequence(ctx.fork(else_block))?
        } else {
            ctx.fork(else_block)
        };
        let end_line = self.peek().line;
        self.expect(&TokenKind::Fi);
        let else_end = self.jump_to(else_ctx, join, end_line);

        Ok(self.enter_if_join(method, join, branch_block, then_end, else_end, end_line))
    }

    /// Builds the binding state at an `if` join
    ///
    /// With two incoming edges each tracked symbol gets a phi only when the
    /// two arms disagree on its value.
    fn enter_if_join(
        &mut self,
        method: MethodId,
        join: BlockId,
        branch_block: BlockId,
        then_end: BlockEnd,
        else_end: BlockEnd,
        line: usize,
    ) -> BuildContext {
        let predecessors = self.program.block(join).predecessors.clone();
        let (state, dominator, reachable) = match predecessors.as_slice() {
            [] => (then_end.state, branch_block, false),
            [only] if *only == then_end.block => (then_end.state, *only, true),
            [only] => (else_end.state, *only, true),
            _ => {
                let mut state = then_end.state.clone();
                for name in self.tracked_symbols(method) {
                    let (Some(left), Some(right)) =
                        (then_end.state.get(&name), else_end.state.get(&name))
                    else {
                        continue;
                    };
                    if left == right {
                        continue;
                    }
                    let phi = self.program.add_phi(
                        join,
                        name.clone(),
                        vec![(then_end.block, left), (else_end.block, right)],
                        line,
                    );
                    tracing::trace!("Placed phi {} for `{}` in {}", phi, name, join);
                    state.bind(name, phi);
                }
                (state, branch_block, true)
            }
        };

        self.program.set_dominator(join, dominator);
        self.program.set_begin_state(join, state.clone());
        BuildContext {
            method,
            block: join,
            state,
            reachable,
        }
    }

    fn while_statement(&mut self, ctx: BuildContext) -> Result<BuildContext> {
        let line = self.advance().line;
        let method = ctx.method;
        let header = self
            .program
            .new_block(method, BlockKind::Join { loop_header: true });
        let preheader = self.jump_to(ctx, header, line);
        self.program.set_dominator(header, preheader.block);

        // The body is not parsed yet, so every tracked symbol gets a phi.
        // Back-edge operands are filled in by `resolve_phi_operands`.
        let mut state = preheader.state.clone();
        if preheader.reachable {
            for name in self.tracked_symbols(method) {
                if let Some(value) = preheader.state.get(&name) {
                    let phi =
                        self.program
                            .add_phi(header, name.clone(), vec![(preheader.block, value)], line);
                    state.bind(name, phi);
                }
            }
            tracing::trace!("Loop header {} holds {} phi(s)", header, state.len());
        }
        self.program.set_begin_state(header, state.clone());

        let mut header_ctx = BuildContext {
            method,
            block: header,
            state,
            reachable: preheader.reachable,
        };
        let condition = self.relation(&mut header_ctx)?;
        self.expect(&TokenKind::Do);

        let body = self.program.new_block(method, BlockKind::Plain);
        let exit = self.program.new_block(method, BlockKind::Plain);
        self.program.emit(
            header_ctx.block,
            InstructionKind::Branch {
                condition,
                on_true: body,
                on_false: exit,
            },
            line,
        );
        self.program
            .seal(header_ctx.block, header_ctx.state.clone());
        for target in [body, exit] {
            if header_ctx.reachable {
                self.program.link(header_ctx.block, target);
            }
            self.program.set_dominator(target, header_ctx.block);
            self.program
                .set_begin_state(target, header_ctx.state.clone());
        }

        let body_ctx = self.stat_sequence(header_ctx.fork(body))?;
        let end_line = self.peek().line;
        self.expect(&TokenKind::Od);
        self.jump_to(body_ctx, header, end_line);

        // Exit-path bindings are the header snapshot, not a fresh merge.
        Ok(header_ctx.fork(exit))
    }

    fn return_statement(&mut self, mut ctx: BuildContext) -> Result<BuildContext> {
        let token = self.advance();
        let value = if self.starts_expression() {
            Some(self.expression(&mut ctx)?)
        } else {
            None
        };

        let method = ctx.method;
        let kind = self.program.method(method).kind;
        match (kind, value) {
            (MethodKind::Function, Some(value)) => ctx.state.bind(RETURN_BINDING, value),
            (MethodKind::Function, None) => {}
            (MethodKind::Main | MethodKind::Procedure, Some(_)) => {
                self.warning(&token, "return value ignored outside a function");
            }
            (MethodKind::Main | MethodKind::Procedure, None) => {}
        }

        let exit = self
            .program
            .method(method)
            .exit
            .ok_or_else(|| Error::compiler("return outside a method body"))?;
        let returning = self.jump_to(ctx, exit, token.line);

        let dead = self.program.new_block(method, BlockKind::Plain);
        self.program.set_dominator(dead, returning.block);
        self.program.set_begin_state(dead, returning.state.clone());
        Ok(BuildContext {
            method,
            block: dead,
            state: returning.state,
            reachable: false,
        })
    }

    // ---- expressions ----

    fn relation(&mut self, ctx: &mut BuildContext) -> Result<ValueId> {
        let lhs = self.expression(ctx)?;
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtEq => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtEq => CompareOp::Ge,
            _ => return Err(self.unexpected("relational operator")),
        };
        self.advance();
        let rhs = self.expression(ctx)?;
        Ok(self
            .program
            .emit(ctx.block, InstructionKind::Compare { op, lhs, rhs }, token.line))
    }

    fn expression(&mut self, ctx: &mut BuildContext) -> Result<ValueId> {
        let mut value = self.term(ctx)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ComputeOp::Add,
                TokenKind::Minus => ComputeOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.term(ctx)?;
            value = self.program.emit(
                ctx.block,
                InstructionKind::Compute {
                    op,
                    lhs: value,
                    rhs,
                },
                line,
            );
        }
        Ok(value)
    }

    fn term(&mut self, ctx: &mut BuildContext) -> Result<ValueId> {
        let mut value = self.factor(ctx)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => ComputeOp::Mul,
                TokenKind::Slash => ComputeOp::Div,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.factor(ctx)?;
            value = self.program.emit(
                ctx.block,
                InstructionKind::Compute {
                    op,
                    lhs: value,
                    rhs,
                },
                line,
            );
        }
        Ok(value)
    }

    fn factor(&mut self, ctx: &mut BuildContext) -> Result<ValueId> {
        match self.peek().kind {
            TokenKind::Identifier(_) => self.designator(ctx),
            TokenKind::Number(n) => {
                let line = self.advance().line;
                Ok(self.program.emit(ctx.block, InstructionKind::Const(n), line))
            }
            TokenKind::LeftParen => {
                self.advance();
                let value = self.expression(ctx)?;
                self.expect(&TokenKind::RightParen);
                Ok(value)
            }
            TokenKind::Call => {
                let line = self.peek().line;
                match self.call(ctx, true)? {
                    Some(value) => Ok(value),
                    None => Err(Error::compiler(format!(
                        "call at line {} produced no value",
                        line
                    ))),
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Reads the value a designator denotes
    fn designator(&mut self, ctx: &mut BuildContext) -> Result<ValueId> {
        let (name, token) = self.identifier("variable name")?;
        let (kind, storage) = self.resolve(ctx.method, &name, &token)?;
        let indices = self.indices(ctx)?;

        match kind {
            SymbolKind::Scalar => {
                if !indices.is_empty() {
                    self.error_at(&token, format!("`{}` is not an array", name));
                }
                match storage {
                    Storage::Tracked => ctx
                        .state
                        .get(&name)
                        .ok_or_else(|| Error::compiler(format!("`{}` has no binding", name))),
                    Storage::Global => Ok(self.program.emit(
                        ctx.block,
                        InstructionKind::LoadGlobal { name },
                        token.line,
                    )),
                }
            }
            SymbolKind::Array { .. } => {
                let address = self.element_address(ctx, &name, &kind, &indices, &token)?;
                Ok(self
                    .program
                    .emit(ctx.block, InstructionKind::Load { address }, token.line))
            }
        }
    }

    fn indices(&mut self, ctx: &mut BuildContext) -> Result<Vec<ValueId>> {
        let mut indices = Vec::new();
        while self.match_token(&TokenKind::LeftBracket) {
            indices.push(self.expression(ctx)?);
            self.expect(&TokenKind::RightBracket);
        }
        Ok(indices)
    }

    /// Flattens `indices` into one offset and forms the element address
    ///
    /// The index at depth `i` is scaled by the product of the declared sizes
    /// deeper than `i`; the scaled terms are summed left to right.
    fn element_address(
        &mut self,
        ctx: &mut BuildContext,
        name: &str,
        kind: &SymbolKind,
        indices: &[ValueId],
        token: &Token,
    ) -> Result<ValueId> {
        let line = token.line;
        if indices.is_empty() {
            return Err(Error::InvalidDesignator {
                name: name.to_string(),
                line,
                reason: "array used without indices".to_string(),
            });
        }
        let strides = kind.strides();
        if indices.len() != strides.len() {
            self.error_at(
                token,
                format!(
                    "`{}` has {} dimension(s), {} index(es) given",
                    name,
                    strides.len(),
                    indices.len()
                ),
            );
        }

        let mut offset = None;
        for (index, stride) in indices.iter().zip(strides) {
            let term = if stride == 1 {
                *index
            } else {
                let scale = self
                    .program
                    .emit(ctx.block, InstructionKind::Const(stride), line);
                self.program.emit(
                    ctx.block,
                    InstructionKind::Compute {
                        op: ComputeOp::Mul,
                        lhs: *index,
                        rhs: scale,
                    },
                    line,
                )
            };
            offset = Some(match offset {
                None => term,
                Some(sum) => self.program.emit(
                    ctx.block,
                    InstructionKind::Compute {
                        op: ComputeOp::Add,
                        lhs: sum,
                        rhs: term,
                    },
                    line,
                ),
            });
        }
        let Some(offset) = offset else {
            return Err(Error::InvalidDesignator {
                name: name.to_string(),
                line,
                reason: "array has no dimensions".to_string(),
            });
        };

        let base = self.program.emit(
            ctx.block,
            InstructionKind::ArrayBase {
                name: name.to_string(),
            },
            line,
        );
        Ok(self
            .program
            .emit(ctx.block, InstructionKind::Index { base, offset }, line))
    }

    /// Parses `call ident [ "(" args ")" ]`
    ///
    /// Returns the call's value, or `None` for calls that produce nothing.
    /// When `needs_value` is set a valueless call is fatal.
    fn call(&mut self, ctx: &mut BuildContext, needs_value: bool) -> Result<Option<ValueId>> {
        self.advance();
        let (callee, token) = self.identifier("method name")?;

        let mut arguments = Vec::new();
        if self.match_token(&TokenKind::LeftParen) {
            if !self.check(&TokenKind::RightParen) {
                loop {
                    arguments.push(self.expression(ctx)?);
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen);
        }

        let line = token.line;
        let result = match callee.as_str() {
            "InputNum" => {
                self.check_arity(&token, &callee, 0, arguments.len());
                Some(self.program.emit(ctx.block, InstructionKind::Read, line))
            }
            "OutputNum" => {
                self.check_arity(&token, &callee, 1, arguments.len());
                if let Some(value) = arguments.first() {
                    self.program
                        .emit(ctx.block, InstructionKind::Write { value: *value }, line);
                }
                None
            }
            "OutputNewLine" => {
                self.check_arity(&token, &callee, 0, arguments.len());
                self.program
                    .emit(ctx.block, InstructionKind::WriteLine, line);
                None
            }
            _ => self.user_call(ctx, callee.clone(), arguments, &token),
        };

        if needs_value && result.is_none() {
            return Err(Error::VoidValue { callee, line });
        }
        Ok(result)
    }

    fn user_call(
        &mut self,
        ctx: &mut BuildContext,
        callee: String,
        arguments: Vec<ValueId>,
        token: &Token,
    ) -> Option<ValueId> {
        let target = self
            .program
            .methods
            .iter()
            .find(|m| m.kind != MethodKind::Main && m.name == callee)
            .map(|m| (m.arity, m.returns_value()));
        let returns_value = match target {
            Some((arity, returns_value)) => {
                self.check_arity(token, &callee, arity, arguments.len());
                returns_value
            }
            None => {
                self.warning(token, format!("call to undeclared method `{}`", callee));
                true
            }
        };

        // Globals tracked as SSA values in `main` must be in memory while the
        // callee runs, and may have changed when it returns.
        let spilled = match self.program.method(ctx.method).kind {
            MethodKind::Main => self.tracked_symbols(ctx.method),
            MethodKind::Function | MethodKind::Procedure => Vec::new(),
        };
        for name in &spilled {
            if let Some(value) = ctx.state.get(name) {
                self.program.emit(
                    ctx.block,
                    InstructionKind::StoreGlobal {
                        name: name.clone(),
                        value,
                    },
                    token.line,
                );
            }
        }
        let call = self.program.emit(
            ctx.block,
            InstructionKind::Call { callee, arguments },
            token.line,
        );
        for name in spilled {
            let value = self.program.emit(
                ctx.block,
                InstructionKind::LoadGlobal { name: name.clone() },
                token.line,
            );
            ctx.state.bind(name, value);
        }

        returns_value.then_some(call)
    }

    // ---- name resolution ----

    /// Finds what `name` denotes inside `method`; locals shadow globals
    fn resolve(&self, method: MethodId, name: &str, token: &Token) -> Result<(SymbolKind, Storage)> {
        let method = self.program.method(method);
        if method.kind != MethodKind::Main {
            if let Some(symbol) = method.symbols.get(name) {
                return Ok((symbol.kind.clone(), Storage::Tracked));
            }
        }
        let storage = match method.kind {
            MethodKind::Main => Storage::Tracked,
            MethodKind::Function | MethodKind::Procedure => Storage::Global,
        };
        self.program
            .globals
            .get(name)
            .map(|symbol| (symbol.kind.clone(), storage))
            .ok_or_else(|| Error::UndefinedVariable {
                name: name.to_string(),
                line: token.line,
            })
    }

    // ---- diagnostics ----

    fn check_arity(&mut self, token: &Token, callee: &str, expected: usize, given: usize) {
        if expected != given {
            self.error_at(
                token,
                format!(
                    "`{}` expects {} argument(s), {} given",
                    callee, expected, given
                ),
            );
        }
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(token.line, token.column, message));
    }

    fn warning(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(token.line, token.column, message));
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.peek();
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: token.kind.to_string(),
            line: token.line,
        }
    }

    /// Skips to a token that can end a statement
    fn synchronize(&mut self) {
        while !self.at_sequence_end() && !self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    // ---- token helpers ----

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `kind` or records a diagnostic without consuming anything
    fn expect(&mut self, kind: &TokenKind) {
        if !self.match_token(kind) {
            let token = self.peek().clone();
            self.error_at(&token, format!("expected `{}`, found `{}`", kind, token.kind));
        }
    }

    fn identifier(&mut self, what: &str) -> Result<(String, Token)> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                Ok((name, self.advance()))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn at_sequence_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Fi
                | TokenKind::Od
                | TokenKind::Else
                | TokenKind::RightBrace
                | TokenKind::Period
                | TokenKind::Eof
        )
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Let | TokenKind::Call | TokenKind::If | TokenKind::While | TokenKind::Return
        )
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier(_) | TokenKind::Number(_) | TokenKind::LeftParen | TokenKind::Call
        )
    }
}
