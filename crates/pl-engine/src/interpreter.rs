use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use pl_core::{PromptValue, RenderError, RenderLimits};
use pl_parser::{parse_template, Node};

use crate::blocks::BlockTable;
use crate::eval::eval_expr;
use crate::functions::FunctionRegistry;
use crate::include::{parent_dir, resolve_reference, TemplateLoader};
use crate::scope::Scope;

const MAX_BLOCK_EXPANSION_DEPTH: usize = 64;

/// One render: owns its own scope stack and block table, so concurrent
/// renders sharing a loader cannot interfere.
pub struct Renderer<'a> {
    loader: &'a dyn TemplateLoader,
    functions: &'a FunctionRegistry,
    limits: &'a RenderLimits,
    function_names: BTreeSet<String>,
    scope: Scope,
    blocks: BlockTable,
    include_stack: Vec<String>,
    loop_iterations: usize,
    block_depth: usize,
    output: String,
}

impl<'a> Renderer<'a> {
    pub fn new(
        state: BTreeMap<String, PromptValue>,
        loader: &'a dyn TemplateLoader,
        functions: &'a FunctionRegistry,
        limits: &'a RenderLimits,
    ) -> Self {
        Self {
            loader,
            functions,
            limits,
            function_names: functions.names(),
            scope: Scope::new(state),
            blocks: BlockTable::new(),
            include_stack: Vec::new(),
            loop_iterations: 0,
            block_depth: 0,
            output: String::new(),
        }
    }

    /// Renders root source to text. `root_reference` is the root template's
    /// own path when known, so self-inclusion is caught and relative
    /// includes resolve against the root template's directory.
    pub fn render_source(
        mut self,
        source: &str,
        root_reference: Option<&str>,
    ) -> Result<String, RenderError> {
        let nodes = parse_template(source, &self.function_names)?;

        let root_dir = match root_reference {
            Some(reference) => {
                let resolved = resolve_reference("", reference)?;
                let dir = parent_dir(&resolved);
                self.include_stack.push(resolved);
                dir
            }
            None => String::new(),
        };

        self.register_blocks(&nodes, 0, &root_dir);
        self.render_nodes(&nodes, &root_dir, 0)?;
        Ok(self.output)
    }

    /// Pre-pass: registers every block declaration of a document before any
    /// of its nodes render, so an including document's definitions are in
    /// the table before an included document emits.
    fn register_blocks(&mut self, nodes: &[Node], depth: usize, dir: &str) {
        for node in nodes {
            match node {
                Node::If { arms, else_body } => {
                    for arm in arms {
                        self.register_blocks(&arm.body, depth, dir);
                    }
                    if let Some(body) = else_body {
                        self.register_blocks(body, depth, dir);
                    }
                }
                Node::For { body, .. } => self.register_blocks(body, depth, dir),
                Node::Block { name, body, .. } => {
                    self.blocks.declare(name, Rc::new(body.clone()), depth, dir);
                    self.register_blocks(body, depth, dir);
                }
                _ => {}
            }
        }
    }

    fn render_nodes(
        &mut self,
        nodes: &[Node],
        current_dir: &str,
        depth: usize,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.emit(text)?,
                Node::Output { expr, .. } => {
                    let value = eval_expr(expr, &self.scope, self.functions);
                    self.emit(&value.to_display())?;
                }
                Node::If { arms, else_body } => {
                    let mut taken = false;
                    for arm in arms {
                        if eval_expr(&arm.condition, &self.scope, self.functions).is_truthy() {
                            self.render_nodes(&arm.body, current_dir, depth)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = else_body {
                            self.render_nodes(body, current_dir, depth)?;
                        }
                    }
                }
                Node::For { var, items, body, line } => {
                    self.render_for(var, items, body, *line, current_dir, depth)?;
                }
                Node::Set { name, value } => {
                    let value = eval_expr(value, &self.scope, self.functions);
                    self.scope.set(name.clone(), value);
                }
                Node::Block { name, line, .. } => {
                    let Some(definition) = self.blocks.lookup(name) else {
                        continue;
                    };
                    if self.block_depth >= MAX_BLOCK_EXPANSION_DEPTH {
                        return Err(RenderError::at_line(
                            "RENDER_LIMIT_EXCEEDED",
                            format!("Block \"{}\" expands past depth {}.", name, MAX_BLOCK_EXPANSION_DEPTH),
                            *line,
                        ));
                    }
                    self.block_depth += 1;
                    let result = self.render_nodes(&definition.body, &definition.dir, depth);
                    self.block_depth -= 1;
                    result?;
                }
                Node::Include { reference, line } => {
                    self.render_include(reference, *line, current_dir, depth)?;
                }
            }
        }
        Ok(())
    }

    fn render_for(
        &mut self,
        var: &str,
        items: &pl_parser::Expr,
        body: &[Node],
        line: usize,
        current_dir: &str,
        depth: usize,
    ) -> Result<(), RenderError> {
        let value = eval_expr(items, &self.scope, self.functions);
        // Lists iterate elements; maps iterate {key, value} entries in key
        // order. Anything else iterates zero times.
        let entries: Vec<PromptValue> = match value {
            PromptValue::List(values) => values,
            PromptValue::Map(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let mut entry = BTreeMap::new();
                    entry.insert("key".to_string(), PromptValue::String(key));
                    entry.insert("value".to_string(), value);
                    PromptValue::Map(entry)
                })
                .collect(),
            _ => Vec::new(),
        };

        let length = entries.len();
        for (index, item) in entries.into_iter().enumerate() {
            self.loop_iterations += 1;
            if self.loop_iterations > self.limits.max_loop_iterations {
                return Err(RenderError::at_line(
                    "RENDER_LIMIT_EXCEEDED",
                    format!(
                        "Loop iteration limit of {} exceeded.",
                        self.limits.max_loop_iterations
                    ),
                    line,
                ));
            }

            self.scope.push_frame();
            self.scope.set(var.to_string(), item);
            let mut meta = BTreeMap::new();
            meta.insert("index".to_string(), PromptValue::Number((index + 1) as f64));
            meta.insert("index0".to_string(), PromptValue::Number(index as f64));
            meta.insert("first".to_string(), PromptValue::Bool(index == 0));
            meta.insert("last".to_string(), PromptValue::Bool(index + 1 == length));
            meta.insert("length".to_string(), PromptValue::Number(length as f64));
            self.scope.set("loop", PromptValue::Map(meta));

            let result = self.render_nodes(body, current_dir, depth);
            self.scope.pop_frame();
            result?;
        }
        Ok(())
    }

    fn render_include(
        &mut self,
        reference: &str,
        line: usize,
        current_dir: &str,
        depth: usize,
    ) -> Result<(), RenderError> {
        if depth + 1 > self.limits.max_include_depth {
            return Err(RenderError::at_line(
                "RENDER_LIMIT_EXCEEDED",
                format!(
                    "Include depth limit of {} exceeded.",
                    self.limits.max_include_depth
                ),
                line,
            ));
        }

        let resolved = resolve_reference(current_dir, reference).map_err(|mut error| {
            error.line = Some(line);
            error
        })?;

        if self.include_stack.iter().any(|active| active == &resolved) {
            let mut chain = self.include_stack.clone();
            chain.push(resolved);
            return Err(RenderError::at_line(
                "INCLUDE_CYCLE",
                format!("Include cycle detected: {}", chain.join(" -> ")),
                line,
            ));
        }

        let source = self.loader.load(&resolved)?;
        let nodes = parse_template(&source, &self.function_names)?;
        let include_dir = parent_dir(&resolved);

        self.include_stack.push(resolved);
        self.scope.push_frame();
        self.register_blocks(&nodes, depth + 1, &include_dir);
        let result = self.render_nodes(&nodes, &include_dir, depth + 1);
        self.scope.pop_frame();
        self.include_stack.pop();
        result
    }

    fn emit(&mut self, text: &str) -> Result<(), RenderError> {
        if self.output.len() + text.len() > self.limits.max_output_bytes {
            return Err(RenderError::new(
                "RENDER_LIMIT_EXCEEDED",
                format!(
                    "Rendered output exceeds {} bytes.",
                    self.limits.max_output_bytes
                ),
            ));
        }
        self.output.push_str(text);
        Ok(())
    }
}
