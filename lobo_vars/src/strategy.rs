use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use lobo_expr::{EvalContext, EvalError, Expr};
use lobo_variant::{Value, ValueType};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::container::{ContainerResolver, NodeVarFn, WeakContainerHandle};
use crate::error::VarError;
use crate::operation::NodeVarOperation;
use crate::path::NodePath;

/// Everything a strategy needs to bind its runtime references: the owning
/// container's path (cross-references resolve relative to it), the owner's
/// expression-callable function table, and the scene-tree lookup.
pub struct ReadyContext<'a> {
    pub owner_path: &'a NodePath,
    pub functions: &'a HashMap<String, NodeVarFn>,
    pub resolver: &'a dyn ContainerResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Value,
    Pointer,
    Expression,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Value => "Value",
            StrategyKind::Pointer => "Pointer",
            StrategyKind::Expression => "Expression",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =========================================================
// VALUE STRATEGY
// =========================================================

/// Stores a literal value. The serialized initial value doubles as the
/// declared type: once an initial value exists, sets must match its type.
#[derive(Debug)]
pub struct ValueStrategy {
    pub initial_value: Option<Value>,
    current: RefCell<Option<Value>>,
}

impl ValueStrategy {
    pub fn new(initial_value: Option<Value>) -> Self {
        Self {
            initial_value,
            current: RefCell::new(None),
        }
    }

    fn ready(&mut self) {
        *self.current.get_mut() = self.initial_value.clone();
    }

    fn value(&self, name: &str) -> Result<Value, VarError> {
        self.current
            .borrow()
            .clone()
            .ok_or_else(|| VarError::Unset(name.to_string()))
    }

    fn set(&self, name: &str, value: Value) -> Result<(), VarError> {
        if let Some(initial) = &self.initial_value {
            let expected = ValueType::of(initial);
            let got = ValueType::of(&value);
            if expected != got {
                return Err(VarError::TypeMismatch {
                    name: name.to_string(),
                    expected,
                    got,
                });
            }
        }
        *self.current.borrow_mut() = Some(value);
        Ok(())
    }

    fn with_changes(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        if other.initial_value != self.initial_value {
            // The override's value wins when it differs.
            merged.initial_value = other.initial_value.clone();
        }
        merged
    }

    fn fill_dict(&self, dict: &mut JsonMap<String, JsonValue>) {
        if let Some(value) = &self.initial_value {
            dict.insert("InitialValue".to_string(), value.to_json());
        }
    }

    fn from_dict(dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let initial_value = match dict.get("InitialValue") {
            None | Some(JsonValue::Null) => None,
            Some(json) => Some(Value::from_json(json).ok_or_else(|| {
                VarError::InvalidDict(format!("InitialValue {json} is not a supported value"))
            })?),
        };
        Ok(Self::new(initial_value))
    }
}

impl Clone for ValueStrategy {
    /// Clones the serialized state only; the runtime value is re-established
    /// on ready.
    fn clone(&self) -> Self {
        Self::new(self.initial_value.clone())
    }
}

impl PartialEq for ValueStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.initial_value == other.initial_value
    }
}

// =========================================================
// POINTER STRATEGY
// =========================================================

/// Aliases another container's variable by path and name. The path is bound
/// to a weak handle at ready time; the alias never owns its target, and a
/// target that has gone away is an error on access.
#[derive(Debug)]
pub struct PointerStrategy {
    pub container_path: NodePath,
    pub container_var_name: String,
    target: RefCell<WeakContainerHandle>,
}

impl PointerStrategy {
    pub fn new(container_path: impl Into<NodePath>, container_var_name: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            container_var_name: container_var_name.into(),
            target: RefCell::new(Weak::new()),
        }
    }

    fn ready(&mut self, name: &str, ctx: &ReadyContext) -> Result<(), VarError> {
        let handle = ctx
            .resolver
            .resolve(ctx.owner_path, &self.container_path)
            .ok_or_else(|| VarError::DanglingReference {
                name: name.to_string(),
                path: self.container_path.clone(),
            })?;
        *self.target.get_mut() = Rc::downgrade(&handle);
        Ok(())
    }

    fn value(&self, name: &str) -> Result<Value, VarError> {
        let Some(container) = self.target.borrow().upgrade() else {
            return Err(VarError::DanglingReference {
                name: name.to_string(),
                path: self.container_path.clone(),
            });
        };
        // Containers expose private access to pointers; the alias acts with
        // the target's own authority.
        let result = container
            .borrow()
            .private_get_node_var(&self.container_var_name);
        result
    }

    fn with_changes(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        if other.container_path != self.container_path {
            merged.container_path = other.container_path.clone();
        }
        if other.container_var_name != self.container_var_name {
            merged.container_var_name = other.container_var_name.clone();
        }
        merged
    }

    fn fill_dict(&self, dict: &mut JsonMap<String, JsonValue>) {
        dict.insert(
            "ContainerPath".to_string(),
            JsonValue::String(self.container_path.as_str().to_string()),
        );
        dict.insert(
            "ContainerVarName".to_string(),
            JsonValue::String(self.container_var_name.clone()),
        );
    }

    fn from_dict(dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let container_path = dict
            .get("ContainerPath")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| VarError::InvalidDict("pointer strategy is missing ContainerPath".to_string()))?;
        let container_var_name = dict
            .get("ContainerVarName")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                VarError::InvalidDict("pointer strategy is missing ContainerVarName".to_string())
            })?;
        Ok(Self::new(container_path, container_var_name))
    }
}

impl Clone for PointerStrategy {
    fn clone(&self) -> Self {
        Self::new(self.container_path.clone(), self.container_var_name.clone())
    }
}

impl PartialEq for PointerStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.container_path == other.container_path
            && self.container_var_name == other.container_var_name
    }
}

// =========================================================
// EXPRESSION STRATEGY
// =========================================================

/// One variable the expression can see: a local key mapped to another
/// container's variable. The key usually matches the target variable's name,
/// and the serialized form omits the target name in that case.
#[derive(Debug)]
pub struct NodeVarReference {
    pub name: String,
    pub container_path: NodePath,
    pub container_var_name: String,
    target: RefCell<WeakContainerHandle>,
}

impl NodeVarReference {
    pub fn new(name: impl Into<String>, container_path: impl Into<NodePath>) -> Self {
        let name = name.into();
        Self {
            container_var_name: name.clone(),
            name,
            container_path: container_path.into(),
            target: RefCell::new(Weak::new()),
        }
    }

    /// A reference whose local key differs from the target variable's name,
    /// for when two targets share a name.
    pub fn aliased(
        name: impl Into<String>,
        container_path: impl Into<NodePath>,
        container_var_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container_path: container_path.into(),
            container_var_name: container_var_name.into(),
            target: RefCell::new(Weak::new()),
        }
    }

    fn ready(&mut self, owner_var: &str, ctx: &ReadyContext) -> Result<(), VarError> {
        let handle = ctx
            .resolver
            .resolve(ctx.owner_path, &self.container_path)
            .ok_or_else(|| VarError::DanglingReference {
                name: owner_var.to_string(),
                path: self.container_path.clone(),
            })?;
        *self.target.get_mut() = Rc::downgrade(&handle);
        Ok(())
    }

    fn value(&self, owner_var: &str) -> Result<Value, VarError> {
        let Some(container) = self.target.borrow().upgrade() else {
            return Err(VarError::DanglingReference {
                name: owner_var.to_string(),
                path: self.container_path.clone(),
            });
        };
        let result = container.borrow().get_node_var(&self.container_var_name);
        result
    }

    fn to_dict(&self) -> JsonMap<String, JsonValue> {
        let mut dict = JsonMap::new();
        dict.insert(
            "ContainerPath".to_string(),
            JsonValue::String(self.container_path.as_str().to_string()),
        );
        if self.container_var_name != self.name {
            dict.insert(
                "ContainerVarName".to_string(),
                JsonValue::String(self.container_var_name.clone()),
            );
        }
        dict
    }

    fn from_dict(key: &str, dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let container_path = dict
            .get("ContainerPath")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                VarError::InvalidDict(format!("reference \"{key}\" is missing ContainerPath"))
            })?;
        let container_var_name = dict
            .get("ContainerVarName")
            .and_then(JsonValue::as_str)
            .unwrap_or(key);
        Ok(Self::aliased(key, container_path, container_var_name))
    }
}

impl Clone for NodeVarReference {
    fn clone(&self) -> Self {
        Self::aliased(
            self.name.clone(),
            self.container_path.clone(),
            self.container_var_name.clone(),
        )
    }
}

impl PartialEq for NodeVarReference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.container_path == other.container_path
            && self.container_var_name == other.container_var_name
    }
}

struct ExpressionRuntime {
    ast: Expr,
    functions: HashMap<String, NodeVarFn>,
}

/// Computes its value from a parsed formula. Variables inside the formula
/// resolve through [`NodeVarReference`]s; function calls resolve through the
/// owning container's registered functions.
pub struct ExpressionStrategy {
    pub expression: String,
    pub references: IndexMap<String, NodeVarReference>,
    runtime: RefCell<Option<ExpressionRuntime>>,
    evaluating: Cell<bool>,
}

impl ExpressionStrategy {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            references: IndexMap::new(),
            runtime: RefCell::new(None),
            evaluating: Cell::new(false),
        }
    }

    pub fn with_reference(mut self, reference: NodeVarReference) -> Self {
        self.references.insert(reference.name.clone(), reference);
        self
    }

    fn ready(&mut self, name: &str, ctx: &ReadyContext) -> Result<(), VarError> {
        *self.runtime.get_mut() = None;
        self.evaluating.set(false);
        let ast = lobo_expr::parse_source(&self.expression).map_err(|source| {
            VarError::Expression {
                name: name.to_string(),
                source,
            }
        })?;
        for reference in self.references.values_mut() {
            reference.ready(name, ctx)?;
        }
        *self.runtime.get_mut() = Some(ExpressionRuntime {
            ast,
            functions: ctx.functions.clone(),
        });
        Ok(())
    }

    fn value(&self, name: &str) -> Result<Value, VarError> {
        let runtime = self.runtime.borrow();
        let Some(runtime) = runtime.as_ref() else {
            return Err(VarError::NotReady(name.to_string()));
        };
        // Expressions may reference other expressions; re-entering this one
        // while it is already evaluating means the reference graph loops.
        if self.evaluating.get() {
            return Err(VarError::Eval(EvalError::Cycle(name.to_string())));
        }
        self.evaluating.set(true);
        let result = runtime.ast.eval(&ExpressionEvalContext {
            var_name: name,
            references: &self.references,
            functions: &runtime.functions,
        });
        self.evaluating.set(false);
        result.map_err(VarError::Eval)
    }

    fn with_changes(&self, other: &Self, for_editor_serialization: bool) -> Self {
        let mut merged = self.clone();
        if for_editor_serialization {
            // The editor only persists the diff against the default.
            merged.references.clear();
        }
        // Inheriting never removes references, only updates them by name.
        for reference in other.references.values() {
            merged
                .references
                .insert(reference.name.clone(), reference.clone());
        }
        if other.expression != self.expression {
            merged.expression = other.expression.clone();
        }
        merged
    }

    fn fill_dict(&self, dict: &mut JsonMap<String, JsonValue>) {
        if !self.expression.is_empty() {
            dict.insert(
                "Expression".to_string(),
                JsonValue::String(self.expression.clone()),
            );
        }
        if !self.references.is_empty() {
            let mut references = JsonMap::new();
            for (key, reference) in &self.references {
                references.insert(key.clone(), JsonValue::Object(reference.to_dict()));
            }
            dict.insert(
                "NodeVarReferences".to_string(),
                JsonValue::Object(references),
            );
        }
    }

    fn from_dict(dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let expression = dict
            .get("Expression")
            .and_then(JsonValue::as_str)
            .unwrap_or("");
        let mut strategy = Self::new(expression);
        if let Some(references) = dict.get("NodeVarReferences") {
            let references = references.as_object().ok_or_else(|| {
                VarError::InvalidDict("NodeVarReferences is not a dictionary".to_string())
            })?;
            for (key, json) in references {
                let reference_dict = json.as_object().ok_or_else(|| {
                    VarError::InvalidDict(format!("reference \"{key}\" is not a dictionary"))
                })?;
                let reference = NodeVarReference::from_dict(key, reference_dict)?;
                strategy.references.insert(key.clone(), reference);
            }
        }
        Ok(strategy)
    }
}

impl Clone for ExpressionStrategy {
    fn clone(&self) -> Self {
        Self {
            expression: self.expression.clone(),
            references: self.references.clone(),
            runtime: RefCell::new(None),
            evaluating: Cell::new(false),
        }
    }
}

impl PartialEq for ExpressionStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression && self.references == other.references
    }
}

impl fmt::Debug for ExpressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionStrategy")
            .field("expression", &self.expression)
            .field("references", &self.references)
            .field("bound", &self.runtime.borrow().is_some())
            .finish()
    }
}

/// Evaluation environment for one expression variable.
struct ExpressionEvalContext<'a> {
    var_name: &'a str,
    references: &'a IndexMap<String, NodeVarReference>,
    functions: &'a HashMap<String, NodeVarFn>,
}

impl EvalContext for ExpressionEvalContext<'_> {
    fn variable(&self, name: &str) -> Result<Value, EvalError> {
        let reference = self
            .references
            .get(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))?;
        reference.value(self.var_name).map_err(|err| match err {
            VarError::Eval(EvalError::Cycle(origin)) => EvalError::Cycle(origin),
            other => EvalError::Resolver(other.to_string()),
        })
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        function(args).ok_or_else(|| {
            EvalError::Resolver(format!("function \"{name}\" could not evaluate its arguments"))
        })
    }
}

// =========================================================
// STRATEGY DISPATCH
// =========================================================

/// A NodeVar's value-resolution mechanism. The set of variants is closed so
/// the inheritance merge can match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeVarStrategy {
    Value(ValueStrategy),
    Pointer(PointerStrategy),
    Expression(ExpressionStrategy),
}

impl NodeVarStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            NodeVarStrategy::Value(_) => StrategyKind::Value,
            NodeVarStrategy::Pointer(_) => StrategyKind::Pointer,
            NodeVarStrategy::Expression(_) => StrategyKind::Expression,
        }
    }

    /// The operations this strategy can be combined with. Pointers and
    /// expressions produce values by forwarding, so they only make sense on
    /// operations with a get axis.
    pub fn valid_operations(&self) -> &'static [NodeVarOperation] {
        match self {
            NodeVarStrategy::Value(_) => &NodeVarOperation::ALL,
            NodeVarStrategy::Pointer(_) | NodeVarStrategy::Expression(_) => {
                &NodeVarOperation::GETTABLE
            }
        }
    }

    pub fn value(&self, name: &str) -> Result<Value, VarError> {
        match self {
            NodeVarStrategy::Value(strategy) => strategy.value(name),
            NodeVarStrategy::Pointer(strategy) => strategy.value(name),
            NodeVarStrategy::Expression(strategy) => strategy.value(name),
        }
    }

    pub fn set_value(&self, name: &str, value: Value) -> Result<(), VarError> {
        match self {
            NodeVarStrategy::Value(strategy) => strategy.set(name, value),
            NodeVarStrategy::Pointer(_) | NodeVarStrategy::Expression(_) => {
                Err(VarError::NotSettable(name.to_string()))
            }
        }
    }

    /// Binds runtime references. Called once per container lifecycle.
    pub fn ready(&mut self, name: &str, ctx: &ReadyContext) -> Result<(), VarError> {
        match self {
            NodeVarStrategy::Value(strategy) => {
                strategy.ready();
                Ok(())
            }
            NodeVarStrategy::Pointer(strategy) => strategy.ready(name, ctx),
            NodeVarStrategy::Expression(strategy) => strategy.ready(name, ctx),
        }
    }

    /// Field-level merge with an override of the same kind. `None` means the
    /// kinds differ and the caller must decide (adopt or revert).
    pub fn with_changes(&self, other: &Self, for_editor_serialization: bool) -> Option<Self> {
        match (self, other) {
            (NodeVarStrategy::Value(a), NodeVarStrategy::Value(b)) => {
                Some(NodeVarStrategy::Value(a.with_changes(b)))
            }
            (NodeVarStrategy::Pointer(a), NodeVarStrategy::Pointer(b)) => {
                Some(NodeVarStrategy::Pointer(a.with_changes(b)))
            }
            (NodeVarStrategy::Expression(a), NodeVarStrategy::Expression(b)) => Some(
                NodeVarStrategy::Expression(a.with_changes(b, for_editor_serialization)),
            ),
            _ => None,
        }
    }

    pub fn to_dict(&self) -> JsonMap<String, JsonValue> {
        let mut dict = JsonMap::new();
        dict.insert(
            "Type".to_string(),
            JsonValue::String(self.kind().as_str().to_string()),
        );
        match self {
            NodeVarStrategy::Value(strategy) => strategy.fill_dict(&mut dict),
            NodeVarStrategy::Pointer(strategy) => strategy.fill_dict(&mut dict),
            NodeVarStrategy::Expression(strategy) => strategy.fill_dict(&mut dict),
        }
        dict
    }

    pub fn from_dict(dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let kind = dict
            .get("Type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| VarError::InvalidDict("strategy dictionary is missing Type".to_string()))?;
        match kind {
            "Value" => Ok(NodeVarStrategy::Value(ValueStrategy::from_dict(dict)?)),
            "Pointer" => Ok(NodeVarStrategy::Pointer(PointerStrategy::from_dict(dict)?)),
            "Expression" => Ok(NodeVarStrategy::Expression(ExpressionStrategy::from_dict(
                dict,
            )?)),
            other => Err(VarError::InvalidDict(format!(
                "unknown strategy type \"{other}\""
            ))),
        }
    }
}
