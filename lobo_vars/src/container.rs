use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use lobo_variant::{Value, ValueType};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::data::NodeVarData;
use crate::error::VarError;
use crate::operation::NodeVarOperation;
use crate::path::NodePath;
use crate::strategy::{NodeVarStrategy, ReadyContext, ValueStrategy};

/// Shared ownership of a container; the scene tree and tests hold these.
pub type ContainerHandle = Rc<RefCell<NodeVarContainer>>;

/// The non-owning form cross-references hold. A dead target is an error on
/// access, never a crash.
pub type WeakContainerHandle = Weak<RefCell<NodeVarContainer>>;

/// An expression-callable function registered on a container. Returning
/// `None` reports that the arguments could not be handled.
pub type NodeVarFn = Rc<dyn Fn(&[Value]) -> Option<Value>>;

/// The registry property under which a scene file's inherited NodeVars are
/// stored.
pub const NODE_VARS_PROPERTY: &str = "node_vars";

/// Path-based container lookup, provided by the host scene tree. `from` is
/// the path of the container asking, so hosts can support relative paths.
pub trait ContainerResolver {
    fn resolve(&self, from: &NodePath, path: &NodePath) -> Option<ContainerHandle>;
}

/// Looks up the serialized defaults a scene file declares for a property.
/// Provided by the host's packed-scene machinery.
pub trait DefaultValueRegistry {
    fn default_value(
        &self,
        scene_file: &str,
        property: &str,
    ) -> Option<JsonMap<String, JsonValue>>;
}

/// A registry with no inherited defaults, for containers outside any scene
/// inheritance chain.
pub struct EmptyRegistry;

impl DefaultValueRegistry for EmptyRegistry {
    fn default_value(
        &self,
        _scene_file: &str,
        _property: &str,
    ) -> Option<JsonMap<String, JsonValue>> {
        None
    }
}

/// A scene node that owns a set of NodeVars.
///
/// Lifecycle is two-phase: construct every container (declaring defaults,
/// registering functions, loading serialized locals), then call
/// [`NodeVarContainer::ready`] once per container so cross-references can
/// resolve against the fully built tree.
pub struct NodeVarContainer {
    path: NodePath,
    scene_file: Option<String>,
    local_vars: JsonMap<String, JsonValue>,
    declared: Vec<NodeVarData>,
    functions: HashMap<String, NodeVarFn>,
    vars: IndexMap<String, NodeVarData>,
}

impl NodeVarContainer {
    pub fn new(path: impl Into<NodePath>) -> Self {
        Self {
            path: path.into(),
            scene_file: None,
            local_vars: JsonMap::new(),
            declared: Vec::new(),
            functions: HashMap::new(),
            vars: IndexMap::new(),
        }
    }

    /// The scene file this container was instanced from; the key used to
    /// look up inherited defaults.
    pub fn with_scene_file(mut self, scene_file: impl Into<String>) -> Self {
        self.scene_file = Some(scene_file.into());
        self
    }

    /// Serialized local entries, keyed by variable name.
    pub fn with_local_vars(mut self, local_vars: JsonMap<String, JsonValue>) -> Self {
        self.local_vars = local_vars;
        self
    }

    /// Declares a default variable of the given type and operation, with the
    /// type's zero value. The static counterpart of scanning a node type for
    /// variable attributes.
    pub fn declare(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        operation: NodeVarOperation,
    ) -> Self {
        self.declared.push(NodeVarData::new(
            name,
            operation,
            NodeVarStrategy::Value(ValueStrategy::new(Some(value_type.default_value()))),
        ));
        self
    }

    /// Declares a fully specified default variable.
    pub fn declare_var(mut self, var: NodeVarData) -> Self {
        self.declared.push(var);
        self
    }

    /// Registers a function that expressions on this container may call.
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Option<Value> + 'static,
    ) -> Self {
        self.functions.insert(name.into(), Rc::new(function));
        self
    }

    pub fn into_handle(self) -> ContainerHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn scene_file(&self) -> Option<&str> {
        self.scene_file.as_deref()
    }

    /// Merges locals against defaults and binds every variable's runtime
    /// references. A variable that fails to bind is reported and skipped;
    /// the container's other variables keep working.
    pub fn ready(
        handle: &ContainerHandle,
        resolver: &dyn ContainerResolver,
        registry: &dyn DefaultValueRegistry,
    ) {
        let (path, functions, mut vars) = {
            let container = handle.borrow();
            let vars = container.build_node_vars(registry);
            (container.path.clone(), container.functions.clone(), vars)
        };
        let ctx = ReadyContext {
            owner_path: &path,
            functions: &functions,
            resolver,
        };
        for (name, var) in vars.iter_mut() {
            if let Err(err) = var.ready(&ctx) {
                log::error!("NodeVarContainer \"{path}\": failed to bind NodeVar \"{name}\": {err}");
            }
        }
        handle.borrow_mut().vars = vars;
    }

    /// Builds the variable map: serialized locals, then declared defaults
    /// with scene-inherited defaults layered on top (scene inheritance wins),
    /// then each local entry merged against its default. Locals with no
    /// default pass through; defaults with no local become new entries.
    fn build_node_vars(&self, registry: &dyn DefaultValueRegistry) -> IndexMap<String, NodeVarData> {
        let mut vars: IndexMap<String, NodeVarData> = IndexMap::new();
        for (name, json) in &self.local_vars {
            let Some(dict) = json.as_object() else {
                log::error!(
                    "NodeVarContainer \"{}\": local NodeVar \"{name}\" is not a dictionary",
                    self.path
                );
                continue;
            };
            match NodeVarData::from_dict(name, dict) {
                Ok(var) => {
                    vars.insert(name.clone(), var);
                }
                Err(err) => log::error!(
                    "NodeVarContainer \"{}\": could not load NodeVar \"{name}\": {err}",
                    self.path
                ),
            }
        }

        let mut defaults: IndexMap<String, NodeVarData> = IndexMap::new();
        for var in &self.declared {
            defaults.insert(var.name.clone(), var.clone());
        }
        if let Some(scene_file) = &self.scene_file {
            if let Some(inherited) = registry.default_value(scene_file, NODE_VARS_PROPERTY) {
                for (name, json) in &inherited {
                    let Some(dict) = json.as_object() else {
                        log::error!(
                            "NodeVarContainer \"{}\": inherited NodeVar \"{name}\" is not a dictionary",
                            self.path
                        );
                        continue;
                    };
                    match NodeVarData::from_dict(name, dict) {
                        Ok(var) => {
                            defaults.insert(name.clone(), var);
                        }
                        Err(err) => log::error!(
                            "NodeVarContainer \"{}\": could not load inherited NodeVar \"{name}\": {err}",
                            self.path
                        ),
                    }
                }
            }
        }

        for (name, default) in defaults {
            let merged = match vars.get(&name) {
                Some(local) => match default.with_changes(local, false) {
                    Some(merged) => merged,
                    None => {
                        log::warn!(
                            "NodeVarContainer \"{}\": NodeVar \"{name}\" could not be merged with its default value, reverting to the default",
                            self.path
                        );
                        default
                    }
                },
                None => default,
            };
            vars.insert(name, merged);
        }
        vars
    }

    pub fn var(&self, key: &str) -> Result<&NodeVarData, VarError> {
        self.vars
            .get(key)
            .ok_or_else(|| VarError::UnknownVar(key.to_string()))
    }

    pub fn node_vars(&self) -> impl Iterator<Item = &NodeVarData> {
        self.vars.values()
    }

    /// Reads a NodeVar as an external caller.
    pub fn get_node_var(&self, key: &str) -> Result<Value, VarError> {
        self.var(key)?.get_value(false)
    }

    /// Writes a NodeVar as an external caller.
    pub fn set_node_var(&self, key: &str, value: Value) -> Result<(), VarError> {
        self.var(key)?.set_value(value, false)
    }

    /// Reads a NodeVar with private access. Only for the container itself or
    /// a caller the host has verified to be a descendant.
    pub fn private_get_node_var(&self, key: &str) -> Result<Value, VarError> {
        self.var(key)?.get_value(true)
    }

    /// Writes a NodeVar with private access; same privilege rule as
    /// [`Self::private_get_node_var`].
    pub fn private_set_node_var(&self, key: &str, value: Value) -> Result<(), VarError> {
        self.var(key)?.set_value(value, true)
    }
}
