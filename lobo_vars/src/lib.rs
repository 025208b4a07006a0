//! Named, typed variables attached to scene nodes ("NodeVars"), with
//! pluggable resolution strategies (stored value, pointer to another
//! container's variable, computed expression), per-variable get/set
//! permissions, and inheritance merging of local overrides against declared
//! or scene-inherited defaults.

pub mod container;
pub mod data;
pub mod error;
pub mod operation;
pub mod path;
pub mod strategy;

pub use container::{
    ContainerHandle, ContainerResolver, DefaultValueRegistry, EmptyRegistry, NodeVarContainer,
    NodeVarFn, WeakContainerHandle, NODE_VARS_PROPERTY,
};
pub use data::NodeVarData;
pub use error::VarError;
pub use operation::NodeVarOperation;
pub use path::NodePath;
pub use strategy::{
    ExpressionStrategy, NodeVarReference, NodeVarStrategy, PointerStrategy, ReadyContext,
    StrategyKind, ValueStrategy,
};
