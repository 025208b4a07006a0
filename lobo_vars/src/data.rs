use lobo_variant::Value;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::VarError;
use crate::operation::NodeVarOperation;
use crate::strategy::{NodeVarStrategy, ReadyContext};

/// One named variable: a resolution strategy paired with the operation that
/// governs who may read or write it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeVarData {
    pub name: String,
    pub operation: NodeVarOperation,
    pub strategy: NodeVarStrategy,
}

impl NodeVarData {
    pub fn new(
        name: impl Into<String>,
        operation: NodeVarOperation,
        strategy: NodeVarStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            operation,
            strategy,
        }
    }

    /// Reads the value. `include_private` asserts the caller's privilege
    /// (self access or a scene-tree descendant of the owning container);
    /// callers must never pass `true` on behalf of untrusted externals.
    pub fn get_value(&self, include_private: bool) -> Result<Value, VarError> {
        if !self.operation.is_get(include_private) {
            return Err(VarError::NotGettable(self.name.clone()));
        }
        self.strategy.value(&self.name)
    }

    /// Writes the value, with the same privilege rule as [`Self::get_value`].
    pub fn set_value(&self, value: Value, include_private: bool) -> Result<(), VarError> {
        if !self.operation.is_set(include_private) {
            return Err(VarError::NotSettable(self.name.clone()));
        }
        self.strategy.set_value(&self.name, value)
    }

    /// Binds the strategy's runtime references; one-shot per container
    /// lifecycle.
    pub fn ready(&mut self, ctx: &ReadyContext) -> Result<(), VarError> {
        self.strategy.ready(&self.name, ctx)
    }

    /// Reconciles this variable (the baseline/default) with an override from
    /// an inheriting scene. Names are the join key; same-kind strategies
    /// merge field by field; a different-kind override is adopted wholesale
    /// when it still supports the declared operation. `None` means the two
    /// are incompatible and the caller should fall back to the baseline.
    pub fn with_changes(&self, other: &Self, for_editor_serialization: bool) -> Option<Self> {
        if other.name != self.name {
            return None;
        }
        let mut merged = self.clone();
        if self.strategy.kind() == other.strategy.kind() {
            merged.strategy = self
                .strategy
                .with_changes(&other.strategy, for_editor_serialization)?;
        } else if other.strategy.valid_operations().contains(&self.operation) {
            // Adopting a fresh clone means no field of the old strategy can
            // leak across the kind change.
            merged.strategy = other.strategy.clone();
        } else {
            return None;
        }
        Some(merged)
    }

    /// The serialized form. The name is carried externally as the
    /// dictionary key, not embedded.
    pub fn to_dict(&self) -> JsonMap<String, JsonValue> {
        let mut dict = JsonMap::new();
        dict.insert(
            "Operation".to_string(),
            JsonValue::Number(self.operation.index().into()),
        );
        dict.insert("Strategy".to_string(), JsonValue::Object(self.strategy.to_dict()));
        dict
    }

    pub fn from_dict(name: &str, dict: &JsonMap<String, JsonValue>) -> Result<Self, VarError> {
        let index = dict
            .get("Operation")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| {
                VarError::InvalidDict(format!("NodeVar \"{name}\" is missing Operation"))
            })?;
        let operation = NodeVarOperation::from_index(index).ok_or_else(|| {
            VarError::InvalidDict(format!("NodeVar \"{name}\" has invalid operation {index}"))
        })?;
        let strategy = dict
            .get("Strategy")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| VarError::InvalidDict(format!("NodeVar \"{name}\" is missing Strategy")))?;
        Ok(Self::new(name, operation, NodeVarStrategy::from_dict(strategy)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerHandle;
    use crate::path::NodePath;
    use crate::strategy::{ExpressionStrategy, PointerStrategy, ValueStrategy};
    use std::collections::HashMap;

    struct NullResolver;

    impl crate::container::ContainerResolver for NullResolver {
        fn resolve(&self, _from: &NodePath, _path: &NodePath) -> Option<ContainerHandle> {
            None
        }
    }

    fn readied(mut var: NodeVarData) -> NodeVarData {
        let path = NodePath::from("/root/Test");
        let functions = HashMap::new();
        let resolver = NullResolver;
        let ctx = ReadyContext {
            owner_path: &path,
            functions: &functions,
            resolver: &resolver,
        };
        var.ready(&ctx).unwrap();
        var
    }

    fn value_var(name: &str, operation: NodeVarOperation, initial: Value) -> NodeVarData {
        NodeVarData::new(
            name,
            operation,
            NodeVarStrategy::Value(ValueStrategy::new(Some(initial))),
        )
    }

    #[test]
    fn permission_gates_follow_the_operation() {
        let var = readied(value_var("x", NodeVarOperation::PrivateGet, Value::Int(1)));
        assert!(matches!(var.get_value(false), Err(VarError::NotGettable(_))));
        assert_eq!(var.get_value(true).unwrap(), Value::Int(1));
        assert!(matches!(
            var.set_value(Value::Int(2), true),
            Err(VarError::NotSettable(_))
        ));

        let var = readied(value_var("y", NodeVarOperation::GetPrivateSet, Value::Int(1)));
        assert_eq!(var.get_value(false).unwrap(), Value::Int(1));
        assert!(matches!(
            var.set_value(Value::Int(2), false),
            Err(VarError::NotSettable(_))
        ));
        var.set_value(Value::Int(2), true).unwrap();
        assert_eq!(var.get_value(false).unwrap(), Value::Int(2));
    }

    #[test]
    fn merging_with_itself_is_idempotent() {
        let var = value_var("x", NodeVarOperation::GetSet, Value::Int(5));
        assert_eq!(var.with_changes(&var, false), Some(var.clone()));
    }

    #[test]
    fn names_are_the_join_key() {
        let a = value_var("a", NodeVarOperation::GetSet, Value::Int(1));
        let b = value_var("b", NodeVarOperation::GetSet, Value::Int(1));
        assert_eq!(a.with_changes(&b, false), None);
    }

    #[test]
    fn override_may_change_strategy_kind_if_operation_still_fits() {
        let baseline = value_var("x", NodeVarOperation::Get, Value::Int(1));
        let pointer = NodeVarData::new(
            "x",
            NodeVarOperation::Get,
            NodeVarStrategy::Pointer(PointerStrategy::new("/root/Other", "y")),
        );
        let merged = baseline.with_changes(&pointer, false).unwrap();
        // The baseline's operation survives, the strategy is adopted whole.
        assert_eq!(merged.operation, NodeVarOperation::Get);
        assert_eq!(merged.strategy, pointer.strategy);
    }

    #[test]
    fn kind_change_is_refused_when_the_operation_does_not_fit() {
        // A set-only variable cannot become a pointer; pointers only forward
        // reads.
        let baseline = value_var("x", NodeVarOperation::Set, Value::Int(1));
        let pointer = NodeVarData::new(
            "x",
            NodeVarOperation::Set,
            NodeVarStrategy::Pointer(PointerStrategy::new("/root/Other", "y")),
        );
        assert_eq!(baseline.with_changes(&pointer, false), None);
    }

    #[test]
    fn dict_round_trip() {
        let vars = [
            value_var("x", NodeVarOperation::GetPrivateSet, Value::from(1.5)),
            NodeVarData::new(
                "y",
                NodeVarOperation::PrivateGet,
                NodeVarStrategy::Pointer(PointerStrategy::new("/root/Other", "x")),
            ),
            NodeVarData::new(
                "z",
                NodeVarOperation::Get,
                NodeVarStrategy::Expression(ExpressionStrategy::new("x + 1")),
            ),
        ];
        for var in vars {
            let dict = var.to_dict();
            assert_eq!(NodeVarData::from_dict(&var.name, &dict).unwrap(), var);
        }
    }

    #[test]
    fn invalid_dicts_are_rejected() {
        assert!(matches!(
            NodeVarData::from_dict("x", &JsonMap::new()),
            Err(VarError::InvalidDict(_))
        ));
        let mut dict = JsonMap::new();
        dict.insert("Operation".to_string(), JsonValue::Number(99.into()));
        assert!(matches!(
            NodeVarData::from_dict("x", &dict),
            Err(VarError::InvalidDict(_))
        ));
    }
}
