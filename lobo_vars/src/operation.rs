/// The access permission declared for a NodeVar: whether it can be read or
/// written, and on which axis the access is public or private.
///
/// "Public" means any external caller; "private" means a privileged caller
/// only (the owning container itself, or a descendant of it in the scene
/// tree). Callers establish privilege externally and pass it through the
/// `include_private` flag of the predicates below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeVarOperation {
    /// public get; public set
    GetSet = 0,
    /// public get
    Get = 1,
    /// public set
    Set = 2,
    /// public get; private set
    GetPrivateSet = 3,
    /// public set; private get
    SetPrivateGet = 4,
    /// private get
    PrivateGet = 5,
    /// private set
    PrivateSet = 6,
    /// private get; private set
    PrivateGetSet = 7,
}

impl NodeVarOperation {
    pub const ALL: [NodeVarOperation; 8] = [
        NodeVarOperation::GetSet,
        NodeVarOperation::Get,
        NodeVarOperation::Set,
        NodeVarOperation::GetPrivateSet,
        NodeVarOperation::SetPrivateGet,
        NodeVarOperation::PrivateGet,
        NodeVarOperation::PrivateSet,
        NodeVarOperation::PrivateGetSet,
    ];

    /// Every operation with a get axis, public or private.
    pub const GETTABLE: [NodeVarOperation; 6] = [
        NodeVarOperation::GetSet,
        NodeVarOperation::Get,
        NodeVarOperation::GetPrivateSet,
        NodeVarOperation::SetPrivateGet,
        NodeVarOperation::PrivateGet,
        NodeVarOperation::PrivateGetSet,
    ];

    /// Every operation with a set axis, public or private.
    pub const SETTABLE: [NodeVarOperation; 6] = [
        NodeVarOperation::GetSet,
        NodeVarOperation::Set,
        NodeVarOperation::GetPrivateSet,
        NodeVarOperation::SetPrivateGet,
        NodeVarOperation::PrivateSet,
        NodeVarOperation::PrivateGetSet,
    ];

    pub fn is_private_get(self) -> bool {
        matches!(
            self,
            NodeVarOperation::SetPrivateGet
                | NodeVarOperation::PrivateGet
                | NodeVarOperation::PrivateGetSet
        )
    }

    pub fn is_private_set(self) -> bool {
        matches!(
            self,
            NodeVarOperation::GetPrivateSet
                | NodeVarOperation::PrivateSet
                | NodeVarOperation::PrivateGetSet
        )
    }

    pub fn is_get(self, include_private: bool) -> bool {
        matches!(
            self,
            NodeVarOperation::GetSet | NodeVarOperation::Get | NodeVarOperation::GetPrivateSet
        ) || (include_private && self.is_private_get())
    }

    pub fn is_set(self, include_private: bool) -> bool {
        matches!(
            self,
            NodeVarOperation::GetSet | NodeVarOperation::Set | NodeVarOperation::SetPrivateGet
        ) || (include_private && self.is_private_set())
    }

    /// True when the operation has no public axis at all.
    pub fn is_private(self) -> bool {
        matches!(
            self,
            NodeVarOperation::PrivateGet
                | NodeVarOperation::PrivateSet
                | NodeVarOperation::PrivateGetSet
        )
    }

    /// The serialized integer form.
    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn from_index(index: i64) -> Option<Self> {
        NodeVarOperation::ALL.into_iter().find(|op| op.index() == index)
    }
}

#[cfg(test)]
mod tests {
    use super::NodeVarOperation::{self, *};

    // (operation, public get, public set, private get, private set)
    const TABLE: [(NodeVarOperation, bool, bool, bool, bool); 8] = [
        (GetSet, true, true, false, false),
        (Get, true, false, false, false),
        (Set, false, true, false, false),
        (GetPrivateSet, true, false, false, true),
        (SetPrivateGet, false, true, true, false),
        (PrivateGet, false, false, true, false),
        (PrivateSet, false, false, false, true),
        (PrivateGetSet, false, false, true, true),
    ];

    #[test]
    fn predicates_match_the_operation_table() {
        for (op, public_get, public_set, private_get, private_set) in TABLE {
            assert_eq!(op.is_get(false), public_get, "{op:?} public get");
            assert_eq!(op.is_set(false), public_set, "{op:?} public set");
            assert_eq!(op.is_private_get(), private_get, "{op:?} private get");
            assert_eq!(op.is_private_set(), private_set, "{op:?} private set");
            assert_eq!(
                op.is_get(true),
                public_get || private_get,
                "{op:?} get with private access"
            );
            assert_eq!(
                op.is_set(true),
                public_set || private_set,
                "{op:?} set with private access"
            );
            assert_eq!(
                op.is_private(),
                !public_get && !public_set,
                "{op:?} fully private"
            );
        }
    }

    #[test]
    fn gettable_and_settable_sets_follow_the_axes() {
        for op in NodeVarOperation::ALL {
            assert_eq!(
                NodeVarOperation::GETTABLE.contains(&op),
                op.is_get(true),
                "{op:?} gettable"
            );
            assert_eq!(
                NodeVarOperation::SETTABLE.contains(&op),
                op.is_set(true),
                "{op:?} settable"
            );
        }
    }

    #[test]
    fn index_round_trips() {
        for op in NodeVarOperation::ALL {
            assert_eq!(NodeVarOperation::from_index(op.index()), Some(op));
        }
        assert_eq!(NodeVarOperation::from_index(8), None);
        assert_eq!(NodeVarOperation::from_index(-1), None);
    }
}
