use derive_more::Display;

use super::{
    array::{ArrayId, ArrayUntyped},
    layout::Layout,
    num::DataType,
};

/// How a scheduled task touches a registered array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Access {
    ReadOnly,
    WriteOnly,
}

/// The dependency record the command queue keeps for a registered array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayIr {
    pub layout: Layout,
    pub r#type: DataType,
    pub id: ArrayId,
    pub access: Access,
}

impl ArrayUntyped {
    #[inline]
    pub fn ir(&self, access: Access) -> ArrayIr {
        let layout = self.layout().clone();
        let r#type = self.data_type();
        let id = self.id();
        ArrayIr {
            layout,
            r#type,
            id,
            access,
        }
    }
}
