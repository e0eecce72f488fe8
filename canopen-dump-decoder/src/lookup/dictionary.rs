//! Object dictionary type hints
//!
//! The dumper does not model the object dictionary. It only needs to know
//! which objects hold visible strings so segmented values can be shown as
//! text instead of hex. A handful of CiA 301 objects are built in; more can
//! be registered from configuration.

use crate::types::Multiplexer;
use std::collections::HashMap;

/// CANopen basic data types (CiA 301 data type indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer8,
    Integer16,
    Integer32,
    Unsigned8,
    Unsigned16,
    Unsigned32,
    Real32,
    VisibleString,
    OctetString,
    UnicodeString,
    Domain,
}

impl DataType {
    /// Map a data type index, as found in EDS files, to a data type
    pub fn from_index(index: u16) -> Option<Self> {
        match index {
            0x0001 => Some(Self::Boolean),
            0x0002 => Some(Self::Integer8),
            0x0003 => Some(Self::Integer16),
            0x0004 => Some(Self::Integer32),
            0x0005 => Some(Self::Unsigned8),
            0x0006 => Some(Self::Unsigned16),
            0x0007 => Some(Self::Unsigned32),
            0x0008 => Some(Self::Real32),
            0x0009 => Some(Self::VisibleString),
            0x000A => Some(Self::OctetString),
            0x000B => Some(Self::UnicodeString),
            0x000F => Some(Self::Domain),
            _ => None,
        }
    }
}

/// Objects whose type is fixed by CiA 301
const BUILTIN_OBJECTS: [(u16, u8, DataType); 5] = [
    (0x1000, 0, DataType::Unsigned32),   // Device type
    (0x1001, 0, DataType::Unsigned8),    // Error register
    (0x1008, 0, DataType::VisibleString), // Manufacturer device name
    (0x1009, 0, DataType::VisibleString), // Manufacturer hardware version
    (0x100A, 0, DataType::VisibleString), // Manufacturer software version
];

/// Type hints keyed by (index, subindex)
#[derive(Debug, Clone)]
pub struct TypeDictionary {
    types: HashMap<Multiplexer, DataType>,
}

impl TypeDictionary {
    /// Dictionary preloaded with the CiA 301 communication objects
    pub fn new() -> Self {
        let mut dictionary = Self::empty();
        for (index, subindex, data_type) in BUILTIN_OBJECTS {
            dictionary.insert(Multiplexer::new(index, subindex), data_type);
        }
        dictionary
    }

    /// Dictionary without any entries
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register or override the type of an object
    pub fn insert(&mut self, multiplexer: Multiplexer, data_type: DataType) {
        self.types.insert(multiplexer, data_type);
    }

    pub fn type_of(&self, multiplexer: Multiplexer) -> Option<DataType> {
        self.types.get(&multiplexer).copied()
    }

    pub fn is_visible_string(&self, multiplexer: Multiplexer) -> bool {
        self.type_of(multiplexer) == Some(DataType::VisibleString)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeDictionary {
    fn default() -> Self {
        Self::new()
    }
}
