//! Dense handles into the `DesignDB` tables.

use std::fmt;

macro_rules! define_index {
    ($name:ident, $table:literal) => {
        #[doc = concat!("Position in `DesignDB::", $table, "`.")]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $table, self.0)
            }
        }
    };
}

define_index!(CellId, "cells");
define_index!(NetId, "nets");
define_index!(PinId, "pins");
define_index!(MasterId, "masters");
define_index!(RowId, "rows");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_order_by_index_and_name_their_table() {
        assert!(NetId::new(2) < NetId::new(10));
        assert_eq!(CellId::new(7).index(), 7);
        assert_eq!(format!("{:?}", RowId::new(0)), "rows#0");
        assert_eq!(format!("{:?}", PinId::new(3)), "pins#3");
    }
}
