use std::fmt;

/// The flags byte of a managed instance.
///
/// Supplied by the state authority; tells the barriers whether field values
/// in the instance can be used without consulting the authority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstanceFlags(i8);

impl InstanceFlags {
    /// Fields may be read and written without consulting the authority.
    pub const READ_WRITE_OK: Self = Self(0);
    /// Fields must be checked with the authority before use.
    pub const LOAD_REQUIRED: Self = Self(1);
    /// Fields may be read without consulting the authority; writes are checked.
    pub const READ_OK: Self = Self(-1);

    pub const fn from_raw(raw: i8) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> i8 {
        self.0
    }

    /// Returns `true` for [`READ_WRITE_OK`](Self::READ_WRITE_OK).
    pub const fn is_clear(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if reads must consult the authority.
    pub const fn requires_load(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for InstanceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::READ_WRITE_OK => write!(f, "read-write-ok"),
            Self::LOAD_REQUIRED => write!(f, "load-required"),
            Self::READ_OK => write!(f, "read-ok"),
            Self(raw) => write!(f, "flags({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(InstanceFlags::READ_WRITE_OK.is_clear());
        assert!(!InstanceFlags::READ_OK.is_clear());
        assert!(!InstanceFlags::READ_OK.requires_load());
        assert!(InstanceFlags::LOAD_REQUIRED.requires_load());
        assert_eq!(InstanceFlags::default(), InstanceFlags::READ_WRITE_OK);
    }

    #[test]
    fn display() {
        assert_eq!(InstanceFlags::LOAD_REQUIRED.to_string(), "load-required");
        assert_eq!(InstanceFlags::from_raw(7).to_string(), "flags(7)");
    }
}
