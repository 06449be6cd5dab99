//! Per-module permission levels.
//!
//! Every business module is gated by an integer level: 0 = no access,
//! 1 = read, 2 = write. A role carries one level per module; handlers
//! declare the minimum level they require.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Business modules subject to the permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Materials,
    Inventory,
    Customers,
    Accounting,
    Suppliers,
    Reporting,
    Purchases,
    Sales,
    Users,
}

impl Module {
    pub const ALL: [Module; 9] = [
        Module::Materials,
        Module::Inventory,
        Module::Customers,
        Module::Accounting,
        Module::Suppliers,
        Module::Reporting,
        Module::Purchases,
        Module::Sales,
        Module::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Materials => "materials",
            Module::Inventory => "inventory",
            Module::Customers => "customers",
            Module::Accounting => "accounting",
            Module::Suppliers => "suppliers",
            Module::Reporting => "reporting",
            Module::Purchases => "purchases",
            Module::Sales => "sales",
            Module::Users => "users",
        }
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Module {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or(())
    }
}

/// Access level within one module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// No access.
    #[default]
    None,
    /// List/detail/export access.
    Read,
    /// Create/edit/delete/import access.
    Write,
}

impl PermissionLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            PermissionLevel::None => 0,
            PermissionLevel::Read => 1,
            PermissionLevel::Write => 2,
        }
    }

    /// Parse the 0/1/2 encoding used by role forms and CSV.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PermissionLevel::None),
            1 => Some(PermissionLevel::Read),
            2 => Some(PermissionLevel::Write),
            _ => None,
        }
    }
}

/// A role's permission matrix: one level per module.
///
/// Modules absent from the map default to [`PermissionLevel::None`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<Module, PermissionLevel>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: Module, level: PermissionLevel) -> Self {
        self.0.insert(module, level);
        self
    }

    pub fn set(&mut self, module: Module, level: PermissionLevel) {
        self.0.insert(module, level);
    }

    pub fn level(&self, module: Module) -> PermissionLevel {
        self.0.get(&module).copied().unwrap_or_default()
    }

    /// Whether this set satisfies `required` for `module`.
    pub fn allows(&self, module: Module, required: PermissionLevel) -> bool {
        self.level(module) >= required
    }

    /// Full write access to every module.
    pub fn full() -> Self {
        let mut set = Self::new();
        for module in Module::ALL {
            set.set(module, PermissionLevel::Write);
        }
        set
    }
}

/// The permission gate: superusers bypass the matrix entirely.
pub fn has_permission(
    superuser: bool,
    permissions: Option<&PermissionSet>,
    module: Module,
    required: PermissionLevel,
) -> bool {
    if superuser {
        return true;
    }
    match permissions {
        Some(set) => set.allows(module, required),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(PermissionLevel::Write > PermissionLevel::Read);
        assert!(PermissionLevel::Read > PermissionLevel::None);
    }

    #[test]
    fn missing_module_defaults_to_none() {
        let set = PermissionSet::new().with(Module::Inventory, PermissionLevel::Read);
        assert!(set.allows(Module::Inventory, PermissionLevel::Read));
        assert!(!set.allows(Module::Inventory, PermissionLevel::Write));
        assert!(!set.allows(Module::Sales, PermissionLevel::Read));
    }

    #[test]
    fn superuser_bypasses_the_matrix() {
        assert!(has_permission(true, None, Module::Users, PermissionLevel::Write));
        assert!(!has_permission(false, None, Module::Users, PermissionLevel::Read));
    }
}
