//! Common types used across moduleqc
//!
//! This module provides the fundamental domain types shared by the
//! storage, plotting and CLI layers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Token that selects every module instead of a named subset.
pub const ALL_MODULES: &str = "ALL";

/// Returns true if `name` can be spliced into SQL as an unquoted identifier.
///
/// Database and table names cannot be bound as query parameters, so every
/// name that ends up in DDL goes through this check first.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Detector module identifier (e.g., "320-ML-F3TC-CM-0102")
///
/// Names are always stored upper case so lookups against the MAC databases
/// are consistent regardless of how the user typed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a new ModuleName, normalising to upper case
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Parse a module name typed by the user, rejecting blank input.
    pub fn parse(s: &str) -> Result<Self> {
        let name = Self::new(s);
        if name.0.is_empty() {
            return Err(Error::invalid_input("module name must not be empty"));
        }
        Ok(name)
    }

    /// Get the module name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Measurement/assembly center identifier (e.g., "CMU", "UCSB")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacId(String);

impl MacId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MacId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MacId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kind of test record stored in a MAC database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Module IV (current vs. voltage) tests
    ModIv,
    /// Module pedestal tests
    ModPed,
    /// Module QC summaries
    ModQcs,
}

impl DataType {
    /// All data types in display order
    pub const ALL: [DataType; 3] = [DataType::ModIv, DataType::ModPed, DataType::ModQcs];

    /// Command-line / file-name spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::ModIv => "mod_iv",
            DataType::ModPed => "mod_ped",
            DataType::ModQcs => "mod_qcs",
        }
    }

    /// Remote table holding this data type
    pub fn table_name(&self) -> &'static str {
        match self {
            DataType::ModIv => "module_iv_test",
            DataType::ModPed => "module_pedestal_test",
            DataType::ModQcs => "module_qc_summary",
        }
    }

    /// Column that numbers tests within the table
    pub fn order_column(&self) -> &'static str {
        match self {
            DataType::ModIv => "mod_ivtest_no",
            DataType::ModPed => "mod_pedtest_no",
            DataType::ModQcs => "mod_qc_no",
        }
    }

    /// Whether rows of this type carry IV curves that can be plotted
    pub fn is_plottable(&self) -> bool {
        matches!(self, DataType::ModIv)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mod_iv" => Ok(DataType::ModIv),
            "mod_ped" => Ok(DataType::ModPed),
            "mod_qcs" => Ok(DataType::ModQcs),
            other => Err(Error::UnknownDataType(other.to_string())),
        }
    }
}

/// Which modules a query should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSelection {
    /// Every module in the table
    All,
    /// Only the named modules
    Named(Vec<ModuleName>),
}

impl ModuleSelection {
    /// Build a selection from raw command-line names.
    ///
    /// No names, or a first name equal to `ALL`, selects every module.
    pub fn from_args<S: AsRef<str>>(names: &[S]) -> Self {
        match names.first() {
            None => ModuleSelection::All,
            Some(first) if first.as_ref().trim().eq_ignore_ascii_case(ALL_MODULES) => {
                ModuleSelection::All
            }
            Some(_) => ModuleSelection::Named(
                names.iter().map(|n| ModuleName::new(n.as_ref())).collect(),
            ),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ModuleSelection::All)
    }

    /// Names to bind as query parameters (empty for `All`)
    pub fn names(&self) -> &[ModuleName] {
        match self {
            ModuleSelection::All => &[],
            ModuleSelection::Named(names) => names,
        }
    }

    /// Short form used in plot titles and file names
    pub fn label(&self) -> String {
        match self {
            ModuleSelection::All => ALL_MODULES.to_string(),
            ModuleSelection::Named(names) => names
                .iter()
                .map(ModuleName::as_str)
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl std::fmt::Display for ModuleSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleSelection::All => write!(f, "[{}]", ALL_MODULES),
            ModuleSelection::Named(names) => {
                let joined: Vec<&str> = names.iter().map(ModuleName::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("hgcdb_fnal"));
        assert!(is_sql_identifier("_scratch1"));
        assert!(!is_sql_identifier(""));
        assert!(!is_sql_identifier("1db"));
        assert!(!is_sql_identifier("db; DROP TABLE x"));
        assert!(!is_sql_identifier("my-db"));
        assert!(!is_sql_identifier(&"a".repeat(64)));
    }

    #[test]
    fn test_module_name_is_upper_case() {
        let name = ModuleName::new(" 320-ml-f3tc-cm-0102 ");
        assert_eq!(name.as_str(), "320-ML-F3TC-CM-0102");
    }

    #[test]
    fn test_module_name_parse_rejects_blank() {
        assert_eq!(
            ModuleName::parse("mod-a").unwrap(),
            ModuleName::new("MOD-A")
        );
        assert!(matches!(
            ModuleName::parse("   "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mac_id() {
        assert_eq!(MacId::from("cmu"), MacId::from("CMU"));
        assert_eq!(MacId::new("ucsb").to_string(), "UCSB");
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!("mod_iv".parse::<DataType>().unwrap(), DataType::ModIv);
        assert_eq!("MOD_PED".parse::<DataType>().unwrap(), DataType::ModPed);
        assert_eq!("mod_qcs".parse::<DataType>().unwrap(), DataType::ModQcs);
        assert!(matches!(
            "iv".parse::<DataType>(),
            Err(Error::UnknownDataType(ref s)) if s == "iv"
        ));
    }

    #[test]
    fn test_data_type_tables() {
        assert_eq!(DataType::ModIv.table_name(), "module_iv_test");
        assert_eq!(DataType::ModPed.order_column(), "mod_pedtest_no");
        assert_eq!(DataType::ModQcs.order_column(), "mod_qc_no");
        assert!(DataType::ModIv.is_plottable());
        assert!(!DataType::ModQcs.is_plottable());
    }

    #[test]
    fn test_selection_all() {
        let empty: [&str; 0] = [];
        assert!(ModuleSelection::from_args(&empty).is_all());
        assert!(ModuleSelection::from_args(&["ALL"]).is_all());
        assert!(ModuleSelection::from_args(&["all", "X"]).is_all());
        assert!(ModuleSelection::All.names().is_empty());
    }

    #[test]
    fn test_selection_named() {
        let sel = ModuleSelection::from_args(&["mod-a", "Mod-B"]);
        assert_eq!(
            sel,
            ModuleSelection::Named(vec![ModuleName::new("MOD-A"), ModuleName::new("MOD-B")])
        );
        assert_eq!(sel.label(), "MOD-A_MOD-B");
        assert_eq!(sel.to_string(), "[MOD-A, MOD-B]");
    }
}
