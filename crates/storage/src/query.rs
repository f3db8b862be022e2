//! SQL text for the MAC tables
//!
//! Module names are always bound as parameters; only fixed table and column
//! names are spliced into the statements.

use common::{DataType, ModuleName, ModuleSelection};

/// Columns read for IV comparison plots
pub const IV_PLOT_COLUMNS: &[&str] = &[
    "rel_hum",
    "temp_c",
    "module_name",
    "date_test",
    "time_test",
    "meas_v",
    "meas_i",
    "mod_ivtest_no",
];

/// A statement together with the module names to bind, in order
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleQuery {
    pub sql: String,
    pub params: Vec<ModuleName>,
}

/// `$1, $2, …, $n`
pub fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `WHERE module_name IN (...)` for a named selection, empty for `All`
pub fn module_filter(selection: &ModuleSelection) -> (String, Vec<ModuleName>) {
    let names = selection.names();
    if names.is_empty() {
        return (String::new(), Vec::new());
    }
    (
        format!("WHERE module_name IN ({})", placeholders(names.len())),
        names.to_vec(),
    )
}

fn join_clauses(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full rows of one data type, ordered by its test number
pub fn testing_data_query(data_type: DataType, selection: &ModuleSelection) -> ModuleQuery {
    let (filter, params) = module_filter(selection);
    let from = format!("SELECT * FROM {}", data_type.table_name());
    let order = format!("ORDER BY {}", data_type.order_column());
    ModuleQuery {
        sql: join_clauses(&[&from, &filter, &order]),
        params,
    }
}

/// IV columns needed for plotting, ordered by module then test number
pub fn iv_plot_query(selection: &ModuleSelection) -> ModuleQuery {
    let (filter, params) = module_filter(selection);
    let select = format!(
        "SELECT {} FROM {}",
        IV_PLOT_COLUMNS.join(", "),
        DataType::ModIv.table_name()
    );
    let order = format!("ORDER BY module_name, {}", DataType::ModIv.order_column());
    ModuleQuery {
        sql: join_clauses(&[&select, &filter, &order]),
        params,
    }
}

/// Distinct module names across all data tables
pub fn module_names_query() -> String {
    let selects: Vec<String> = DataType::ALL
        .iter()
        .map(|dt| format!("SELECT DISTINCT module_name FROM {}", dt.table_name()))
        .collect();
    format!("{} ORDER BY module_name", selects.join(" UNION "))
}

/// Latest IV test of a single module
pub fn latest_iv_query(module: &ModuleName) -> ModuleQuery {
    let table = DataType::ModIv.table_name();
    let order = DataType::ModIv.order_column();
    ModuleQuery {
        sql: format!(
            "SELECT * FROM {table} WHERE module_name = $1 AND {order} = \
             (SELECT MAX({order}) FROM {table} WHERE module_name = $1)"
        ),
        params: vec![module.clone()],
    }
}
