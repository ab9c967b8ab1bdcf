//! DDL of the destination star schema
//!
//! The whole schema is dropped and recreated on every run. The fact table is dropped
//! first with `CASCADE` so its foreign keys never block the dimension drops.

use super::tables::DestinationTable;

/// Statement dropping all nine tables
pub fn drop_tables() -> String {
    let dimensions: Vec<&str> = DestinationTable::all()
        .iter()
        .filter(|t| !t.is_fact())
        .map(|t| t.name())
        .collect();

    format!(
        "DROP TABLE IF EXISTS {} CASCADE;\nDROP TABLE IF EXISTS {} CASCADE;\n",
        DestinationTable::FactConsultation.name(),
        dimensions.join(", ")
    )
}

/// `CREATE TABLE` statement for one table
pub fn create_table(table: DestinationTable) -> String {
    let mut lines = vec![format!("    {} SERIAL PRIMARY KEY", table.key_column())];
    for column in table.columns() {
        match column.references {
            Some(target) => lines.push(format!(
                "    {} {} REFERENCES {}({})",
                column.name,
                column.kind.sql_type(),
                target.name(),
                target.key_column()
            )),
            None => lines.push(format!("    {} {}", column.name, column.kind.sql_type())),
        }
    }
    format!("CREATE TABLE {} (\n{}\n);\n", table.name(), lines.join(",\n"))
}

/// Full script: drops, then creates dimensions before the fact table
pub fn create_schema() -> String {
    let mut ddl = drop_tables();
    for table in DestinationTable::all() {
        ddl.push('\n');
        ddl.push_str(&create_table(*table));
    }
    ddl
}
