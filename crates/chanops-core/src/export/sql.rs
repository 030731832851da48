//! SQL dump rendering for per-table backups taken before a clean.

use chanops_types::table::{SqlValue, TableDump};

/// Quote an identifier, doubling any embedded quote character.
pub fn quote_ident(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!("{quote}{}{quote}", name.replace(quote, &doubled))
}

/// Render one value as a SQL literal.
pub fn sql_literal(value: &SqlValue, numeric: bool) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) if numeric && !v.is_empty() => v.clone(),
        Some(v) => format!("'{}'", v.replace('\'', "''")),
    }
}

/// Render a full table backup: header comments, `DROP TABLE IF EXISTS`, the
/// create statement when known, and one `INSERT` per row.
pub fn render_table_dump(dump: &TableDump, quote: char, generated_at: &str) -> String {
    let table = quote_ident(&dump.table, quote);
    let mut out = String::new();

    out.push_str(&format!("-- Backup of table {}\n", dump.table));
    out.push_str(&format!("-- Generated: {generated_at}\n"));
    out.push_str(&format!("-- Rows: {}\n\n", dump.rows.len()));

    out.push_str(&format!("DROP TABLE IF EXISTS {table};\n"));
    match &dump.create_statement {
        Some(ddl) => {
            let ddl = ddl.trim_end();
            out.push_str(ddl);
            if !ddl.ends_with(';') {
                out.push(';');
            }
            out.push('\n');
        }
        None => out.push_str("-- CREATE statement not available for this backend\n"),
    }
    out.push('\n');

    if dump.rows.is_empty() {
        return out;
    }

    let columns = dump
        .columns
        .iter()
        .map(|c| quote_ident(&c.name, quote))
        .collect::<Vec<_>>()
        .join(", ");

    for row in &dump.rows {
        let values = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let numeric = dump.columns.get(i).is_some_and(|c| c.is_numeric());
                sql_literal(value, numeric)
            })
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("INSERT INTO {table} ({columns}) VALUES ({values});\n"));
    }

    out
}
