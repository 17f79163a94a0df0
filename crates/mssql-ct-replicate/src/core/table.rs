//! Replicable table metadata.

/// One column of a replicated table.
///
/// `name` carries its bracket delimiters from the discovery query onward;
/// downstream DML builders concatenate it verbatim and must not re-quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Bracket-quoted column name, e.g. `[OrderId]`.
    pub name: String,
    /// Catalog type name, e.g. `int`, `nvarchar`. Drives row decoding.
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A change-tracking-enabled table on the source.
///
/// Key columns are the columns participating in any index (conventionally the
/// primary key); the two column lists are disjoint and together cover every
/// column of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Fully bracket-quoted two-part name, e.g. `[dbo].[Orders]`.
    pub name: String,
    /// Indexed columns, in catalog order.
    pub key_columns: Vec<ColumnDef>,
    /// All remaining columns, in catalog order.
    pub other_columns: Vec<ColumnDef>,
}

impl TableDescriptor {
    /// Display form without bracket delimiters, e.g. `dbo.Orders`.
    ///
    /// This is the form matched against the configured table allowlist.
    pub fn display_name(&self) -> String {
        self.name.replace(['[', ']'], "")
    }

    /// Whether the table can be replicated at all.
    pub fn has_keys(&self) -> bool {
        !self.key_columns.is_empty()
    }

    /// Key column names followed by other column names.
    pub fn all_column_names(&self) -> impl Iterator<Item = &str> {
        self.key_columns
            .iter()
            .chain(self.other_columns.iter())
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableDescriptor {
        TableDescriptor {
            name: "[dbo].[Orders]".into(),
            key_columns: vec![ColumnDef::new("[Id]", "int")],
            other_columns: vec![
                ColumnDef::new("[Total]", "decimal"),
                ColumnDef::new("[Placed]", "datetime2"),
            ],
        }
    }

    #[test]
    fn test_display_name_strips_brackets() {
        assert_eq!(orders().display_name(), "dbo.Orders");
    }

    #[test]
    fn test_all_column_names_keys_first() {
        let table = orders();
        let cols: Vec<&str> = table.all_column_names().collect();
        assert_eq!(cols, vec!["[Id]", "[Total]", "[Placed]"]);
    }

    #[test]
    fn test_has_keys() {
        assert!(orders().has_keys());
        let keyless = TableDescriptor {
            name: "[dbo].[Heap]".into(),
            key_columns: vec![],
            other_columns: vec![ColumnDef::new("[Payload]", "nvarchar")],
        };
        assert!(!keyless.has_keys());
    }
}
