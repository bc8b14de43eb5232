use crate::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: ColumnType,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            name: name.into(),
            data_type,
        }
    }

    pub fn unqualified(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self::new("", "", name, data_type)
    }
}

/// The shape of a result set, fixed for the whole query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSchema {
    columns: Vec<ColumnSpec>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnSpec> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSpec> {
        self.columns.iter()
    }

    pub fn types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.data_type.clone()).collect()
    }
}

impl FromIterator<ColumnSpec> for ColumnSchema {
    fn from_iter<T: IntoIterator<Item = ColumnSpec>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ColumnSchema {
    type Item = &'a ColumnSpec;
    type IntoIter = std::slice::Iter<'a, ColumnSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}
