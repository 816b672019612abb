use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use sqltk_core::{Datum, Name};
use sqltk_session::Row;

use crate::ir::{CreateIndex, CreateTable, DataType, KeyKind};
use crate::{errors, Result};

pub(crate) const PRIMARY: Name = Name::new_inline("primary");

#[derive(Debug, Default)]
pub(crate) struct Catalog {
    tables: FxHashMap<Name, Table>,
}

impl Catalog {
    #[inline]
    pub fn get(&self, name: &Name) -> Result<&Table> {
        Ok(self.tables.get(name).ok_or_else(|| errors::no_such_table(name))?)
    }

    #[inline]
    pub fn get_mut(&mut self, name: &Name) -> Result<&mut Table> {
        Ok(self.tables.get_mut(name).ok_or_else(|| errors::no_such_table(name))?)
    }

    #[inline]
    pub fn contains(&self, name: &Name) -> bool {
        self.tables.contains_key(name)
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn remove(&mut self, name: &Name) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn table_names(&self) -> Vec<Name> {
        let mut names = self.tables.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Column {
    pub name: Name,
    pub ty: DataType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub default: Option<Datum>,
}

#[derive(Debug, Clone)]
pub(crate) struct Index {
    pub name: Name,
    pub columns: Vec<usize>,
    pub unique: bool,
}

impl Index {
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub name: Name,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    /// Rows keyed by an internal row id, in insertion order
    pub rows: BTreeMap<u64, Row>,
    next_row_id: u64,
    /// The next value handed out to an auto increment column
    pub auto_id: u64,
}

impl Table {
    /// Builds an empty table from its definition. `defaults` are the evaluated column defaults.
    pub fn new(create: &CreateTable<'_>, defaults: Vec<Option<Datum>>) -> Result<Self> {
        let mut columns: Vec<Column> = Vec::with_capacity(create.columns.len());
        for (def, default) in create.columns.iter().zip(defaults) {
            if columns.iter().any(|c| c.name == def.name) {
                return Err(errors::dup_field_name(&def.name).into());
            }
            columns.push(Column {
                name: def.name.clone(),
                ty: def.ty,
                nullable: !def.not_null && !def.primary_key,
                auto_increment: def.auto_increment,
                default,
            });
        }

        let mut table = Table {
            name: create.name.clone(),
            columns,
            indexes: vec![],
            rows: BTreeMap::new(),
            next_row_id: 1,
            auto_id: 1,
        };

        let inline_keys = create.columns.iter().flat_map(|def| {
            let pk = def.primary_key.then(|| (KeyKind::Primary, None, vec![def.name.clone()]));
            let uk = def.unique.then(|| (KeyKind::Unique, None, vec![def.name.clone()]));
            pk.into_iter().chain(uk)
        });
        let table_keys = create.keys.iter().map(|key| (key.kind, key.name.clone(), key.columns.clone()));
        for (kind, name, columns) in inline_keys.chain(table_keys).collect::<Vec<_>>() {
            table.add_index(kind, name, &columns)?;
        }

        Ok(table)
    }

    fn add_index(&mut self, kind: KeyKind, name: Option<Name>, columns: &[Name]) -> Result<()> {
        let columns = columns
            .iter()
            .map(|name| self.column_index(name).ok_or_else(|| errors::key_column_does_not_exist(name)))
            .collect::<Result<Vec<_>, _>>()?;

        let name = match kind {
            KeyKind::Primary => {
                if self.primary_key().is_some() {
                    return Err(errors::multiple_pri_key().into());
                }
                for &col in &columns {
                    self.columns[col].nullable = false;
                }
                PRIMARY
            }
            _ => match name {
                Some(name) => {
                    if self.index(&name).is_some() {
                        return Err(errors::dup_key_name(&name).into());
                    }
                    name
                }
                None => self.generate_index_name(columns[0]),
            },
        };

        self.indexes.push(Index { name, columns, unique: kind != KeyKind::Index });
        Ok(())
    }

    /// Unnamed keys are named after their first column, with a numeric suffix if that is taken.
    fn generate_index_name(&self, column: usize) -> Name {
        let base = &self.columns[column].name;
        if self.index(base).is_none() {
            return base.clone();
        }
        (2..)
            .map(|i| Name::from(format!("{base}_{i}")))
            .find(|name| self.index(name).is_none())
            .unwrap_or_else(|| base.clone())
    }

    pub fn create_index(&mut self, create: &CreateIndex) -> Result<()> {
        let kind = if create.unique { KeyKind::Unique } else { KeyKind::Index };
        let mut staged = self.clone();
        staged.add_index(kind, Some(create.name.clone()), &create.columns)?;
        let changed = staged.rows.keys().copied().collect::<Vec<_>>();
        staged.check_unique(&staged.rows, &changed)?;
        *self = staged;
        Ok(())
    }

    pub fn drop_index(&mut self, name: &Name) -> Result<()> {
        match self.indexes.iter().position(|index| &index.name == name) {
            Some(idx) => {
                self.indexes.remove(idx);
                Ok(())
            }
            None => Err(errors::cant_drop_key(name).into()),
        }
    }

    #[inline]
    pub fn column_index(&self, name: &Name) -> Option<usize> {
        self.columns.iter().position(|c| &c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|index| index.name == name)
    }

    #[inline]
    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|index| index.is_primary())
    }

    /// The primary key column if the table is clustered on a single integer column.
    pub fn handle_column(&self) -> Option<usize> {
        match self.primary_key() {
            Some(Index { columns, .. })
                if columns.len() == 1 && matches!(self.columns[columns[0]].ty, DataType::Int { .. }) =>
            {
                Some(columns[0])
            }
            _ => None,
        }
    }

    pub fn next_row_id(&mut self) -> u64 {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    pub fn truncate(&mut self) {
        self.rows.clear();
        self.auto_id = 1;
    }

    /// Checks every unique index for a conflict involving one of the `changed` rows.
    pub fn check_unique(&self, rows: &BTreeMap<u64, Row>, changed: &[u64]) -> Result<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            for id in changed {
                let Some(row) = rows.get(id) else { continue };
                let key = index.columns.iter().map(|&col| &row[col]).collect::<Vec<_>>();
                // a key containing NULL never conflicts
                if key.iter().any(|datum| datum.is_null()) {
                    continue;
                }

                let conflict = rows.iter().any(|(other_id, other)| {
                    other_id != id && index.columns.iter().zip(&key).all(|(&col, &v)| &other[col] == v)
                });
                if conflict {
                    let key = key.into_iter().cloned().collect::<Vec<_>>();
                    return Err(errors::dup_entry(&key, &self.name, &index.name).into());
                }
            }
        }
        Ok(())
    }
}
