//! Column-oriented movie table with missing values.
use chrono::NaiveDate;
use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v[row].map_or(true, f64::is_nan),
            ColumnData::Text(v) => v[row].is_none(),
            ColumnData::Date(v) => v[row].is_none(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut it = keep.iter();
            values.retain(|_| *it.next().unwrap_or(&false));
        }
        match self {
            ColumnData::Numeric(v) => filter(v, keep),
            ColumnData::Text(v) => filter(v, keep),
            ColumnData::Date(v) => filter(v, keep),
        }
    }

    fn render(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            ColumnData::Text(v) => v[row].clone().unwrap_or_default(),
            ColumnData::Date(v) => v[row].map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// One row per movie, keyed by `movie_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    movie_ids: Vec<i64>,
    columns: Vec<Column>,
}

impl FeatureTable {
    pub fn new(movie_ids: Vec<i64>) -> Self {
        Self {
            movie_ids,
            columns: Vec::new(),
        }
    }

    pub fn movie_ids(&self) -> &[i64] {
        &self.movie_ids
    }

    pub fn n_rows(&self) -> usize {
        self.movie_ids.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Adds a column, replacing any existing column of the same name in place.
    ///
    /// # Panics
    ///
    /// Panics if the column length differs from the row count.
    pub fn insert(&mut self, name: impl Into<String>, data: ColumnData) {
        let name = name.into();
        assert_eq!(
            data.len(),
            self.n_rows(),
            "column {name:?} has the wrong number of rows"
        );
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.data = data,
            None => self.columns.push(Column { name, data }),
        }
    }

    pub fn insert_numeric(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.insert(name, ColumnData::Numeric(values));
    }

    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name)? {
            ColumnData::Numeric(v) => Ok(v),
            _ => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Dense copy of a numeric column that must not hold missing values.
    pub fn dense(&self, name: &str) -> Result<Array1<f64>> {
        self.numeric(name)?
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect::<Option<Array1<f64>>>()
            .ok_or_else(|| PipelineError::MissingValues(name.to_string()))
    }

    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            let pos = self
                .columns
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
            self.columns.remove(pos);
        }
        Ok(())
    }

    /// Keeps the rows whose mask entry is `true`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        assert_eq!(keep.len(), self.n_rows());
        let mut it = keep.iter();
        self.movie_ids.retain(|_| *it.next().unwrap_or(&false));
        for col in &mut self.columns {
            col.data.retain(keep);
        }
    }

    /// Row mask that is `true` where none of `columns` is missing.
    pub fn complete_rows<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<bool>> {
        let mut keep = vec![true; self.n_rows()];
        for name in columns {
            let data = self.column(name.as_ref())?;
            for (row, k) in keep.iter_mut().enumerate() {
                *k &= !data.is_missing(row);
            }
        }
        Ok(keep)
    }

    /// Design matrix of the named numeric columns, rows in table order.
    pub fn to_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((self.n_rows(), names.len()));
        for (j, name) in names.iter().enumerate() {
            let col = self.dense(name.as_ref())?;
            matrix.column_mut(j).assign(&col);
        }
        Ok(matrix)
    }

    /// Writes the table as CSV with a leading `movie_id` column.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec!["movie_id"];
        header.extend(self.column_names());
        wtr.write_record(&header)?;
        for (row, id) in self.movie_ids.iter().enumerate() {
            let mut record = vec![id.to_string()];
            record.extend(self.columns.iter().map(|c| c.data.render(row)));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
