//! CSV ingestion and persistence through polars

use super::{Dataset, FeatureKind, FeatureSpec, FeatureValue, Label, Record, Schema};
use crate::error::{FairBalanceError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read a delimited file into a DataFrame
pub fn load_dataframe(path: &Path) -> Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext != "csv" {
        return Err(FairBalanceError::DataError(format!("Unsupported file format: {}", ext)));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Load a dataset, moving `label_column` to the end.
///
/// `columns` restricts the feature columns (in the given order); by default
/// every non-label column is used. Rows with a null in any used column are
/// dropped.
pub fn load_dataset(path: &Path, label_column: &str, columns: Option<&[String]>) -> Result<Dataset> {
    let df = load_dataframe(path)?;
    let dataset = dataframe_to_dataset(&df, label_column, columns)?;
    info!(
        path = %path.display(),
        rows = dataset.len(),
        features = dataset.schema().n_features(),
        "Loaded dataset"
    );
    Ok(dataset)
}

/// Convert a DataFrame into a dataset.
///
/// Boolean columns become [`FeatureKind::Boolean`], string columns
/// [`FeatureKind::Categorical`], and anything castable to Float64
/// [`FeatureKind::Numeric`]. The label must be integral.
pub fn dataframe_to_dataset(df: &DataFrame, label_column: &str, columns: Option<&[String]>) -> Result<Dataset> {
    let feature_cols: Vec<String> = match columns {
        Some(cols) => cols
            .iter()
            .filter(|name| name.as_str() != label_column)
            .cloned()
            .collect(),
        None => df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != label_column)
            .map(|s| s.to_string())
            .collect(),
    };

    let n_rows = df.height();
    let mut specs = Vec::with_capacity(feature_cols.len());
    let mut column_values: Vec<Vec<Option<FeatureValue>>> = Vec::with_capacity(feature_cols.len());

    for name in &feature_cols {
        let column = df
            .column(name)
            .map_err(|_| FairBalanceError::FeatureNotFound(name.clone()))?;
        let series = column.as_materialized_series();
        let (kind, values) = series_values(series)?;
        debug!(column = %name, kind = %kind, "Mapped column");
        specs.push(FeatureSpec::new(name.clone(), kind));
        column_values.push(values);
    }

    let labels = label_values(df, label_column)?;

    let mut records = Vec::with_capacity(n_rows);
    let mut dropped = 0usize;
    for row in 0..n_rows {
        let label = match labels[row] {
            Some(label) => label,
            None => {
                dropped += 1;
                continue;
            }
        };
        let values: Option<Vec<FeatureValue>> = column_values.iter().map(|col| col[row].clone()).collect();
        match values {
            Some(values) => records.push(Record::new(values, label)),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        warn!(dropped, "Dropped rows containing null values");
    }

    Dataset::from_records(Schema::new(specs, label_column), records)
}

fn series_values(series: &Series) -> Result<(FeatureKind, Vec<Option<FeatureValue>>)> {
    let mapped = match series.dtype() {
        DataType::Boolean => (
            FeatureKind::Boolean,
            series.bool()?.into_iter().map(|v| v.map(FeatureValue::Boolean)).collect(),
        ),
        DataType::String => (
            FeatureKind::Categorical,
            series
                .str()?
                .into_iter()
                .map(|v| v.map(|s| FeatureValue::Categorical(s.to_string())))
                .collect(),
        ),
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(FeatureValue::Numeric))
                .collect();
            (FeatureKind::Numeric, values)
        }
    };
    Ok(mapped)
}

fn label_values(df: &DataFrame, label_column: &str) -> Result<Vec<Option<Label>>> {
    let column = df
        .column(label_column)
        .map_err(|_| FairBalanceError::FeatureNotFound(label_column.to_string()))?;
    let cast = column.as_materialized_series().cast(&DataType::Float64)?;

    cast.f64()?
        .into_iter()
        .map(|v| match v {
            Some(x) if x.is_nan() => Ok(None),
            Some(x) if x.fract() != 0.0 => Err(FairBalanceError::DataError(format!(
                "Label column '{}' holds non-integral value {}",
                label_column, x
            ))),
            Some(x) => Ok(Some(x as Label)),
            None => Ok(None),
        })
        .collect()
}

/// Convert a dataset back into a DataFrame with the label as last column
pub fn dataset_to_dataframe(dataset: &Dataset) -> Result<DataFrame> {
    let records = dataset.records();
    let mut columns: Vec<Column> = Vec::with_capacity(dataset.schema().n_features() + 1);

    for (j, spec) in dataset.schema().features().iter().enumerate() {
        let name: PlSmallStr = spec.name.clone().into();
        let series = match spec.kind {
            FeatureKind::Numeric => {
                let values: Vec<f64> = records
                    .iter()
                    .map(|r| r.values[j].as_f64().unwrap_or(f64::NAN))
                    .collect();
                Series::new(name, values)
            }
            FeatureKind::Boolean => {
                let values: Vec<bool> = records
                    .iter()
                    .map(|r| matches!(r.values[j], FeatureValue::Boolean(true)))
                    .collect();
                Series::new(name, values)
            }
            FeatureKind::Categorical | FeatureKind::List => {
                let values: Vec<String> = records.iter().map(|r| r.values[j].to_string()).collect();
                Series::new(name, values)
            }
        };
        columns.push(series.into());
    }

    let labels: Vec<i64> = records.iter().map(|r| r.label).collect();
    columns.push(Series::new(dataset.schema().label().to_string().into(), labels).into());

    Ok(DataFrame::new(columns)?)
}

/// Write a dataset as CSV with a header row
pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut df = dataset_to_dataframe(dataset)?;
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    info!(path = %path.display(), rows = dataset.len(), "Wrote dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataframe_to_dataset_moves_label_last() {
        let df = df!(
            "action_taken" => &[1i64, 0, 1],
            "income" => &[0.1, 0.2, 0.3],
            "joint" => &[true, false, true],
            "product" => &["fha", "va", "fha"]
        )
        .unwrap();

        let ds = dataframe_to_dataset(&df, "action_taken", None).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.schema().column_names(), vec!["income", "joint", "product", "action_taken"]);
        assert_eq!(ds.schema().features()[1].kind, FeatureKind::Boolean);
        assert_eq!(ds.schema().features()[2].kind, FeatureKind::Categorical);
        assert_eq!(ds.records()[0].label, 1);
    }

    #[test]
    fn test_column_selection() {
        let df = df!(
            "a" => &[1.0, 2.0],
            "b" => &[3.0, 4.0],
            "y" => &[0i64, 1]
        )
        .unwrap();
        let cols = vec!["b".to_string()];
        let ds = dataframe_to_dataset(&df, "y", Some(&cols)).unwrap();
        assert_eq!(ds.schema().n_features(), 1);
        assert_eq!(ds.records()[1].values[0], FeatureValue::Numeric(4.0));
    }

    #[test]
    fn test_rows_with_nulls_are_dropped() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "y" => &[0i64, 1, 1]
        )
        .unwrap();
        let ds = dataframe_to_dataset(&df, "y", None).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_non_integral_label_is_rejected() {
        let df = df!(
            "a" => &[1.0, 2.0],
            "y" => &[0.5, 1.0]
        )
        .unwrap();
        assert!(dataframe_to_dataset(&df, "y", None).is_err());
    }

    #[test]
    fn test_missing_label_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let err = dataframe_to_dataset(&df, "action_taken", None).unwrap_err();
        assert!(matches!(err, FairBalanceError::FeatureNotFound(_)));
    }

    #[test]
    fn test_dataset_to_dataframe_shape() {
        let ds = Dataset::from_numeric(&["x", "z"], "y", vec![(vec![1.0, 2.0], 1), (vec![3.0, 4.0], 0)]).unwrap();
        let df = dataset_to_dataframe(&ds).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        let names: Vec<String> = df.get_column_names().into_iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["x", "z", "y"]);
    }
}
