//! Lenient column readers.
//!
//! Collectors publish loosely typed tables: numbers may arrive as text,
//! columns may be missing, names vary between English and Portuguese. These
//! helpers coerce everything to `Option` values; anything unreadable is `None`.

use chrono::NaiveDate;
use polars::prelude::*;

use super::TableError;

/// First column present under any of the given names.
pub fn find_column<'a>(df: &'a DataFrame, aliases: &[&str]) -> Option<&'a Column> {
    aliases.iter().find_map(|name| df.column(name).ok())
}

/// Numeric values, cast leniently; non-numeric text, NaN and infinities become `None`.
///
/// A missing column yields all-`None`.
pub fn f64_values(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<f64>>, TableError> {
    let Some(column) = find_column(df, aliases) else {
        return Ok(vec![None; df.height()]);
    };
    let cast = column.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Text values, trimmed; blank strings become `None`.
pub fn str_values(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<String>>, TableError> {
    let Some(column) = find_column(df, aliases) else {
        return Ok(vec![None; df.height()]);
    };
    let cast = column.cast(&DataType::String)?;
    let ca = cast.str()?;
    Ok(ca
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .collect())
}

/// Like [`str_values`] but the column must exist.
pub fn required_str_values(
    df: &DataFrame,
    aliases: &[&str],
) -> Result<Vec<Option<String>>, TableError> {
    if find_column(df, aliases).is_none() {
        return Err(TableError::MissingColumn(aliases.join("|")));
    }
    str_values(df, aliases)
}

/// Date values from `Date`/`Datetime` columns or ISO / Brazilian-formatted text.
pub fn date_values(df: &DataFrame, aliases: &[&str]) -> Result<Vec<Option<NaiveDate>>, TableError> {
    Ok(str_values(df, aliases)?
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_date))
        .collect())
}

/// Parse `YYYY-MM-DD[...]` or `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Some(iso) = text.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
            return Some(d);
        }
        if let Ok(d) = NaiveDate::parse_from_str(iso, "%d/%m/%Y") {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("preco".into(), vec!["10.5", "abc", ""]),
            Column::new("roe".into(), vec![Some(12.0), None, Some(f64::NAN)]),
            Column::new("setor".into(), vec![Some(" Energia "), Some("  "), None]),
        ])
        .unwrap()
    }

    #[test]
    fn numeric_text_is_coerced_and_garbage_is_missing() {
        let df = frame();
        let prices = f64_values(&df, &["price", "preco"]).unwrap();
        assert_eq!(prices, vec![Some(10.5), None, None]);
    }

    #[test]
    fn nan_is_missing() {
        let df = frame();
        assert_eq!(f64_values(&df, &["roe"]).unwrap(), vec![Some(12.0), None, None]);
    }

    #[test]
    fn absent_column_is_all_missing() {
        let df = frame();
        assert_eq!(f64_values(&df, &["beta"]).unwrap(), vec![None, None, None]);
        assert!(required_str_values(&df, &["ticker"]).is_err());
    }

    #[test]
    fn text_is_trimmed_and_blank_dropped() {
        let df = frame();
        assert_eq!(
            str_values(&df, &["setor"]).unwrap(),
            vec![Some("Energia".to_string()), None, None]
        );
    }

    #[test]
    fn parses_both_date_styles() {
        assert_eq!(parse_date("2024-03-05"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(
            parse_date("2024-03-05 00:00:00"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_date("05/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("n/a"), None);
    }
}
