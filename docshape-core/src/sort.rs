//! Sort specifications.

use bson::{Bson, Document};

use crate::{
    convert::Converter,
    error::{ConversionError, ConversionResult},
    host::HostValue,
    reader,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The driver's numeric form of this direction.
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One key of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Renders sort keys as a driver sort document, `{field: 1 | -1}` in key order.
pub fn render_sort(sorts: &[Sort]) -> Document {
    sorts
        .iter()
        .map(|sort| (sort.field.clone(), Bson::Int32(sort.direction.as_i32())))
        .collect()
}

impl<'f> Converter<'f> {
    /// Derives a multi-key sort from a host value.
    ///
    /// Elements are either field names (ascending) or single-entry mappings of a field
    /// name to a flag, ascending when the flag is truthy and descending otherwise. Keys
    /// keep the order of the elements. Null or an empty sequence is an empty sort; a lone
    /// field name or mapping is read as a one-element sequence.
    pub fn sort_spec(&self, value: &HostValue) -> ConversionResult<Vec<Sort>> {
        if value.is_null() {
            return Ok(Vec::new());
        }

        let mut sorts = Vec::new();
        match value {
            HostValue::Seq(items) => {
                for item in items {
                    sort_entry(item, &mut sorts)?;
                }
            }
            HostValue::Array(view) => {
                for item in view.values()? {
                    sort_entry(&item, &mut sorts)?;
                }
            }
            HostValue::Bson(Bson::Array(items)) => {
                for item in items {
                    sort_entry(&reader::from_bson(item), &mut sorts)?;
                }
            }
            single => sort_entry(single, &mut sorts)?,
        }
        Ok(sorts)
    }
}

fn sort_entry(entry: &HostValue, sorts: &mut Vec<Sort>) -> ConversionResult<()> {
    let keyed = |field: String, flag: &HostValue| Sort {
        direction: if flag.is_truthy() {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        },
        field,
    };

    match entry {
        HostValue::String(field) | HostValue::Bson(Bson::String(field)) => {
            sorts.push(Sort::asc(field.clone()));
        }
        HostValue::Map(map) => {
            single_key(map.len())?;
            for (key, flag) in map.iter() {
                let field = key
                    .as_str()
                    .filter(|field| !field.is_empty())
                    .ok_or_else(|| ConversionError::InvalidKeyType(key.type_name()))?;
                sorts.push(keyed(field.to_string(), flag));
            }
        }
        HostValue::Document(view) => {
            let entries = view.entries()?;
            single_key(entries.len())?;
            for (field, flag) in entries {
                sorts.push(keyed(field, &flag));
            }
        }
        HostValue::Bson(Bson::Document(document)) => {
            single_key(document.len())?;
            for (field, flag) in document {
                sorts.push(keyed(field.clone(), &reader::from_bson(flag)));
            }
        }
        other => return Err(ConversionError::InvalidSortObject(other.type_name())),
    }
    Ok(())
}

/// Keyed sort entries name exactly one field.
fn single_key(len: usize) -> ConversionResult<()> {
    if len == 1 {
        Ok(())
    } else {
        Err(ConversionError::InvalidSortObject(format!("mapping with {len} keys")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostMap;
    use bson::doc;

    #[test]
    fn test_names_and_flags_in_order() {
        let value: HostValue = vec![
            HostValue::from("a"),
            HostMap::new().with("b", false).into(),
            HostMap::new().with("c", 1).into(),
        ]
        .into();

        let sorts = Converter::new().sort_spec(&value).unwrap();
        assert_eq!(sorts, vec![Sort::asc("a"), Sort::desc("b"), Sort::asc("c")]);
        assert_eq!(render_sort(&sorts), doc! { "a": 1, "b": -1, "c": 1 });
    }

    #[test]
    fn test_null_and_empty_are_no_op() {
        let converter = Converter::new();
        assert!(converter.sort_spec(&HostValue::Null).unwrap().is_empty());
        assert!(converter.sort_spec(&HostValue::Seq(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn test_zero_flag_is_descending() {
        let value: HostValue = vec![
            HostMap::new().with("n", 0).into(),
            HostMap::new().with("m", -1).into(),
        ]
        .into();
        assert_eq!(
            Converter::new().sort_spec(&value).unwrap(),
            vec![Sort::desc("n"), Sort::asc("m")]
        );
    }

    #[test]
    fn test_mapping_must_name_one_field() {
        let converter = Converter::new();

        let two_keys = HostValue::from(HostMap::new().with("n", 1).with("m", -1));
        assert_eq!(
            converter.sort_spec(&two_keys).unwrap_err(),
            ConversionError::InvalidSortObject("mapping with 2 keys".to_string())
        );

        let empty: HostValue = vec![HostValue::Bson(Bson::Document(doc! {}))].into();
        assert_eq!(
            converter.sort_spec(&empty).unwrap_err(),
            ConversionError::InvalidSortObject("mapping with 0 keys".to_string())
        );

        let document = HostValue::Bson(Bson::Document(doc! { "n": -1 }));
        assert_eq!(converter.sort_spec(&document).unwrap(), vec![Sort::desc("n")]);
    }

    #[test]
    fn test_single_name() {
        assert_eq!(Converter::new().sort_spec(&"a".into()).unwrap(), vec![Sort::asc("a")]);
    }

    #[test]
    fn test_invalid_entries() {
        let converter = Converter::new();
        let value: HostValue = vec![HostValue::from("a"), HostValue::from(3)].into();
        assert_eq!(
            converter.sort_spec(&value).unwrap_err(),
            ConversionError::InvalidSortObject("Int32".to_string())
        );

        let keyed_by_number = HostValue::from(HostMap::new().with(1, true));
        assert!(matches!(
            converter.sort_spec(&keyed_by_number),
            Err(ConversionError::InvalidKeyType(_))
        ));
    }
}
