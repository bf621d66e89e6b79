//! Binsparse metadata codec
//!
//! Builds and parses the versioned JSON document that describes a stored
//! matrix. The document is a JSON object whose `binsparse` key holds the
//! [`Descriptor`]; every other top-level key is an opaque user extension and
//! is preserved verbatim.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::format::constants::{arrays, METADATA_KEY, SUPPORTED_VERSION, VERSION};
use crate::format::{DataType, MatrixFormat, Structure, ValueLabel};
use crate::traits::MatrixView;
use crate::validation::parse_version;
use crate::{BinsparseError, Result};

/// Contents of the `binsparse` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub version: String,
    pub format: String,
    pub shape: Vec<u64>,
    pub number_of_stored_values: u64,
    pub data_types: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
}

/// A complete metadata document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse a serialized document; the root must be a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| BinsparseError::schema(format!("metadata is not valid JSON: {e}")))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(BinsparseError::schema(format!(
                "metadata root must be an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Serialize with two-space indentation
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.0)
            .map_err(|e| BinsparseError::schema(format!("cannot serialize metadata: {e}")))
    }

    /// Typed access to the `binsparse` key
    pub fn binsparse(&self) -> Result<Descriptor> {
        let value = self
            .0
            .get(METADATA_KEY)
            .ok_or_else(|| BinsparseError::schema(format!("missing '{METADATA_KEY}' key")))?;
        Descriptor::deserialize(value)
            .map_err(|e| BinsparseError::schema(format!("invalid '{METADATA_KEY}' object: {e}")))
    }

    /// User extension keys, in key order
    pub fn extensions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(k, _)| k.as_str() != METADATA_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Fail with `UnsupportedVersion` when the document is newer than this
    /// implementation understands.
    pub fn check_version(&self) -> Result<()> {
        let version = self
            .0
            .get(METADATA_KEY)
            .and_then(|b| b.get("version"))
            .and_then(Value::as_str)
            .ok_or_else(|| BinsparseError::schema("missing string 'version'"))?;
        check_version(version)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fail with `UnsupportedVersion` when `version` is newer than supported
pub fn check_version(version: &str) -> Result<()> {
    let (major, minor, _) = parse_version(version)?;
    if (major, minor) > SUPPORTED_VERSION {
        return Err(BinsparseError::UnsupportedVersion {
            found: version.to_string(),
            supported: VERSION,
        });
    }
    Ok(())
}

/// Build the metadata document for a view.
///
/// The value label is wrapped as `iso[<label>]` exactly when the view is iso.
/// `structure` is omitted for general matrices. `user_keys` are merged last at
/// the top level and may overwrite anything, `binsparse` included.
pub fn encode<V: MatrixView + ?Sized>(view: &V, user_keys: &Map<String, Value>) -> Result<Document> {
    view.validate()?;

    let format = view.format();
    let mut data_types = BTreeMap::new();
    for name in format.array_names() {
        let label = if *name == arrays::VALUES {
            ValueLabel::new(view.value_type(), view.is_iso()).to_label()
        } else {
            let index_type = view.index_type().ok_or_else(|| {
                BinsparseError::invalid_argument(format!("{format} view has no index type"))
            })?;
            index_type.label().to_string()
        };
        data_types.insert(name.to_string(), label);
    }

    let descriptor = Descriptor {
        version: VERSION.to_string(),
        format: format.tag().to_string(),
        shape: view.shape(),
        number_of_stored_values: view.nnz() as u64,
        data_types,
        structure: view.structure().name().map(ToString::to_string),
    };

    let descriptor = serde_json::to_value(&descriptor)
        .map_err(|e| BinsparseError::schema(format!("cannot serialize descriptor: {e}")))?;

    let mut map = Map::new();
    map.insert(METADATA_KEY.to_string(), descriptor);
    for (key, value) in user_keys {
        map.insert(key.clone(), value.clone());
    }
    Ok(Document(map))
}

/// Everything a reader needs from a validated document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    pub version: String,
    /// Format as stored, after alias resolution
    pub format: MatrixFormat,
    pub nrows: usize,
    /// 1 for dense vectors
    pub ncols: usize,
    pub nnz: usize,
    pub is_iso: bool,
    pub structure: Structure,
    pub value_type: DataType,
    /// `None` for dense formats
    pub index_type: Option<DataType>,
    /// Element type of every stored array
    pub data_types: BTreeMap<String, DataType>,
}

impl DecodedHeader {
    /// Length the named array must have on disk or in the heap
    pub fn expected_len(&self, array: &str) -> Option<usize> {
        match array {
            arrays::VALUES if self.is_iso => Some(1),
            arrays::VALUES => Some(self.nnz),
            arrays::INDICES_0 | arrays::INDICES_1 if !self.format.is_dense() => Some(self.nnz),
            arrays::POINTERS_TO_1 => match self.format {
                MatrixFormat::Csr => Some(self.nrows + 1),
                MatrixFormat::Csc => Some(self.ncols + 1),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn shape(&self) -> Vec<u64> {
        if self.format == MatrixFormat::Dvec {
            alloc::vec![self.nrows as u64]
        } else {
            alloc::vec![self.nrows as u64, self.ncols as u64]
        }
    }
}

fn to_usize(field: &str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        BinsparseError::schema(format!("{field} {value} does not fit this platform"))
    })
}

/// Parse and validate a document against the format the caller expects.
///
/// Aliases are resolved before comparison; COOR/COOC and DMATR/DMATC are
/// accepted for one another and the stored variant is reported.
pub fn decode(doc: &Document, expected: MatrixFormat) -> Result<DecodedHeader> {
    let descriptor = doc.binsparse()?;
    check_version(&descriptor.version)?;

    let format = match MatrixFormat::from_tag(&descriptor.format) {
        Some(format) if format.same_family(expected) => format,
        _ => {
            return Err(BinsparseError::format_mismatch(
                expected.tag(),
                descriptor.format.as_str(),
            ))
        }
    };

    let (nrows, ncols) = match (format, descriptor.shape.as_slice()) {
        (MatrixFormat::Dvec, [len]) => (to_usize("shape", *len)?, 1),
        (MatrixFormat::Dvec, _) => {
            return Err(BinsparseError::schema(format!(
                "DVEC shape must have 1 entry, found {}",
                descriptor.shape.len()
            )))
        }
        (_, [rows, cols]) => (to_usize("shape", *rows)?, to_usize("shape", *cols)?),
        (_, _) => {
            return Err(BinsparseError::schema(format!(
                "{format} shape must have 2 entries, found {}",
                descriptor.shape.len()
            )))
        }
    };

    let nnz = to_usize("number_of_stored_values", descriptor.number_of_stored_values)?;
    let capacity = nrows as u128 * ncols as u128;
    if format.is_dense() && nnz as u128 != capacity {
        return Err(BinsparseError::schema(format!(
            "dense {format} with shape {:?} must store {capacity} values, declares {nnz}",
            descriptor.shape
        )));
    }
    if nnz as u128 > capacity {
        return Err(BinsparseError::schema(format!(
            "{nnz} stored values exceed shape {:?}",
            descriptor.shape
        )));
    }

    // "general" is never written but other writers may spell it out
    let structure = match descriptor.structure.as_deref() {
        None | Some("general") => Structure::General,
        Some(name) => Structure::from_name(name)
            .ok_or_else(|| BinsparseError::schema(format!("unknown structure '{name}'")))?,
    };
    if !structure.is_general() && nrows != ncols {
        return Err(BinsparseError::schema(format!(
            "structure '{}' declared for non-square shape {:?}",
            descriptor.structure.as_deref().unwrap_or_default(),
            descriptor.shape
        )));
    }

    let mut data_types = BTreeMap::new();
    let mut value_label = None;
    for name in format.array_names() {
        let label = descriptor.data_types.get(*name).ok_or_else(|| {
            BinsparseError::schema(format!("data_types has no entry for '{name}'"))
        })?;
        let data_type = if *name == arrays::VALUES {
            let parsed = ValueLabel::parse(label)?;
            value_label = Some(parsed);
            parsed.data_type
        } else {
            DataType::from_label(label)?
        };
        data_types.insert(name.to_string(), data_type);
    }
    let value_label =
        value_label.ok_or_else(|| BinsparseError::schema("data_types has no entry for 'values'"))?;

    let index_type = data_types.get(arrays::INDICES_1).copied();

    Ok(DecodedHeader {
        version: descriptor.version,
        format,
        nrows,
        ncols,
        nnz,
        is_iso: value_label.is_iso,
        structure,
        value_type: value_label.data_type,
        index_type,
        data_types,
    })
}
