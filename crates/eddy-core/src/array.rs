//! Named data arrays and the point/cell/field attribute collections
//! that hold them.

use std::fmt;
use std::str::FromStr;

/// Name of the per-tuple ghost flag array (`u8`, nonzero = ghost).
pub const GHOST_ARRAY_NAME: &str = "vtkGhostType";

/// Where an array's tuples live on a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Association {
    /// One tuple per point (node).
    Point,
    /// One tuple per cell.
    Cell,
    /// Free-form arrays not tied to the topology.
    Field,
}

impl Association {
    /// All associations, in enumeration order.
    pub const ALL: [Association; 3] = [Self::Point, Self::Cell, Self::Field];

    /// Lowercase attribute name (`"point"`, `"cell"`, `"field"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Cell => "cell",
            Self::Field => "field",
        }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown association name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid association \"{0}\"")]
pub struct ParseAssociationError(pub String);

impl FromStr for Association {
    type Err = ParseAssociationError;

    /// Case-insensitive: `"Point"`, `"CELL"` and `"field"` are all accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "cell" => Ok(Self::Cell),
            "field" => Ok(Self::Field),
            _ => Err(ParseAssociationError(s.to_string())),
        }
    }
}

/// Typed storage backing a [`DataArray`].
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValues {
    /// 32-bit floats.
    F32(Vec<f32>),
    /// 64-bit floats.
    F64(Vec<f64>),
    /// 32-bit signed integers.
    I32(Vec<i32>),
    /// 64-bit signed integers.
    I64(Vec<i64>),
    /// Unsigned bytes (ghost flags, cell types).
    U8(Vec<u8>),
}

impl ArrayValues {
    /// Total number of scalar values (tuples × components).
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    /// Returns `true` if there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read value `i` as `f64`. Returns `None` past the end.
    #[inline]
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match self {
            Self::F32(v) => v.get(i).map(|&x| f64::from(x)),
            Self::F64(v) => v.get(i).copied(),
            Self::I32(v) => v.get(i).map(|&x| f64::from(x)),
            Self::I64(v) => v.get(i).map(|&x| x as f64),
            Self::U8(v) => v.get(i).map(|&x| f64::from(x)),
        }
    }

    /// Size in bytes of one scalar value.
    pub fn element_size(&self) -> usize {
        match self {
            Self::F32(_) | Self::I32(_) => 4,
            Self::F64(_) | Self::I64(_) => 8,
            Self::U8(_) => 1,
        }
    }

    /// VTK XML type name (`"Float32"`, `"Int64"`, ...).
    pub fn vtk_type_name(&self) -> &'static str {
        match self {
            Self::F32(_) => "Float32",
            Self::F64(_) => "Float64",
            Self::I32(_) => "Int32",
            Self::I64(_) => "Int64",
            Self::U8(_) => "UInt8",
        }
    }
}

/// A named, possibly multi-component array of values.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    name: String,
    components: u32,
    values: ArrayValues,
}

impl DataArray {
    /// Create a single-component array.
    pub fn new(name: impl Into<String>, values: ArrayValues) -> Self {
        Self::with_components(name, 1, values)
    }

    /// Create an array with `components` values per tuple.
    ///
    /// A component count of zero is treated as one.
    pub fn with_components(name: impl Into<String>, components: u32, values: ArrayValues) -> Self {
        Self {
            name: name.into(),
            components: components.max(1),
            values,
        }
    }

    /// Convenience constructor for a single-component `f64` array.
    pub fn from_f64(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ArrayValues::F64(values))
    }

    /// Build a ghost flag array from per-tuple flags.
    pub fn ghost_flags(flags: Vec<u8>) -> Self {
        Self::new(GHOST_ARRAY_NAME, ArrayValues::U8(flags))
    }

    /// Array name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values per tuple.
    pub fn components(&self) -> u32 {
        self.components
    }

    /// Number of tuples. A trailing partial tuple is not counted.
    pub fn tuples(&self) -> usize {
        self.values.len() / self.components as usize
    }

    /// Backing storage.
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }
}

/// An ordered collection of uniquely named arrays.
///
/// Insertion order is preserved; inserting an array whose name is
/// already present replaces it in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    arrays: Vec<DataArray>,
}

impl Attributes {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an array, replacing any existing array of the same name.
    pub fn insert(&mut self, array: DataArray) {
        match self.arrays.iter_mut().find(|a| a.name == array.name) {
            Some(slot) => *slot = array,
            None => self.arrays.push(array),
        }
    }

    /// Look up an array by name.
    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Returns `true` if an array with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove and return the named array.
    pub fn remove(&mut self, name: &str) -> Option<DataArray> {
        let idx = self.arrays.iter().position(|a| a.name == name)?;
        Some(self.arrays.remove(idx))
    }

    /// Number of arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Returns `true` if there are no arrays.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Iterate arrays in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, DataArray> {
        self.arrays.iter()
    }

    /// Drop every array.
    pub fn clear(&mut self) {
        self.arrays.clear();
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a DataArray;
    type IntoIter = std::slice::Iter<'a, DataArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_parses_case_insensitively() {
        assert_eq!("Point".parse::<Association>().unwrap(), Association::Point);
        assert_eq!("CELL".parse::<Association>().unwrap(), Association::Cell);
        assert_eq!("field".parse::<Association>().unwrap(), Association::Field);
        assert!("edge".parse::<Association>().is_err());
    }

    #[test]
    fn association_display_round_trips() {
        for a in Association::ALL {
            assert_eq!(a.to_string().parse::<Association>().unwrap(), a);
        }
    }

    #[test]
    fn tuples_account_for_components() {
        let a = DataArray::with_components("v", 3, ArrayValues::F32(vec![0.0; 12]));
        assert_eq!(a.tuples(), 4);
        let b = DataArray::with_components("w", 0, ArrayValues::U8(vec![1, 2]));
        assert_eq!(b.components(), 1);
    }

    #[test]
    fn get_f64_widens_every_type() {
        assert_eq!(ArrayValues::I32(vec![-3]).get_f64(0), Some(-3.0));
        assert_eq!(ArrayValues::U8(vec![7]).get_f64(0), Some(7.0));
        assert_eq!(ArrayValues::F32(vec![0.5]).get_f64(0), Some(0.5));
        assert_eq!(ArrayValues::I64(vec![1 << 40]).get_f64(0), Some((1u64 << 40) as f64));
        assert_eq!(ArrayValues::F64(vec![]).get_f64(0), None);
    }

    #[test]
    fn insert_replaces_same_name_in_place() {
        let mut attrs = Attributes::new();
        attrs.insert(DataArray::from_f64("a", vec![1.0]));
        attrs.insert(DataArray::from_f64("b", vec![2.0]));
        attrs.insert(DataArray::from_f64("a", vec![3.0]));
        let names: Vec<_> = attrs.iter().map(|a| a.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(attrs.get("a").unwrap().values().get_f64(0), Some(3.0));
    }

    #[test]
    fn remove_returns_array() {
        let mut attrs = Attributes::new();
        attrs.insert(DataArray::ghost_flags(vec![0, 1]));
        let g = attrs.remove(GHOST_ARRAY_NAME).unwrap();
        assert_eq!(g.tuples(), 2);
        assert!(attrs.is_empty());
    }
}
