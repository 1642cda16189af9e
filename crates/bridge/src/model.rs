//! Value types exchanged with document views.

use serde::{Deserialize, Serialize};

/// Viewer canvas dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
	/// Width.
	pub width: f64,
	/// Height.
	pub height: f64,
}

/// Page crop box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
	/// Left edge.
	pub x1: f64,
	/// Bottom edge.
	pub y1: f64,
	/// Right edge.
	pub x2: f64,
	/// Top edge.
	pub y2: f64,
}

impl PageBox {
	/// Box width.
	pub fn width(&self) -> f64 {
		(self.x2 - self.x1).abs()
	}

	/// Box height.
	pub fn height(&self) -> f64 {
		(self.y2 - self.y1).abs()
	}
}

/// One entry of the document outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineEntry {
	/// Display title.
	pub title: String,
	/// Target page, 1-based.
	pub page: u32,
	/// Nested entries.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<OutlineEntry>,
}

/// Full-text search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
	/// Text to find. Never empty.
	pub text: String,
	/// Match case exactly.
	pub case_sensitive: bool,
	/// Match whole words only.
	pub whole_word: bool,
}

/// One search hit, in the order the view reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
	/// Page, 1-based.
	pub page: u32,
	/// Matched text.
	pub text: String,
	/// `[x1, y1, x2, y2]` in page coordinates.
	pub bounds: [f64; 4],
}

/// Background colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
	/// Red.
	pub r: u8,
	/// Green.
	pub g: u8,
	/// Blue.
	pub b: u8,
}

/// Annotation flag names understood by `setFlagsForAnnotations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum AnnotationFlagKind {
	Hidden,
	Invisible,
	Locked,
	LockedContents,
	NoRotate,
	NoView,
	NoZoom,
	Print,
	ReadOnly,
	ToggleNoView,
}

/// One flag change for one annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnnotationFlag {
	/// Annotation identifier.
	pub id: String,
	/// Page holding the annotation, 1-based.
	pub page_number: u32,
	/// Flag to change.
	pub flag: AnnotationFlagKind,
	/// New flag value.
	pub flag_value: bool,
}

/// Form field flags understood by `setFlagForFields`, by wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFlag {
	/// Code 0.
	ReadOnly,
	/// Code 1.
	Required,
}

impl FieldFlag {
	/// Decodes a wire code.
	pub fn from_code(code: i64) -> Option<Self> {
		match code {
			0 => Some(Self::ReadOnly),
			1 => Some(Self::Required),
			_ => None,
		}
	}
}
