//! Operation catalogue: wire names, structural argument validation and invocation.
//!
//! Validation happens on the calling thread before anything is queued, so a
//! malformed command fails fast without touching the registry. Parsing checks
//! shape only (arity, JSON types, integer ranges, non-empty identifiers); it
//! never asks the view anything.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use vellum_worker::CancelToken;

use crate::error::{BridgeError, Result};
use crate::model::{AnnotationFlag, FieldFlag, Rgb, SearchQuery};
use crate::view::{DocumentView, ViewError, ViewResult};

/// Wire names of every supported operation.
pub const OPERATION_NAMES: &[&str] = &[
	"getPageCount",
	"currentPage",
	"setCurrentPage",
	"jumpTo",
	"getZoom",
	"getDimensions",
	"getPageCropBox",
	"rotate",
	"toggleSlider",
	"setContinuous",
	"changeBackground",
	"getDocumentPath",
	"saveDocument",
	"importBookmarkJson",
	"importAnnotations",
	"importAnnotationCommand",
	"exportAnnotations",
	"flattenAnnotations",
	"deleteAnnotations",
	"selectAnnotation",
	"setPropertiesForAnnotation",
	"setFlagsForAnnotations",
	"setFlagForFields",
	"setValuesForFields",
	"setToolMode",
	"commitTool",
	"handleBackButton",
	"closeAllTabs",
	"getOutline",
	"findText",
	"findTextResult",
	"cancelFindText",
	"search",
	"clearSearch",
	"getThumbnail",
	"appendSchoolLogo",
	"addBookmark",
	"canExitViewer",
	"setColorMode",
	"showSettings",
];

/// Label used for diagnostics when the operation name itself is unknown.
pub(crate) const UNKNOWN_OPERATION: &str = "<unknown>";

/// Returns the static wire name matching `name`, if it is a known operation.
pub fn canonical_name(name: &str) -> Option<&'static str> {
	OPERATION_NAMES.iter().copied().find(|known| *known == name)
}

/// A validated operation with typed arguments.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Operation {
	GetPageCount,
	CurrentPage,
	SetCurrentPage { page: u32 },
	JumpTo { page: u32 },
	GetZoom,
	GetDimensions,
	GetPageCropBox { page: u32 },
	Rotate { counter_clockwise: bool },
	ToggleSlider { visible: bool },
	SetContinuous { enabled: bool },
	ChangeBackground { color: Rgb },
	GetDocumentPath,
	SaveDocument,
	ImportBookmarkJson { json: String },
	ImportAnnotations { xfdf: String },
	ImportAnnotationCommand { command: String, initial_load: bool },
	ExportAnnotations { options: Map<String, Value> },
	FlattenAnnotations { forms_only: bool },
	DeleteAnnotations { ids: Vec<String> },
	SelectAnnotation { id: String, page: u32 },
	SetPropertiesForAnnotation { id: String, page: u32, properties: Map<String, Value> },
	SetFlagsForAnnotations { flags: Vec<AnnotationFlag> },
	SetFlagForFields { fields: Vec<String>, flag: FieldFlag, value: bool },
	SetValuesForFields { values: Map<String, Value> },
	SetToolMode { tool: String },
	CommitTool,
	HandleBackButton,
	CloseAllTabs,
	GetOutline,
	FindText { query: String },
	FindTextResult { next: bool },
	CancelFindText,
	Search { query: SearchQuery },
	ClearSearch,
	GetThumbnail { page: u32 },
	AppendSchoolLogo { image: Vec<u8>, duplex: bool },
	AddBookmark,
	CanExitViewer,
	SetColorMode { mode: String },
	ShowSettings,
}

impl Operation {
	/// Parses and validates a wire command.
	pub fn parse(name: &str, args: &[Value]) -> Result<Self> {
		let Some(name) = canonical_name(name) else {
			return Err(BridgeError::invalid(format!("unknown operation `{name}`")));
		};
		let args = Args { op: name, values: args };

		let op = match name {
			"getPageCount" => args.none(Self::GetPageCount)?,
			"currentPage" => args.none(Self::CurrentPage)?,
			"setCurrentPage" => {
				args.arity(1)?;
				Self::SetCurrentPage { page: args.page(0)? }
			}
			"jumpTo" => {
				args.arity(1)?;
				Self::JumpTo { page: args.page(0)? }
			}
			"getZoom" => args.none(Self::GetZoom)?,
			"getDimensions" => args.none(Self::GetDimensions)?,
			"getPageCropBox" => {
				args.arity(1)?;
				Self::GetPageCropBox { page: args.page(0)? }
			}
			"rotate" => {
				args.arity(1)?;
				Self::Rotate {
					counter_clockwise: args.bool(0)?,
				}
			}
			"toggleSlider" => {
				args.arity(1)?;
				Self::ToggleSlider { visible: args.bool(0)? }
			}
			"setContinuous" => {
				args.arity(1)?;
				Self::SetContinuous { enabled: args.bool(0)? }
			}
			"changeBackground" => {
				args.arity(3)?;
				Self::ChangeBackground {
					color: Rgb {
						r: args.channel(0)?,
						g: args.channel(1)?,
						b: args.channel(2)?,
					},
				}
			}
			"getDocumentPath" => args.none(Self::GetDocumentPath)?,
			"saveDocument" => args.none(Self::SaveDocument)?,
			"importBookmarkJson" => {
				args.arity(1)?;
				Self::ImportBookmarkJson { json: args.string(0)? }
			}
			"importAnnotations" => {
				args.arity(1)?;
				Self::ImportAnnotations { xfdf: args.string(0)? }
			}
			"importAnnotationCommand" => {
				args.arity(2)?;
				Self::ImportAnnotationCommand {
					command: args.string(0)?,
					initial_load: args.bool(1)?,
				}
			}
			"exportAnnotations" => {
				args.arity(1)?;
				Self::ExportAnnotations { options: args.map(0)? }
			}
			"flattenAnnotations" => {
				args.arity(1)?;
				Self::FlattenAnnotations { forms_only: args.bool(0)? }
			}
			"deleteAnnotations" => {
				args.arity(1)?;
				Self::DeleteAnnotations { ids: args.identifiers(0)? }
			}
			"selectAnnotation" => {
				args.arity(2)?;
				Self::SelectAnnotation {
					id: args.identifier(0)?,
					page: args.page(1)?,
				}
			}
			"setPropertiesForAnnotation" => {
				args.arity(3)?;
				Self::SetPropertiesForAnnotation {
					id: args.identifier(0)?,
					page: args.page(1)?,
					properties: args.map(2)?,
				}
			}
			"setFlagsForAnnotations" => {
				args.arity(1)?;
				Self::SetFlagsForAnnotations {
					flags: args.annotation_flags(0)?,
				}
			}
			"setFlagForFields" => {
				args.arity(3)?;
				Self::SetFlagForFields {
					fields: args.identifiers(0)?,
					flag: args.field_flag(1)?,
					value: args.bool(2)?,
				}
			}
			"setValuesForFields" => {
				args.arity(1)?;
				Self::SetValuesForFields { values: args.map(0)? }
			}
			"setToolMode" => {
				args.arity(1)?;
				Self::SetToolMode { tool: args.identifier(0)? }
			}
			"commitTool" => args.none(Self::CommitTool)?,
			"handleBackButton" => args.none(Self::HandleBackButton)?,
			"closeAllTabs" => args.none(Self::CloseAllTabs)?,
			"getOutline" => args.none(Self::GetOutline)?,
			"findText" => {
				args.arity(1)?;
				Self::FindText { query: args.identifier(0)? }
			}
			"findTextResult" => {
				args.arity(1)?;
				Self::FindTextResult { next: args.bool(0)? }
			}
			"cancelFindText" => args.none(Self::CancelFindText)?,
			"search" => {
				args.arity(3)?;
				Self::Search {
					query: SearchQuery {
						text: args.identifier(0)?,
						case_sensitive: args.bool(1)?,
						whole_word: args.bool(2)?,
					},
				}
			}
			"clearSearch" => args.none(Self::ClearSearch)?,
			"getThumbnail" => {
				args.arity(1)?;
				Self::GetThumbnail { page: args.page(0)? }
			}
			"appendSchoolLogo" => {
				args.arity(2)?;
				Self::AppendSchoolLogo {
					image: args.base64(0)?,
					duplex: args.bool(1)?,
				}
			}
			"addBookmark" => args.none(Self::AddBookmark)?,
			"canExitViewer" => args.none(Self::CanExitViewer)?,
			"setColorMode" => {
				args.arity(1)?;
				Self::SetColorMode { mode: args.identifier(0)? }
			}
			"showSettings" => args.none(Self::ShowSettings)?,
			other => return Err(BridgeError::invalid(format!("unknown operation `{other}`"))),
		};
		Ok(op)
	}

	/// Wire name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::GetPageCount => "getPageCount",
			Self::CurrentPage => "currentPage",
			Self::SetCurrentPage { .. } => "setCurrentPage",
			Self::JumpTo { .. } => "jumpTo",
			Self::GetZoom => "getZoom",
			Self::GetDimensions => "getDimensions",
			Self::GetPageCropBox { .. } => "getPageCropBox",
			Self::Rotate { .. } => "rotate",
			Self::ToggleSlider { .. } => "toggleSlider",
			Self::SetContinuous { .. } => "setContinuous",
			Self::ChangeBackground { .. } => "changeBackground",
			Self::GetDocumentPath => "getDocumentPath",
			Self::SaveDocument => "saveDocument",
			Self::ImportBookmarkJson { .. } => "importBookmarkJson",
			Self::ImportAnnotations { .. } => "importAnnotations",
			Self::ImportAnnotationCommand { .. } => "importAnnotationCommand",
			Self::ExportAnnotations { .. } => "exportAnnotations",
			Self::FlattenAnnotations { .. } => "flattenAnnotations",
			Self::DeleteAnnotations { .. } => "deleteAnnotations",
			Self::SelectAnnotation { .. } => "selectAnnotation",
			Self::SetPropertiesForAnnotation { .. } => "setPropertiesForAnnotation",
			Self::SetFlagsForAnnotations { .. } => "setFlagsForAnnotations",
			Self::SetFlagForFields { .. } => "setFlagForFields",
			Self::SetValuesForFields { .. } => "setValuesForFields",
			Self::SetToolMode { .. } => "setToolMode",
			Self::CommitTool => "commitTool",
			Self::HandleBackButton => "handleBackButton",
			Self::CloseAllTabs => "closeAllTabs",
			Self::GetOutline => "getOutline",
			Self::FindText { .. } => "findText",
			Self::FindTextResult { .. } => "findTextResult",
			Self::CancelFindText => "cancelFindText",
			Self::Search { .. } => "search",
			Self::ClearSearch => "clearSearch",
			Self::GetThumbnail { .. } => "getThumbnail",
			Self::AppendSchoolLogo { .. } => "appendSchoolLogo",
			Self::AddBookmark => "addBookmark",
			Self::CanExitViewer => "canExitViewer",
			Self::SetColorMode { .. } => "setColorMode",
			Self::ShowSettings => "showSettings",
		}
	}

	/// Returns true for long-running operations that observe a cancel token.
	pub fn is_cancellable(&self) -> bool {
		matches!(self, Self::Search { .. } | Self::GetThumbnail { .. })
	}

	/// Invokes the operation on `view` and encodes the result.
	///
	/// Operations without a meaningful result encode as `null`.
	pub(crate) fn invoke(&self, view: &dyn DocumentView, cancel: &CancelToken) -> ViewResult<Value> {
		let value = match self {
			Self::GetPageCount => json!(view.page_count()?),
			Self::CurrentPage => json!(view.current_page()?),
			Self::SetCurrentPage { page } => json!(view.set_current_page(*page)?),
			Self::JumpTo { page } => unit(view.jump_to(*page))?,
			Self::GetZoom => json!(view.zoom()?),
			Self::GetDimensions => encode(&view.dimensions()?)?,
			Self::GetPageCropBox { page } => {
				let crop = view.page_crop_box(*page)?;
				json!({
					"x1": crop.x1,
					"y1": crop.y1,
					"x2": crop.x2,
					"y2": crop.y2,
					"width": crop.width(),
					"height": crop.height(),
				})
			}
			Self::Rotate { counter_clockwise } => unit(view.rotate(*counter_clockwise))?,
			Self::ToggleSlider { visible } => unit(view.toggle_slider(*visible))?,
			Self::SetContinuous { enabled } => unit(view.set_continuous(*enabled))?,
			Self::ChangeBackground { color } => unit(view.change_background(*color))?,
			Self::GetDocumentPath => json!(view.document_path()?),
			Self::SaveDocument => json!(view.save_document()?),
			Self::ImportBookmarkJson { json } => unit(view.import_bookmark_json(json))?,
			Self::ImportAnnotations { xfdf } => unit(view.import_annotations(xfdf))?,
			Self::ImportAnnotationCommand { command, initial_load } => unit(view.import_annotation_command(command, *initial_load))?,
			Self::ExportAnnotations { options } => json!(view.export_annotations(options)?),
			Self::FlattenAnnotations { forms_only } => unit(view.flatten_annotations(*forms_only))?,
			Self::DeleteAnnotations { ids } => unit(view.delete_annotations(ids))?,
			Self::SelectAnnotation { id, page } => unit(view.select_annotation(id, *page))?,
			Self::SetPropertiesForAnnotation { id, page, properties } => unit(view.set_properties_for_annotation(id, *page, properties))?,
			Self::SetFlagsForAnnotations { flags } => unit(view.set_flags_for_annotations(flags))?,
			Self::SetFlagForFields { fields, flag, value } => unit(view.set_flag_for_fields(fields, *flag, *value))?,
			Self::SetValuesForFields { values } => unit(view.set_values_for_fields(values))?,
			Self::SetToolMode { tool } => unit(view.set_tool_mode(tool))?,
			Self::CommitTool => json!(view.commit_tool()?),
			Self::HandleBackButton => json!(view.handle_back_button()?),
			Self::CloseAllTabs => unit(view.close_all_tabs())?,
			Self::GetOutline => encode(&view.outline()?)?,
			Self::FindText { query } => unit(view.find_text(query))?,
			Self::FindTextResult { next } => unit(view.find_text_result(*next))?,
			Self::CancelFindText => unit(view.cancel_find_text())?,
			Self::Search { query } => encode(&view.search(query, cancel)?)?,
			Self::ClearSearch => unit(view.clear_search())?,
			Self::GetThumbnail { page } => Value::String(BASE64_STANDARD.encode(view.thumbnail(*page, cancel)?)),
			Self::AppendSchoolLogo { image, duplex } => unit(view.append_school_logo(image, *duplex))?,
			Self::AddBookmark => unit(view.add_bookmark())?,
			Self::CanExitViewer => json!(view.can_exit_viewer()?),
			Self::SetColorMode { mode } => unit(view.set_color_mode(mode))?,
			Self::ShowSettings => unit(view.show_settings())?,
		};
		Ok(value)
	}
}

fn unit(result: ViewResult<()>) -> ViewResult<Value> {
	result.map(|()| Value::Null)
}

fn encode<T: serde::Serialize>(value: &T) -> ViewResult<Value> {
	serde_json::to_value(value).map_err(|err| ViewError::failed("encode", err.to_string()))
}

/// Positional argument reader for one operation.
struct Args<'a> {
	op: &'static str,
	values: &'a [Value],
}

impl Args<'_> {
	fn none(&self, op: Operation) -> Result<Operation> {
		self.arity(0)?;
		Ok(op)
	}

	fn arity(&self, expected: usize) -> Result<()> {
		if self.values.len() == expected {
			return Ok(());
		}
		Err(BridgeError::invalid(format!(
			"{} expects {expected} argument(s), got {}",
			self.op,
			self.values.len()
		)))
	}

	fn error(&self, index: usize, expected: &str) -> BridgeError {
		BridgeError::invalid(format!("{} argument {index}: expected {expected}", self.op))
	}

	fn bool(&self, index: usize) -> Result<bool> {
		self.values[index].as_bool().ok_or_else(|| self.error(index, "boolean"))
	}

	fn int(&self, index: usize) -> Result<i64> {
		self.values[index].as_i64().ok_or_else(|| self.error(index, "integer"))
	}

	fn page(&self, index: usize) -> Result<u32> {
		u32::try_from(self.int(index)?)
			.ok()
			.filter(|page| *page >= 1)
			.ok_or_else(|| self.error(index, "page number >= 1"))
	}

	fn channel(&self, index: usize) -> Result<u8> {
		u8::try_from(self.int(index)?).map_err(|_| self.error(index, "colour channel 0-255"))
	}

	fn field_flag(&self, index: usize) -> Result<FieldFlag> {
		FieldFlag::from_code(self.int(index)?).ok_or_else(|| self.error(index, "field flag code"))
	}

	fn string(&self, index: usize) -> Result<String> {
		self.values[index]
			.as_str()
			.map(str::to_owned)
			.ok_or_else(|| self.error(index, "string"))
	}

	fn identifier(&self, index: usize) -> Result<String> {
		let value = self.string(index)?;
		if value.is_empty() {
			return Err(self.error(index, "non-empty string"));
		}
		Ok(value)
	}

	fn base64(&self, index: usize) -> Result<Vec<u8>> {
		let encoded = self.identifier(index)?;
		BASE64_STANDARD
			.decode(encoded.as_bytes())
			.map_err(|_| self.error(index, "base64 image data"))
	}

	fn identifiers(&self, index: usize) -> Result<Vec<String>> {
		let items = self.values[index].as_array().ok_or_else(|| self.error(index, "array of strings"))?;
		items
			.iter()
			.map(|item| match item.as_str() {
				Some(id) if !id.is_empty() => Ok(id.to_owned()),
				_ => Err(self.error(index, "array of non-empty strings")),
			})
			.collect()
	}

	fn map(&self, index: usize) -> Result<Map<String, Value>> {
		self.values[index].as_object().cloned().ok_or_else(|| self.error(index, "object"))
	}

	fn annotation_flags(&self, index: usize) -> Result<Vec<AnnotationFlag>> {
		let flags: Vec<AnnotationFlag> = self.decode(index)?;
		if flags.iter().any(|flag| flag.page_number == 0 || flag.id.is_empty()) {
			return Err(self.error(index, "flags with non-empty id and pageNumber >= 1"));
		}
		Ok(flags)
	}

	fn decode<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
		serde_json::from_value(self.values[index].clone())
			.map_err(|err| BridgeError::invalid(format!("{} argument {index}: {err}", self.op)))
	}
}

#[cfg(test)]
mod tests;
