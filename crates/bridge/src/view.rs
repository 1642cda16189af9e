//! The document view seam and the non-owning handle the registry keeps.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use vellum_worker::CancelToken;

use crate::error::BridgeError;
use crate::model::{AnnotationFlag, Dimensions, FieldFlag, OutlineEntry, PageBox, Rgb, SearchMatch, SearchQuery};

/// Failure reported by a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
	/// The operation failed; code and message are forwarded to the caller verbatim.
	#[error("{code}: {message}")]
	Failed {
		/// View-defined code.
		code: String,
		/// View-defined message.
		message: String,
	},
	/// The view observed its cancel token and abandoned the operation.
	#[error("stopped")]
	Stopped,
}

impl ViewError {
	/// Builds a [`ViewError::Failed`].
	pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Failed {
			code: code.into(),
			message: message.into(),
		}
	}

	/// Failure for an operation the view does not implement.
	pub fn unsupported(operation: &str) -> Self {
		Self::failed("unsupported", format!("{operation} is not supported by this view"))
	}
}

impl From<ViewError> for BridgeError {
	fn from(err: ViewError) -> Self {
		match err {
			ViewError::Failed { code, message } => Self::OperationFailed { code, message },
			ViewError::Stopped => Self::Cancelled,
		}
	}
}

/// Result of one view operation.
pub type ViewResult<T> = std::result::Result<T, ViewError>;

/// External result routed to every attached view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
	/// Host request code the result answers.
	pub request_code: i32,
	/// Host result code.
	pub result_code: i32,
	/// Opaque payload.
	#[serde(default)]
	pub payload: Value,
}

/// A stateful document viewer instance.
///
/// Implementations are owned by the UI layer and shared with the bridge only
/// through a [`ViewHandle`]. Every method is invoked on the dispatcher's
/// affinity thread, one call at a time. Operations a view does not support keep
/// the default body, which fails with [`ViewError::unsupported`].
///
/// Pages are 1-based throughout.
#[allow(unused_variables)]
pub trait DocumentView: Send + Sync {
	/// `getPageCount`
	fn page_count(&self) -> ViewResult<u32> {
		Err(ViewError::unsupported("getPageCount"))
	}

	/// `currentPage`
	fn current_page(&self) -> ViewResult<u32> {
		Err(ViewError::unsupported("currentPage"))
	}

	/// `setCurrentPage`. Returns whether the page changed.
	fn set_current_page(&self, page: u32) -> ViewResult<bool> {
		Err(ViewError::unsupported("setCurrentPage"))
	}

	/// `jumpTo`
	fn jump_to(&self, page: u32) -> ViewResult<()> {
		Err(ViewError::unsupported("jumpTo"))
	}

	/// `getZoom`
	fn zoom(&self) -> ViewResult<f64> {
		Err(ViewError::unsupported("getZoom"))
	}

	/// `getDimensions`
	fn dimensions(&self) -> ViewResult<Dimensions> {
		Err(ViewError::unsupported("getDimensions"))
	}

	/// `getPageCropBox`
	fn page_crop_box(&self, page: u32) -> ViewResult<PageBox> {
		Err(ViewError::unsupported("getPageCropBox"))
	}

	/// `rotate`
	fn rotate(&self, counter_clockwise: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("rotate"))
	}

	/// `toggleSlider`
	fn toggle_slider(&self, visible: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("toggleSlider"))
	}

	/// `setContinuous`
	fn set_continuous(&self, enabled: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("setContinuous"))
	}

	/// `changeBackground`
	fn change_background(&self, color: Rgb) -> ViewResult<()> {
		Err(ViewError::unsupported("changeBackground"))
	}

	/// `getDocumentPath`
	fn document_path(&self) -> ViewResult<String> {
		Err(ViewError::unsupported("getDocumentPath"))
	}

	/// `saveDocument`. Returns the saved path.
	fn save_document(&self) -> ViewResult<String> {
		Err(ViewError::unsupported("saveDocument"))
	}

	/// `importBookmarkJson`
	fn import_bookmark_json(&self, json: &str) -> ViewResult<()> {
		Err(ViewError::unsupported("importBookmarkJson"))
	}

	/// `importAnnotations`
	fn import_annotations(&self, xfdf: &str) -> ViewResult<()> {
		Err(ViewError::unsupported("importAnnotations"))
	}

	/// `importAnnotationCommand`
	fn import_annotation_command(&self, command: &str, initial_load: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("importAnnotationCommand"))
	}

	/// `exportAnnotations`
	fn export_annotations(&self, options: &Map<String, Value>) -> ViewResult<String> {
		Err(ViewError::unsupported("exportAnnotations"))
	}

	/// `flattenAnnotations`
	fn flatten_annotations(&self, forms_only: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("flattenAnnotations"))
	}

	/// `deleteAnnotations`
	fn delete_annotations(&self, ids: &[String]) -> ViewResult<()> {
		Err(ViewError::unsupported("deleteAnnotations"))
	}

	/// `selectAnnotation`
	fn select_annotation(&self, id: &str, page: u32) -> ViewResult<()> {
		Err(ViewError::unsupported("selectAnnotation"))
	}

	/// `setPropertiesForAnnotation`
	fn set_properties_for_annotation(&self, id: &str, page: u32, properties: &Map<String, Value>) -> ViewResult<()> {
		Err(ViewError::unsupported("setPropertiesForAnnotation"))
	}

	/// `setFlagsForAnnotations`
	fn set_flags_for_annotations(&self, flags: &[AnnotationFlag]) -> ViewResult<()> {
		Err(ViewError::unsupported("setFlagsForAnnotations"))
	}

	/// `setFlagForFields`
	fn set_flag_for_fields(&self, fields: &[String], flag: FieldFlag, value: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("setFlagForFields"))
	}

	/// `setValuesForFields`
	fn set_values_for_fields(&self, values: &Map<String, Value>) -> ViewResult<()> {
		Err(ViewError::unsupported("setValuesForFields"))
	}

	/// `setToolMode`
	fn set_tool_mode(&self, tool: &str) -> ViewResult<()> {
		Err(ViewError::unsupported("setToolMode"))
	}

	/// `commitTool`. Returns whether a pending tool action was committed.
	fn commit_tool(&self) -> ViewResult<bool> {
		Err(ViewError::unsupported("commitTool"))
	}

	/// `handleBackButton`. Returns whether the view consumed the press.
	fn handle_back_button(&self) -> ViewResult<bool> {
		Err(ViewError::unsupported("handleBackButton"))
	}

	/// `closeAllTabs`
	fn close_all_tabs(&self) -> ViewResult<()> {
		Err(ViewError::unsupported("closeAllTabs"))
	}

	/// `getOutline`
	fn outline(&self) -> ViewResult<Vec<OutlineEntry>> {
		Err(ViewError::unsupported("getOutline"))
	}

	/// `findText`: starts interactive find.
	fn find_text(&self, query: &str) -> ViewResult<()> {
		Err(ViewError::unsupported("findText"))
	}

	/// `findTextResult`: moves to the next or previous interactive hit.
	fn find_text_result(&self, next: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("findTextResult"))
	}

	/// `cancelFindText`
	fn cancel_find_text(&self) -> ViewResult<()> {
		Err(ViewError::unsupported("cancelFindText"))
	}

	/// `search`. Long running; poll `cancel` and return [`ViewError::Stopped`] once it fires.
	fn search(&self, query: &SearchQuery, cancel: &CancelToken) -> ViewResult<Vec<SearchMatch>> {
		Err(ViewError::unsupported("search"))
	}

	/// `getThumbnail`: encoded image bytes. Long running; poll `cancel` like [`DocumentView::search`].
	fn thumbnail(&self, page: u32, cancel: &CancelToken) -> ViewResult<Vec<u8>> {
		Err(ViewError::unsupported("getThumbnail"))
	}

	/// `clearSearch`: drops highlighted search results.
	fn clear_search(&self) -> ViewResult<()> {
		Err(ViewError::unsupported("clearSearch"))
	}

	/// `appendSchoolLogo`: stamps a decoded logo image onto the document, on
	/// both sides of each sheet when `duplex` is set.
	fn append_school_logo(&self, image: &[u8], duplex: bool) -> ViewResult<()> {
		Err(ViewError::unsupported("appendSchoolLogo"))
	}

	/// `addBookmark`: bookmarks the current page.
	fn add_bookmark(&self) -> ViewResult<()> {
		Err(ViewError::unsupported("addBookmark"))
	}

	/// `canExitViewer`
	fn can_exit_viewer(&self) -> ViewResult<bool> {
		Err(ViewError::unsupported("canExitViewer"))
	}

	/// `setColorMode`
	fn set_color_mode(&self, mode: &str) -> ViewResult<()> {
		Err(ViewError::unsupported("setColorMode"))
	}

	/// `showSettings`
	fn show_settings(&self) -> ViewResult<()> {
		Err(ViewError::unsupported("showSettings"))
	}

	/// Lifecycle hook. Views match the event against their own pending requests and ignore the rest.
	fn on_activity_result(&self, event: &LifecycleEvent) -> ViewResult<()> {
		Ok(())
	}
}

/// Non-owning reference to an attached view.
///
/// The UI layer holds the owning `Arc`. Once it drops the view, the handle no
/// longer upgrades and the tag behaves as detached.
#[derive(Clone)]
pub struct ViewHandle(Weak<dyn DocumentView>);

impl ViewHandle {
	/// Creates a handle to `view` without taking ownership.
	pub fn new<V: DocumentView + 'static>(view: &Arc<V>) -> Self {
		let weak: Weak<V> = Arc::downgrade(view);
		Self(weak)
	}

	/// Creates a handle from an already type-erased view.
	pub fn from_dyn(view: &Arc<dyn DocumentView>) -> Self {
		Self(Arc::downgrade(view))
	}

	/// Strong reference for the duration of one invocation.
	pub fn upgrade(&self) -> Option<Arc<dyn DocumentView>> {
		self.0.upgrade()
	}

	/// Returns true while the owner still holds the view.
	pub fn is_live(&self) -> bool {
		self.0.strong_count() > 0
	}

	/// Returns true if both handles refer to the same view.
	pub fn same_view(&self, other: &ViewHandle) -> bool {
		Weak::ptr_eq(&self.0, &other.0)
	}
}

impl std::fmt::Debug for ViewHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("ViewHandle").field(&if self.is_live() { "live" } else { "dead" }).finish()
	}
}
