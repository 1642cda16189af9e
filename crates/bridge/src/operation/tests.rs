use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::model::{AnnotationFlagKind, PageBox, SearchMatch};

fn parse(name: &str, args: Value) -> Result<Operation> {
	let Value::Array(args) = args else {
		panic!("test args must be a JSON array");
	};
	Operation::parse(name, &args)
}

fn assert_invalid(name: &str, args: Value) {
	match parse(name, args.clone()) {
		Err(BridgeError::InvalidArgument(_)) => {}
		other => panic!("{name}({args}) should be invalid, got {other:?}"),
	}
}

#[test]
fn every_catalogue_name_is_known() {
	assert_eq!(OPERATION_NAMES.len(), 40);
	for name in OPERATION_NAMES {
		assert_eq!(canonical_name(name), Some(*name));
	}
	assert_eq!(canonical_name("GetPageCount"), None);
}

#[test]
fn unknown_operation_is_invalid() {
	assert_invalid("explode", json!([]));
}

#[test]
fn parses_typed_arguments() {
	assert_eq!(parse("setCurrentPage", json!([3])).unwrap(), Operation::SetCurrentPage { page: 3 });
	assert_eq!(
		parse("changeBackground", json!([0, 128, 255])).unwrap(),
		Operation::ChangeBackground {
			color: Rgb { r: 0, g: 128, b: 255 }
		}
	);
	assert_eq!(
		parse("search", json!(["foo", false, true])).unwrap(),
		Operation::Search {
			query: SearchQuery {
				text: "foo".into(),
				case_sensitive: false,
				whole_word: true,
			}
		}
	);
	assert_eq!(
		parse("setFlagForFields", json!([["name", "email"], 1, true])).unwrap(),
		Operation::SetFlagForFields {
			fields: vec!["name".into(), "email".into()],
			flag: FieldFlag::Required,
			value: true,
		}
	);
	assert_eq!(
		parse("setFlagsForAnnotations", json!([[{"id": "a1", "pageNumber": 2, "flag": "noView", "flagValue": true}]])).unwrap(),
		Operation::SetFlagsForAnnotations {
			flags: vec![AnnotationFlag {
				id: "a1".into(),
				page_number: 2,
				flag: AnnotationFlagKind::NoView,
				flag_value: true,
			}]
		}
	);
}

#[test]
fn parses_viewer_chrome_operations() {
	assert_eq!(
		parse("appendSchoolLogo", json!(["cG5n", true])).unwrap(),
		Operation::AppendSchoolLogo {
			image: b"png".to_vec(),
			duplex: true,
		}
	);
	assert_eq!(parse("clearSearch", json!([])).unwrap(), Operation::ClearSearch);
	assert_eq!(parse("addBookmark", json!([])).unwrap(), Operation::AddBookmark);
	assert_eq!(parse("canExitViewer", json!([])).unwrap(), Operation::CanExitViewer);
	assert_eq!(parse("showSettings", json!([])).unwrap(), Operation::ShowSettings);
	assert_eq!(
		parse("setColorMode", json!(["night"])).unwrap(),
		Operation::SetColorMode { mode: "night".into() }
	);
	assert_eq!(parse("appendSchoolLogo", json!(["cG5n", false])).unwrap().name(), "appendSchoolLogo");
}

#[test]
fn rejects_malformed_logo() {
	assert_invalid("appendSchoolLogo", json!(["cG5n"]));
	assert_invalid("appendSchoolLogo", json!(["not base64!", true]));
	assert_invalid("appendSchoolLogo", json!(["", true]));
	assert_invalid("appendSchoolLogo", json!(["cG5n", "yes"]));
	assert_invalid("setColorMode", json!([""]));
	assert_invalid("addBookmark", json!([1]));
}

#[test]
fn rejects_wrong_arity() {
	assert_invalid("getPageCount", json!([1]));
	assert_invalid("setCurrentPage", json!([]));
	assert_invalid("search", json!(["foo", false]));
}

#[test]
fn rejects_wrong_types() {
	assert_invalid("setCurrentPage", json!(["3"]));
	assert_invalid("rotate", json!([1]));
	assert_invalid("exportAnnotations", json!(["xfdf"]));
	assert_invalid("deleteAnnotations", json!(["a1"]));
	assert_invalid("deleteAnnotations", json!([["a1", 2]]));
	assert_invalid("setFlagsForAnnotations", json!([[{"id": "a1", "pageNumber": 2, "flag": "sparkly", "flagValue": true}]]));
}

#[test]
fn rejects_out_of_range_values() {
	assert_invalid("jumpTo", json!([0]));
	assert_invalid("jumpTo", json!([-4]));
	assert_invalid("getThumbnail", json!([1.5]));
	assert_invalid("changeBackground", json!([0, 256, 0]));
	assert_invalid("changeBackground", json!([-1, 0, 0]));
	assert_invalid("setFlagForFields", json!([["name"], 7, true]));
	assert_invalid("setFlagsForAnnotations", json!([[{"id": "a1", "pageNumber": 0, "flag": "hidden", "flagValue": true}]]));
	assert_invalid(
		"setFlagsForAnnotations",
		json!([[
			{"id": "a1", "pageNumber": 1, "flag": "hidden", "flagValue": true},
			{"id": "a2", "pageNumber": 0, "flag": "print", "flagValue": false},
		]]),
	);
}

#[test]
fn rejects_empty_identifiers() {
	assert_invalid("selectAnnotation", json!(["", 1]));
	assert_invalid("setToolMode", json!([""]));
	assert_invalid("search", json!(["", false, false]));
	assert_invalid("deleteAnnotations", json!([[""]]));
	assert_invalid("setFlagsForAnnotations", json!([[{"id": "", "pageNumber": 1, "flag": "hidden", "flagValue": true}]]));
}

#[test]
fn only_search_and_thumbnail_are_cancellable() {
	let cancellable: Vec<_> = OPERATION_NAMES
		.iter()
		.filter_map(|name| {
			let args = match *name {
				"search" => json!(["q", false, false]),
				"getThumbnail" => json!([1]),
				_ => return None,
			};
			Some(parse(name, args).unwrap())
		})
		.collect();
	assert!(cancellable.iter().all(Operation::is_cancellable));
	assert!(!Operation::GetPageCount.is_cancellable());
	assert!(!Operation::FindText { query: "q".into() }.is_cancellable());
}

#[derive(Default)]
struct Fixture {
	deleted: Mutex<Vec<String>>,
	logos: Mutex<Vec<(Vec<u8>, bool)>>,
}

impl DocumentView for Fixture {
	fn page_count(&self) -> ViewResult<u32> {
		Ok(12)
	}

	fn page_crop_box(&self, _page: u32) -> ViewResult<PageBox> {
		Ok(PageBox {
			x1: 0.0,
			y1: 0.0,
			x2: 612.0,
			y2: 792.0,
		})
	}

	fn delete_annotations(&self, ids: &[String]) -> ViewResult<()> {
		self.deleted.lock().extend_from_slice(ids);
		Ok(())
	}

	fn search(&self, query: &SearchQuery, _cancel: &CancelToken) -> ViewResult<Vec<SearchMatch>> {
		Ok(vec![SearchMatch {
			page: 4,
			text: query.text.clone(),
			bounds: [1.0, 2.0, 3.0, 4.0],
		}])
	}

	fn thumbnail(&self, _page: u32, _cancel: &CancelToken) -> ViewResult<Vec<u8>> {
		Ok(b"png".to_vec())
	}

	fn append_school_logo(&self, image: &[u8], duplex: bool) -> ViewResult<()> {
		self.logos.lock().push((image.to_vec(), duplex));
		Ok(())
	}

	fn can_exit_viewer(&self) -> ViewResult<bool> {
		Ok(false)
	}
}

#[test]
fn invoke_encodes_results() {
	let view = Arc::new(Fixture::default());
	let cancel = CancelToken::new();

	assert_eq!(Operation::GetPageCount.invoke(view.as_ref(), &cancel), Ok(json!(12)));
	assert_eq!(
		Operation::GetPageCropBox { page: 1 }.invoke(view.as_ref(), &cancel),
		Ok(json!({"x1": 0.0, "y1": 0.0, "x2": 612.0, "y2": 792.0, "width": 612.0, "height": 792.0}))
	);
	assert_eq!(
		Operation::DeleteAnnotations {
			ids: vec!["a".into(), "b".into()]
		}
		.invoke(view.as_ref(), &cancel),
		Ok(Value::Null)
	);
	assert_eq!(*view.deleted.lock(), vec!["a".to_string(), "b".to_string()]);
	assert_eq!(
		parse("search", json!(["needle", true, false])).unwrap().invoke(view.as_ref(), &cancel),
		Ok(json!([{"page": 4, "text": "needle", "bounds": [1.0, 2.0, 3.0, 4.0]}]))
	);
	assert_eq!(Operation::GetThumbnail { page: 1 }.invoke(view.as_ref(), &cancel), Ok(json!("cG5n")));
	assert_eq!(
		parse("appendSchoolLogo", json!(["cG5n", true])).unwrap().invoke(view.as_ref(), &cancel),
		Ok(Value::Null)
	);
	assert_eq!(*view.logos.lock(), vec![(b"png".to_vec(), true)]);
	assert_eq!(Operation::CanExitViewer.invoke(view.as_ref(), &cancel), Ok(json!(false)));
	assert_eq!(
		Operation::ClearSearch.invoke(view.as_ref(), &cancel),
		Err(ViewError::unsupported("clearSearch"))
	);
}

#[test]
fn invoke_forwards_unsupported() {
	let view = Fixture::default();
	assert_eq!(
		Operation::GetZoom.invoke(&view, &CancelToken::new()),
		Err(ViewError::unsupported("getZoom"))
	);
}
