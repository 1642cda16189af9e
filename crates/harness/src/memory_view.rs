//! In-memory document view used by scripted sessions.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use vellum_bridge::{
	CancelToken, Dimensions, DocumentView, LifecycleEvent, OutlineEntry, PageBox, Rgb, SearchMatch, SearchQuery, ViewError, ViewResult,
};

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const GLYPH_WIDTH: f64 = 6.0;
const LINE_HEIGHT: f64 = 12.0;
const COLOR_MODES: &[&str] = &["normal", "night", "sepia"];

/// A document held entirely in memory: one string of text per page.
pub struct MemoryView {
	path: String,
	pages: Vec<String>,
	state: Mutex<ViewState>,
}

struct ViewState {
	current: u32,
	zoom: f64,
	rotation: u16,
	continuous: bool,
	slider: bool,
	background: Rgb,
	tool: Option<String>,
	selected: Option<String>,
	annotations: BTreeMap<String, Annotation>,
	imported: Vec<String>,
	find: Option<FindState>,
	activity_results: Vec<LifecycleEvent>,
	saves: u32,
	bookmarks: Vec<u32>,
	color_mode: &'static str,
	logo: Option<Logo>,
}

struct Logo {
	bytes: usize,
	duplex: bool,
}

struct Annotation {
	page: u32,
	properties: Map<String, Value>,
}

struct FindState {
	hits: Vec<u32>,
	index: usize,
}

impl MemoryView {
	/// Creates a document. Pages without explicit text read as `Page N`.
	pub fn new(path: impl Into<String>, page_count: u32, text: Vec<String>) -> Self {
		let pages = (1..=page_count.max(1))
			.map(|page| text.get(page as usize - 1).cloned().unwrap_or_else(|| format!("Page {page}")))
			.collect();
		Self {
			path: path.into(),
			pages,
			state: Mutex::new(ViewState {
				current: 1,
				zoom: 1.0,
				rotation: 0,
				continuous: true,
				slider: true,
				background: Rgb { r: 255, g: 255, b: 255 },
				tool: None,
				selected: None,
				annotations: BTreeMap::new(),
				imported: Vec::new(),
				find: None,
				activity_results: Vec::new(),
				saves: 0,
				bookmarks: Vec::new(),
				color_mode: COLOR_MODES[0],
				logo: None,
			}),
		}
	}

	/// Current view state, for session output.
	pub fn summary(&self) -> Value {
		let state = self.state.lock();
		json!({
			"path": self.path,
			"pages": self.pages.len(),
			"currentPage": state.current,
			"zoom": state.zoom,
			"rotation": state.rotation,
			"continuous": state.continuous,
			"slider": state.slider,
			"background": [state.background.r, state.background.g, state.background.b],
			"tool": state.tool,
			"selected": state.selected,
			"annotations": state.annotations.keys().collect::<Vec<_>>(),
			"imported": state.imported.len(),
			"finding": state.find.is_some(),
			"activityResults": state.activity_results.iter().map(|event| event.request_code).collect::<Vec<_>>(),
			"saves": state.saves,
			"bookmarks": state.bookmarks,
			"colorMode": state.color_mode,
			"logo": state.logo.as_ref().map(|logo| json!({ "bytes": logo.bytes, "duplex": logo.duplex })),
		})
	}

	fn page_count_u32(&self) -> u32 {
		u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
	}

	fn check_page(&self, page: u32) -> ViewResult<()> {
		if page == 0 || page > self.page_count_u32() {
			return Err(ViewError::failed("pageOutOfRange", format!("page {page} outside 1..={}", self.pages.len())));
		}
		Ok(())
	}

	fn text(&self, page: u32) -> &str {
		&self.pages[page as usize - 1]
	}
}

fn find_in(text: &str, query: &SearchQuery) -> Vec<(usize, String)> {
	let (haystack, needle) = if query.case_sensitive {
		(text.to_string(), query.text.clone())
	} else {
		(text.to_lowercase(), query.text.to_lowercase())
	};
	if needle.is_empty() || haystack.len() != text.len() {
		return Vec::new();
	}

	let is_word = |c: char| c.is_alphanumeric() || c == '_';
	haystack
		.match_indices(needle.as_str())
		.filter(|(start, found)| {
			if !query.whole_word {
				return true;
			}
			let end = start + found.len();
			let before = haystack[..*start].chars().next_back().is_none_or(|c| !is_word(c));
			let after = haystack[end..].chars().next().is_none_or(|c| !is_word(c));
			before && after
		})
		.map(|(start, found)| (start, text[start..start + found.len()].to_string()))
		.collect()
}

impl DocumentView for MemoryView {
	fn page_count(&self) -> ViewResult<u32> {
		Ok(self.page_count_u32())
	}

	fn current_page(&self) -> ViewResult<u32> {
		Ok(self.state.lock().current)
	}

	fn set_current_page(&self, page: u32) -> ViewResult<bool> {
		self.check_page(page)?;
		let mut state = self.state.lock();
		let changed = state.current != page;
		state.current = page;
		Ok(changed)
	}

	fn jump_to(&self, page: u32) -> ViewResult<()> {
		self.set_current_page(page).map(|_| ())
	}

	fn zoom(&self) -> ViewResult<f64> {
		Ok(self.state.lock().zoom)
	}

	fn dimensions(&self) -> ViewResult<Dimensions> {
		let state = self.state.lock();
		let (width, height) = if state.rotation % 180 == 0 {
			(PAGE_WIDTH, PAGE_HEIGHT)
		} else {
			(PAGE_HEIGHT, PAGE_WIDTH)
		};
		Ok(Dimensions {
			width: width * state.zoom,
			height: height * state.zoom,
		})
	}

	fn page_crop_box(&self, page: u32) -> ViewResult<PageBox> {
		self.check_page(page)?;
		Ok(PageBox {
			x1: 0.0,
			y1: 0.0,
			x2: PAGE_WIDTH,
			y2: PAGE_HEIGHT,
		})
	}

	fn rotate(&self, counter_clockwise: bool) -> ViewResult<()> {
		let mut state = self.state.lock();
		state.rotation = if counter_clockwise {
			(state.rotation + 270) % 360
		} else {
			(state.rotation + 90) % 360
		};
		Ok(())
	}

	fn toggle_slider(&self, visible: bool) -> ViewResult<()> {
		self.state.lock().slider = visible;
		Ok(())
	}

	fn set_continuous(&self, enabled: bool) -> ViewResult<()> {
		self.state.lock().continuous = enabled;
		Ok(())
	}

	fn change_background(&self, color: Rgb) -> ViewResult<()> {
		self.state.lock().background = color;
		Ok(())
	}

	fn document_path(&self) -> ViewResult<String> {
		Ok(self.path.clone())
	}

	fn save_document(&self) -> ViewResult<String> {
		self.state.lock().saves += 1;
		Ok(self.path.clone())
	}

	fn import_annotations(&self, xfdf: &str) -> ViewResult<()> {
		if xfdf.trim().is_empty() {
			return Err(ViewError::failed("emptyXfdf", "nothing to import"));
		}
		self.state.lock().imported.push(xfdf.to_string());
		Ok(())
	}

	fn export_annotations(&self, _options: &Map<String, Value>) -> ViewResult<String> {
		let state = self.state.lock();
		let mut out = String::from("<xfdf><annots>");
		for (id, annotation) in &state.annotations {
			out.push_str(&format!("<annot name=\"{id}\" page=\"{}\"", annotation.page - 1));
			for (key, value) in &annotation.properties {
				if let Some(text) = value.as_str() {
					out.push_str(&format!(" {key}=\"{text}\""));
				}
			}
			out.push_str("/>");
		}
		out.push_str("</annots>");
		for imported in &state.imported {
			out.push_str(imported);
		}
		out.push_str("</xfdf>");
		Ok(out)
	}

	fn delete_annotations(&self, ids: &[String]) -> ViewResult<()> {
		let mut state = self.state.lock();
		if let Some(missing) = ids.iter().find(|id| !state.annotations.contains_key(*id)) {
			return Err(ViewError::failed("annotationNotFound", missing.clone()));
		}
		for id in ids {
			state.annotations.remove(id);
			if state.selected.as_ref() == Some(id) {
				state.selected = None;
			}
		}
		Ok(())
	}

	fn select_annotation(&self, id: &str, page: u32) -> ViewResult<()> {
		let mut state = self.state.lock();
		if !state.annotations.get(id).is_some_and(|annotation| annotation.page == page) {
			return Err(ViewError::failed("annotationNotFound", format!("{id} on page {page}")));
		}
		state.selected = Some(id.to_string());
		Ok(())
	}

	fn set_properties_for_annotation(&self, id: &str, page: u32, properties: &Map<String, Value>) -> ViewResult<()> {
		self.check_page(page)?;
		let mut state = self.state.lock();
		let annotation = state.annotations.entry(id.to_string()).or_insert_with(|| Annotation {
			page,
			properties: Map::new(),
		});
		annotation.page = page;
		annotation.properties.extend(properties.clone());
		Ok(())
	}

	fn set_tool_mode(&self, tool: &str) -> ViewResult<()> {
		self.state.lock().tool = Some(tool.to_string());
		Ok(())
	}

	fn commit_tool(&self) -> ViewResult<bool> {
		Ok(self.state.lock().tool.take().is_some())
	}

	fn handle_back_button(&self) -> ViewResult<bool> {
		let mut state = self.state.lock();
		if state.find.take().is_some() {
			return Ok(true);
		}
		Ok(state.selected.take().is_some())
	}

	fn close_all_tabs(&self) -> ViewResult<()> {
		Ok(())
	}

	fn outline(&self) -> ViewResult<Vec<OutlineEntry>> {
		Ok(self
			.pages
			.iter()
			.zip(1..)
			.filter_map(|(text, page)| {
				let title = text.lines().next()?.trim();
				(!title.is_empty()).then(|| OutlineEntry {
					title: title.to_string(),
					page,
					children: Vec::new(),
				})
			})
			.collect())
	}

	fn find_text(&self, query: &str) -> ViewResult<()> {
		let query = SearchQuery {
			text: query.to_string(),
			case_sensitive: false,
			whole_word: false,
		};
		let hits: Vec<u32> = (1..=self.page_count_u32()).filter(|page| !find_in(self.text(*page), &query).is_empty()).collect();
		let mut state = self.state.lock();
		if let Some(first) = hits.first() {
			state.current = *first;
		}
		state.find = Some(FindState { hits, index: 0 });
		Ok(())
	}

	fn find_text_result(&self, next: bool) -> ViewResult<()> {
		let mut state = self.state.lock();
		let Some(find) = state.find.as_mut() else {
			return Err(ViewError::failed("noActiveFind", "findText has not been called"));
		};
		if find.hits.is_empty() {
			return Ok(());
		}
		let len = find.hits.len();
		find.index = if next { (find.index + 1) % len } else { (find.index + len - 1) % len };
		let page = find.hits[find.index];
		state.current = page;
		Ok(())
	}

	fn cancel_find_text(&self) -> ViewResult<()> {
		self.state.lock().find = None;
		Ok(())
	}

	fn search(&self, query: &SearchQuery, cancel: &CancelToken) -> ViewResult<Vec<SearchMatch>> {
		let mut matches = Vec::new();
		for page in 1..=self.page_count_u32() {
			if cancel.is_cancelled() {
				return Err(ViewError::Stopped);
			}
			for (offset, text) in find_in(self.text(page), query) {
				let x1 = offset as f64 * GLYPH_WIDTH;
				matches.push(SearchMatch {
					page,
					bounds: [x1, 0.0, x1 + text.chars().count() as f64 * GLYPH_WIDTH, LINE_HEIGHT],
					text,
				});
			}
		}
		Ok(matches)
	}

	fn clear_search(&self) -> ViewResult<()> {
		self.state.lock().find = None;
		Ok(())
	}

	fn append_school_logo(&self, image: &[u8], duplex: bool) -> ViewResult<()> {
		self.state.lock().logo = Some(Logo { bytes: image.len(), duplex });
		Ok(())
	}

	fn add_bookmark(&self) -> ViewResult<()> {
		let mut state = self.state.lock();
		let page = state.current;
		if !state.bookmarks.contains(&page) {
			state.bookmarks.push(page);
		}
		Ok(())
	}

	/// Exiting is refused while an uncommitted tool or an interactive find is active.
	fn can_exit_viewer(&self) -> ViewResult<bool> {
		let state = self.state.lock();
		Ok(state.tool.is_none() && state.find.is_none())
	}

	fn set_color_mode(&self, mode: &str) -> ViewResult<()> {
		let Some(known) = COLOR_MODES.iter().copied().find(|known| *known == mode) else {
			return Err(ViewError::failed("unknownColorMode", format!("color mode `{mode}` is not one of {COLOR_MODES:?}")));
		};
		self.state.lock().color_mode = known;
		Ok(())
	}

	fn thumbnail(&self, page: u32, cancel: &CancelToken) -> ViewResult<Vec<u8>> {
		self.check_page(page)?;
		if cancel.is_cancelled() {
			return Err(ViewError::Stopped);
		}
		Ok(format!("thumbnail:{}:{page}", self.path).into_bytes())
	}

	fn on_activity_result(&self, event: &LifecycleEvent) -> ViewResult<()> {
		self.state.lock().activity_results.push(event.clone());
		Ok(())
	}
}
