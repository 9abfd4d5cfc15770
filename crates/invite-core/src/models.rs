//! Data models for invitation projects
//!
//! A project is an ordered list of pages; each page is an ordered list of
//! positioned elements. Images never live inline in the document: an image
//! element carries `srcAssetId`, a reference to an [`Asset`] row owned by the
//! same project.
//!
//! The serde shape of these types is also the wire shape of the export file,
//! so field names are camelCase and `lastModified` is epoch milliseconds.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Store-assigned project key
pub type ProjectId = i64;

/// Store-assigned asset key
pub type AssetId = i64;

/// Template used when a project has no page to inherit from
pub const DEFAULT_TEMPLATE_ID: i64 = 1;

/// Errors raised while editing a project document in memory
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Cannot delete the only page of a project")]
    LastPage,

    #[error("Font size must be positive, got {0}")]
    InvalidFontSize(f64),

    #[error("Unknown font family: {0}")]
    UnknownFont(String),

    #[error("Unknown text alignment: {0}")]
    UnknownAlign(String),

    #[error("Element {0} is an image; text fields do not apply")]
    TextFieldOnImage(String),
}

/// A stored invitation project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Store-assigned key, stable for the lifetime of the row
    pub id: ProjectId,
    /// External identifier, never reused across imports
    pub uuid: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    /// Display order
    pub pages: Vec<Page>,
}

/// A project document that has not been assigned a store key yet
///
/// This is also the `project` payload of an export file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub uuid: String,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    pub pages: Vec<Page>,
}

impl NewProject {
    /// Create an empty project with a fresh uuid and a single blank page
    pub fn new(name: impl Into<String>, template_id: i64) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            name: name.into(),
            last_modified: now_millis(),
            pages: vec![Page::new("Page 1", template_id)],
        }
    }

    /// Attach a store key
    pub fn into_project(self, id: ProjectId) -> Project {
        Project {
            id,
            uuid: self.uuid,
            name: self.name,
            last_modified: self.last_modified,
            pages: self.pages,
        }
    }
}

impl Project {
    /// Strip the store key, e.g. for export
    pub fn to_new_project(&self) -> NewProject {
        NewProject {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            last_modified: self.last_modified,
            pages: self.pages.clone(),
        }
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    pub fn page(&self, page_id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == page_id)
    }

    pub fn page_mut(&mut self, page_id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == page_id)
    }

    /// Append a new page
    ///
    /// The template is inherited from the first page so every page of a
    /// project shares the same background style by default.
    pub fn add_page(&mut self, name: Option<String>) -> &Page {
        let template_id = self
            .pages
            .first()
            .map(|p| p.template_id)
            .unwrap_or(DEFAULT_TEMPLATE_ID);
        let name = name.unwrap_or_else(|| format!("Page {}", self.pages.len() + 1));

        let mut page = Page::new(name, template_id);
        while self.page(&page.id).is_some() {
            page.id = new_page_id();
        }
        self.pages.push(page);
        self.touch();
        &self.pages[self.pages.len() - 1]
    }

    pub fn rename_page(&mut self, page_id: &str, name: impl Into<String>) -> Result<(), EditError> {
        let page = self
            .page_mut(page_id)
            .ok_or_else(|| EditError::PageNotFound(page_id.to_string()))?;
        page.name = name.into();
        self.touch();
        Ok(())
    }

    /// Remove a page; a project always keeps at least one page
    pub fn remove_page(&mut self, page_id: &str) -> Result<Page, EditError> {
        let pos = self
            .pages
            .iter()
            .position(|p| p.id == page_id)
            .ok_or_else(|| EditError::PageNotFound(page_id.to_string()))?;
        if self.pages.len() <= 1 {
            return Err(EditError::LastPage);
        }
        let page = self.pages.remove(pos);
        self.touch();
        Ok(page)
    }

    /// Every `srcAssetId` in page and paint order
    pub fn image_references(&self) -> Vec<AssetId> {
        self.pages
            .iter()
            .flat_map(|p| p.elements.iter())
            .filter_map(|el| match el {
                Element::Image(img) => Some(img.src_asset_id),
                Element::Text(_) => None,
            })
            .collect()
    }

    /// Rewrite asset references through `map`
    ///
    /// References without an entry are left as they are. Returns the number
    /// of elements rewritten.
    pub fn remap_assets(&mut self, map: &HashMap<AssetId, AssetId>) -> usize {
        remap_pages(&mut self.pages, map)
    }
}

pub(crate) fn remap_pages(pages: &mut [Page], map: &HashMap<AssetId, AssetId>) -> usize {
    let mut rewritten = 0;
    for page in pages.iter_mut() {
        for el in page.elements.iter_mut() {
            match el {
                Element::Image(img) => {
                    if let Some(&new_id) = map.get(&img.src_asset_id) {
                        img.src_asset_id = new_id;
                        rewritten += 1;
                    }
                }
                Element::Text(_) => {}
            }
        }
    }
    rewritten
}

/// A single page of a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub name: String,
    /// Background/style variant
    pub template_id: i64,
    /// Paint order, front-most last
    pub elements: Vec<Element>,
}

impl Page {
    pub fn new(name: impl Into<String>, template_id: i64) -> Self {
        Self {
            id: new_page_id(),
            name: name.into(),
            template_id,
            elements: Vec::new(),
        }
    }

    pub fn element(&self, element_id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.id() == element_id)
    }

    pub fn element_mut(&mut self, element_id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|el| el.id() == element_id)
    }

    /// Apply `patch` to an element in place, keeping its paint position
    pub fn update_element(
        &mut self,
        element_id: &str,
        patch: &ElementPatch,
    ) -> Result<&Element, EditError> {
        let element = self
            .element_mut(element_id)
            .ok_or_else(|| EditError::ElementNotFound(element_id.to_string()))?;
        element.apply(patch)?;
        Ok(&*element)
    }

    /// Append an element on top of the paint order
    ///
    /// A colliding id is replaced with a fresh one. Returns the id used.
    pub fn add_element(&mut self, mut element: Element) -> String {
        while self.element(element.id()).is_some() {
            element.set_id(new_element_id());
        }
        let id = element.id().to_string();
        self.elements.push(element);
        id
    }

    pub fn remove_element(&mut self, element_id: &str) -> Result<Element, EditError> {
        let pos = self
            .elements
            .iter()
            .position(|el| el.id() == element_id)
            .ok_or_else(|| EditError::ElementNotFound(element_id.to_string()))?;
        Ok(self.elements.remove(pos))
    }
}

/// Position and size on the page canvas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees
    pub rotation: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }
}

/// A positioned unit on a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Text(t) => &t.id,
            Element::Image(i) => &i.id,
        }
    }

    fn set_id(&mut self, id: String) {
        match self {
            Element::Text(t) => t.id = id,
            Element::Image(i) => i.id = id,
        }
    }

    pub fn frame(&self) -> &Frame {
        match self {
            Element::Text(t) => &t.frame,
            Element::Image(i) => &i.frame,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::Text(_) => "text",
            Element::Image(_) => "image",
        }
    }

    /// Apply a partial update
    ///
    /// The element keeps its variant. Nothing changes unless the whole
    /// patch applies: text fields on an image and text that fails
    /// [`TextElement::validate`] are rejected.
    pub fn apply(&mut self, patch: &ElementPatch) -> Result<(), EditError> {
        match self {
            Element::Text(text) => {
                let mut updated = text.clone();
                patch.apply_frame(&mut updated.frame);
                if let Some(value) = &patch.text {
                    updated.text = value.clone();
                }
                if let Some(font) = patch.font_family {
                    updated.font_family = font;
                }
                if let Some(size) = patch.font_size {
                    updated.font_size = size;
                }
                if let Some(color) = &patch.color {
                    updated.color = color.clone();
                }
                if let Some(align) = patch.text_align {
                    updated.text_align = align;
                }
                updated.validate()?;
                *text = updated;
            }
            Element::Image(image) => {
                if patch.has_text_fields() {
                    return Err(EditError::TextFieldOnImage(image.id.clone()));
                }
                patch.apply_frame(&mut image.frame);
            }
        }
        Ok(())
    }
}

/// A partial element update; `None` leaves a field unchanged
///
/// Frame fields apply to every element, the rest only to text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub text: Option<String>,
    pub font_family: Option<FontFamily>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub text_align: Option<TextAlign>,
}

impl ElementPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_text_fields(&self) -> bool {
        self.text.is_some()
            || self.font_family.is_some()
            || self.font_size.is_some()
            || self.color.is_some()
            || self.text_align.is_some()
    }

    fn apply_frame(&self, frame: &mut Frame) {
        let fields = [
            (self.x, &mut frame.x),
            (self.y, &mut frame.y),
            (self.width, &mut frame.width),
            (self.height, &mut frame.height),
            (self.rotation, &mut frame.rotation),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: String,
    #[serde(flatten)]
    pub frame: Frame,
    pub text: String,
    pub font_family: FontFamily,
    pub font_size: f64,
    pub color: String,
    pub text_align: TextAlign,
}

impl TextElement {
    /// A text box with the editor's default styling
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_element_id(),
            frame: Frame::new(50.0, 50.0, 200.0, 50.0),
            text: text.into(),
            font_family: FontFamily::Poppins,
            font_size: 16.0,
            color: "#000000".to_string(),
            text_align: TextAlign::Left,
        }
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if self.font_size.is_nan() || self.font_size <= 0.0 {
            return Err(EditError::InvalidFontSize(self.font_size));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub id: String,
    #[serde(flatten)]
    pub frame: Frame,
    pub src_asset_id: AssetId,
}

impl ImageElement {
    pub fn new(src_asset_id: AssetId) -> Self {
        Self {
            id: new_element_id(),
            frame: Frame::new(50.0, 50.0, 150.0, 100.0),
            src_asset_id,
        }
    }
}

/// Fonts the renderer ships with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Poppins,
    #[serde(rename = "Playfair Display")]
    PlayfairDisplay,
    #[serde(rename = "Great Vibes")]
    GreatVibes,
    Arial,
    Verdana,
}

impl FontFamily {
    pub const ALL: [FontFamily; 5] = [
        FontFamily::Poppins,
        FontFamily::PlayfairDisplay,
        FontFamily::GreatVibes,
        FontFamily::Arial,
        FontFamily::Verdana,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FontFamily::Poppins => "Poppins",
            FontFamily::PlayfairDisplay => "Playfair Display",
            FontFamily::GreatVibes => "Great Vibes",
            FontFamily::Arial => "Arial",
            FontFamily::Verdana => "Verdana",
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FontFamily {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FontFamily::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EditError::UnknownFont(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl fmt::Display for TextAlign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for TextAlign {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(TextAlign::Left),
            "center" => Ok(TextAlign::Center),
            "right" => Ok(TextAlign::Right),
            _ => Err(EditError::UnknownAlign(s.to_string())),
        }
    }
}

/// A binary image payload owned by exactly one project
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: AssetId,
    /// Sole ownership edge
    pub project_id: ProjectId,
    pub blob: Vec<u8>,
}

/// Current time truncated to the millisecond precision the store keeps
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn new_page_id() -> String {
    format!("page-{}", short_id())
}

fn new_element_id() -> String {
    format!("el-{}", short_id())
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
