//! Element command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use invite_core::{Element, ElementPatch, FontFamily, ProjectId, Store, TextAlign, TextElement};

use crate::output::Output;
use crate::prompt::confirm_destructive;

/// Styling options for a new text element
#[derive(Debug, Default)]
pub struct TextStyle {
    pub font: Option<String>,
    pub size: Option<f64>,
    pub color: Option<String>,
    pub align: Option<String>,
}

impl TextStyle {
    /// Apply the options on top of the editor defaults
    fn build(self, text: String) -> Result<TextElement> {
        let mut element = TextElement::new(text);
        if let Some(font) = self.font {
            element.font_family = font.parse::<FontFamily>()?;
        }
        if let Some(size) = self.size {
            element.font_size = size;
        }
        if let Some(color) = self.color {
            element.color = color;
        }
        if let Some(align) = self.align {
            element.text_align = align.parse::<TextAlign>()?;
        }
        element.validate()?;
        Ok(element)
    }
}

/// Field changes for an existing element, as given on the command line
#[derive(Debug, Default)]
pub struct ElementEdit {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub text: Option<String>,
    pub font: Option<String>,
    pub size: Option<f64>,
    pub color: Option<String>,
    pub align: Option<String>,
}

impl ElementEdit {
    fn into_patch(self) -> Result<ElementPatch> {
        let patch = ElementPatch {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            text: self.text,
            font_family: self.font.map(|f| f.parse::<FontFamily>()).transpose()?,
            font_size: self.size,
            color: self.color,
            text_align: self.align.map(|a| a.parse::<TextAlign>()).transpose()?,
        };
        if patch.is_empty() {
            bail!("Nothing to change. Pass at least one of --x, --y, --width, --height, --rotation, --text, --font, --size, --color, --align");
        }
        Ok(patch)
    }
}

pub fn add_text(
    store: &Store,
    project: ProjectId,
    page: String,
    text: String,
    style: TextStyle,
    output: &Output,
) -> Result<()> {
    let element = style.build(text)?;
    let id = store.add_text_element(project, &page, element)?;
    output.print_created("text element", &id, serde_json::json!({"page": page}));
    Ok(())
}

/// Store an image file as an asset and place it on a page
pub fn add_image(
    store: &mut Store,
    project: ProjectId,
    page: String,
    file: PathBuf,
    output: &Output,
) -> Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read image {:?}", file))?;
    let (id, asset) = store.add_image_element(project, &page, &bytes)?;
    output.print_created(
        "image element",
        &id,
        serde_json::json!({"page": page, "asset": asset}),
    );
    Ok(())
}

/// Change position, size or styling of an element
pub fn set(
    store: &Store,
    project: ProjectId,
    page: String,
    element: String,
    edit: ElementEdit,
    output: &Output,
) -> Result<()> {
    let patch = edit.into_patch()?;
    let updated = store.update_element(project, &page, &element, &patch)?;
    output.success(&format!("Updated {} element {}", updated.kind(), element));
    Ok(())
}

pub fn delete(
    store: &Store,
    project: ProjectId,
    page: String,
    element: String,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let description = format!("Delete element {} from page {}", element, page);
    if !confirm_destructive(&description, yes, output)? {
        return Ok(());
    }

    let removed = store.remove_element(project, &page, &element)?;
    let note = match removed {
        Element::Image(ref image) => format!(
            " (asset {} is kept until the project is deleted)",
            image.src_asset_id
        ),
        Element::Text(_) => String::new(),
    };
    output.success(&format!("Deleted {} element {}{}", removed.kind(), element, note));
    Ok(())
}
