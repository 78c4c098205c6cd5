use folio_logging::{folio_debug, folio_error, folio_info};
use serde::{Deserialize, Serialize};

use crate::bus::{BusEvent, EventBus};
use crate::geometry::{to_native_pixels, wrapper_point, Point, Rect, Size};
use crate::ids::IdGenerator;
use crate::raster::RasterSurface;

/// Selections narrower or shorter than this (CSS pixels) are treated as stray clicks.
pub const MIN_SELECTION_PX: f64 = 10.0;

/// A cropped page region. Only `name` and `is_active` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub name: String,
    pub data_url: String,
    #[serde(default)]
    pub source_page: u32,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("nothing to encode")]
    Empty,
    #[error("image encoding failed: {0}")]
    Failed(String),
}

/// Turns a cropped raster into a portable data URL.
pub trait SnippetEncoder {
    fn encode(&self, crop: &RasterSurface) -> Result<String, EncodeError>;
}

/// Where the viewer sits on screen at the moment of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewerGeometry {
    /// Screen position of the scrollable wrapper's top-left corner.
    pub wrapper_origin: Point,
    pub scroll_offset: Point,
    /// Screen position of the raster surface's displayed box.
    pub surface_origin: Point,
    /// CSS size the surface is displayed at.
    pub displayed_size: Size,
}

impl ViewerGeometry {
    pub fn to_wrapper(&self, pointer: Point) -> Point {
        wrapper_point(pointer, self.wrapper_origin, self.scroll_offset)
    }

    /// The surface's displayed box in wrapper space.
    pub fn surface_rect(&self) -> Rect {
        Rect::at(self.to_wrapper(self.surface_origin), self.displayed_size)
    }
}

/// One-shot rectangle tool that crops the rendered page.
#[derive(Debug)]
pub struct SnippetExtractor {
    enabled: bool,
    anchor: Option<Point>,
    current: Option<Point>,
    ids: IdGenerator,
}

impl SnippetExtractor {
    pub fn new(ids: IdGenerator) -> Self {
        Self {
            enabled: false,
            anchor: None,
            current: None,
            ids,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel_selection();
        }
    }

    pub fn toggle(&mut self) {
        self.set_enabled(!self.enabled);
    }

    pub fn is_selecting(&self) -> bool {
        self.anchor.is_some()
    }

    /// Rectangle being dragged, in wrapper space.
    pub fn selection_rect(&self) -> Option<Rect> {
        Some(Rect::from_corners(self.anchor?, self.current?))
    }

    pub fn begin_selection(&mut self, pointer: Point, geometry: &ViewerGeometry) -> bool {
        if !self.enabled {
            return false;
        }
        let at = geometry.to_wrapper(pointer);
        self.anchor = Some(at);
        self.current = Some(at);
        true
    }

    pub fn update_selection(&mut self, pointer: Point, geometry: &ViewerGeometry) {
        if self.anchor.is_some() {
            self.current = Some(geometry.to_wrapper(pointer));
        }
    }

    pub fn cancel_selection(&mut self) {
        self.anchor = None;
        self.current = None;
    }

    /// Finishes the drag. On success emits `snippet-created` and switches the tool off.
    pub fn end_selection(
        &mut self,
        pointer: Point,
        geometry: &ViewerGeometry,
        surface: Option<(&RasterSurface, u32)>,
        encoder: &dyn SnippetEncoder,
        bus: &mut EventBus,
    ) -> Option<Snippet> {
        let anchor = self.anchor.take()?;
        self.current = None;
        if !self.enabled {
            return None;
        }

        let selection = Rect::from_corners(anchor, geometry.to_wrapper(pointer));
        let surface_rect = geometry.surface_rect();
        let Some(clipped) = selection.intersect(&surface_rect) else {
            folio_debug!("selection misses the page surface");
            return None;
        };
        if clipped.width < MIN_SELECTION_PX || clipped.height < MIN_SELECTION_PX {
            folio_debug!(
                "discarding {:.0}x{:.0} selection",
                clipped.width,
                clipped.height
            );
            return None;
        }
        let Some((surface, page)) = surface else {
            folio_debug!("no rendered page to crop from");
            return None;
        };

        let local = clipped.translate(-surface_rect.x, -surface_rect.y);
        let crop = to_native_pixels(local, geometry.displayed_size, surface.size())
            .and_then(|pixels| surface.crop(pixels))?;
        let data_url = match encoder.encode(&crop) {
            Ok(data_url) => data_url,
            Err(err) => {
                folio_error!("could not encode snippet: {}", err);
                return None;
            }
        };

        let snippet = Snippet {
            id: self.ids.next_id(),
            name: format!("Snippet {page}"),
            data_url,
            source_page: page,
            is_active: false,
        };
        folio_info!(
            "snippet {} cropped from page {} ({}x{})",
            snippet.id,
            page,
            crop.width(),
            crop.height()
        );
        bus.emit(BusEvent::SnippetCreated {
            id: snippet.id.clone(),
            name: snippet.name.clone(),
            data_url: snippet.data_url.clone(),
            page,
        });
        self.enabled = false;
        Some(snippet)
    }
}
