use folio_logging::{folio_debug, folio_info, folio_warn};

use crate::bus::{BusEvent, EventBus, Subscriber};
use crate::raster::RasterSurface;

pub const DEFAULT_SCALE: f64 = 1.5;
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 4.0;
const SCALE_STEP: f64 = 0.25;

/// Identifies one document load; results tagged with an older generation are stale.
pub type LoadGeneration = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Terminal until another document reference arrives.
    Errored { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: LoadGeneration,
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub generation: LoadGeneration,
    pub page: u32,
    pub scale: f64,
}

/// Work the driver must hand to the engine on the scheduler's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEffect {
    Load(LoadTicket),
    Render(RenderRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageRejected {
    #[error("no document is ready")]
    NotReady,
    #[error("'{0}' is not a page number")]
    NotANumber(String),
    #[error("page {requested} is outside 1..={total}")]
    OutOfRange { requested: i64, total: u32 },
}

/// Loads one document and renders one page at a time into an owned surface.
///
/// At most one render is in flight. A request made meanwhile is parked in a
/// single pending slot that later requests overwrite, so a burst of page
/// changes ends in exactly one more render of the last requested page.
#[derive(Debug)]
pub struct PageScheduler {
    phase: ViewerPhase,
    generation: LoadGeneration,
    url: Option<String>,
    label: String,
    initial_page: u32,
    current_page: u32,
    total_pages: u32,
    /// Page and scale of the render the engine is working on.
    in_flight: Option<(u32, f64)>,
    pending_page: Option<u32>,
    scale: f64,
    surface: Option<RasterSurface>,
    surface_page: Option<u32>,
    surface_scale: f64,
    renders_started: u64,
    effects: Vec<ViewerEffect>,
}

impl Default for PageScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE)
    }
}

impl PageScheduler {
    pub fn new(scale: f64) -> Self {
        Self {
            phase: ViewerPhase::Idle,
            generation: 0,
            url: None,
            label: String::new(),
            initial_page: 1,
            current_page: 1,
            total_pages: 0,
            in_flight: None,
            pending_page: None,
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
            surface: None,
            surface_page: None,
            surface_scale: 0.0,
            renders_started: 0,
            effects: Vec::new(),
        }
    }

    pub fn phase(&self) -> &ViewerPhase {
        &self.phase
    }

    pub fn generation(&self) -> LoadGeneration {
        self.generation
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Page shown in the page indicator: the latest accepted target.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending_page
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.surface.as_ref()
    }

    /// Page whose pixels are currently on the surface.
    pub fn surface_page(&self) -> Option<u32> {
        self.surface_page
    }

    pub fn renders_started(&self) -> u64 {
        self.renders_started
    }

    pub fn take_effects(&mut self) -> Vec<ViewerEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn status_line(&self) -> String {
        match &self.phase {
            ViewerPhase::Idle => "No document".to_string(),
            ViewerPhase::Loading => format!("Loading {}…", self.label),
            ViewerPhase::Ready => format!("Page {} of {}", self.current_page, self.total_pages),
            ViewerPhase::Errored { message } => format!("Could not load document: {message}"),
        }
    }

    /// Starts loading a document, discarding all state of the previous one.
    pub fn load_document(&mut self, url: &str, initial_page: u32, label: &str) {
        self.generation += 1;
        self.url = Some(url.to_string());
        self.label = label.to_string();
        self.initial_page = initial_page.max(1);
        self.current_page = self.initial_page;
        self.total_pages = 0;
        self.in_flight = None;
        self.pending_page = None;
        self.surface = None;
        self.surface_page = None;
        self.effects.clear();

        if let Err(err) = url::Url::parse(url) {
            folio_warn!("refusing to load document from {:?}: {}", url, err);
            self.phase = ViewerPhase::Errored {
                message: format!("invalid document url ({err})"),
            };
            return;
        }

        folio_info!("loading document {:?} (generation {})", label, self.generation);
        self.phase = ViewerPhase::Loading;
        self.effects.push(ViewerEffect::Load(LoadTicket {
            generation: self.generation,
            url: url.to_string(),
            label: label.to_string(),
        }));
    }

    pub fn load_succeeded(&mut self, generation: LoadGeneration, total_pages: u32) {
        if !self.is_current_load(generation) {
            return;
        }
        if total_pages == 0 {
            self.phase = ViewerPhase::Errored {
                message: "document has no pages".to_string(),
            };
            return;
        }
        self.total_pages = total_pages;
        self.current_page = self.initial_page.min(total_pages);
        self.phase = ViewerPhase::Ready;
        folio_info!("document ready: {} pages", total_pages);
        self.request_render(self.current_page, true);
    }

    pub fn load_failed(&mut self, generation: LoadGeneration, message: &str) {
        if !self.is_current_load(generation) {
            return;
        }
        folio_warn!("document load failed: {}", message);
        self.phase = ViewerPhase::Errored {
            message: message.to_string(),
        };
    }

    /// Installs a finished render and starts the parked one, if any.
    pub fn render_finished(&mut self, generation: LoadGeneration, page: u32, surface: RasterSurface) {
        if generation != self.generation || self.in_flight.is_none() {
            folio_debug!("dropping stale render of page {} (generation {})", page, generation);
            return;
        }
        if let Some((_, scale)) = self.in_flight {
            self.surface_scale = scale;
        }
        self.surface = Some(surface);
        self.surface_page = Some(page);
        self.complete_in_flight();
    }

    pub fn render_failed(&mut self, generation: LoadGeneration, page: u32, message: &str) {
        if generation != self.generation || self.in_flight.is_none() {
            return;
        }
        folio_warn!("render of page {} failed: {}", page, message);
        self.complete_in_flight();
    }

    pub fn go_to_page(&mut self, requested: i64) -> Result<(), PageRejected> {
        if self.phase != ViewerPhase::Ready {
            return Err(PageRejected::NotReady);
        }
        let page = u32::try_from(requested)
            .ok()
            .filter(|page| (1..=self.total_pages).contains(page))
            .ok_or(PageRejected::OutOfRange {
                requested,
                total: self.total_pages,
            })?;
        self.current_page = page;
        self.request_render(page, false);
        Ok(())
    }

    /// Page indicator input; anything but an integer is rejected.
    pub fn go_to_page_text(&mut self, input: &str) -> Result<(), PageRejected> {
        let requested = input
            .trim()
            .parse::<i64>()
            .map_err(|_| PageRejected::NotANumber(input.trim().to_string()))?;
        self.go_to_page(requested)
    }

    pub fn next(&mut self) {
        if self.phase == ViewerPhase::Ready && self.current_page < self.total_pages {
            let _ = self.go_to_page(i64::from(self.current_page) + 1);
        }
    }

    pub fn previous(&mut self) {
        if self.phase == ViewerPhase::Ready && self.current_page > 1 {
            let _ = self.go_to_page(i64::from(self.current_page) - 1);
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        let scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        if same_scale(scale, self.scale) {
            return;
        }
        self.scale = scale;
        if self.phase == ViewerPhase::Ready {
            self.request_render(self.current_page, true);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_scale(self.scale + SCALE_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_scale(self.scale - SCALE_STEP);
    }

    fn is_current_load(&self, generation: LoadGeneration) -> bool {
        generation == self.generation && self.phase == ViewerPhase::Loading
    }

    fn request_render(&mut self, page: u32, force: bool) {
        // Only a render of the same page at the current scale satisfies a request.
        match self.in_flight {
            Some((in_flight, scale))
                if in_flight == page && same_scale(scale, self.scale) && !force =>
            {
                self.pending_page = None;
            }
            Some(_) => {
                self.pending_page = Some(page);
            }
            None => {
                if !force
                    && self.surface_page == Some(page)
                    && same_scale(self.surface_scale, self.scale)
                {
                    return;
                }
                self.start_render(page);
            }
        }
    }

    fn start_render(&mut self, page: u32) {
        self.in_flight = Some((page, self.scale));
        self.renders_started += 1;
        self.effects.push(ViewerEffect::Render(RenderRequest {
            generation: self.generation,
            page,
            scale: self.scale,
        }));
    }

    fn complete_in_flight(&mut self) {
        self.in_flight = None;
        if let Some(page) = self.pending_page.take() {
            self.start_render(page);
        }
    }
}

fn same_scale(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}

impl Subscriber for PageScheduler {
    fn on_event(&mut self, event: &BusEvent, _bus: &mut EventBus) {
        match event {
            BusEvent::RagMeta {
                pdf_url,
                first_page,
                doc_label,
                ..
            } => {
                let same_document = self.url.as_deref() == Some(pdf_url.as_str());
                match (&self.phase, same_document) {
                    (ViewerPhase::Ready, true) => {
                        if let Err(err) = self.go_to_page(i64::from(*first_page)) {
                            folio_debug!("ignoring cited page: {}", err);
                        }
                    }
                    (ViewerPhase::Loading, true) => {
                        self.initial_page = (*first_page).max(1);
                        self.current_page = self.initial_page;
                    }
                    _ => self.load_document(pdf_url, *first_page, doc_label),
                }
            }
            BusEvent::JumpToPage { page } => {
                if let Err(err) = self.go_to_page(i64::from(*page)) {
                    folio_debug!("ignoring jump: {}", err);
                }
            }
            _ => {}
        }
    }
}
