use std::sync::{mpsc, Arc};
use std::thread;

use folio_core::{LoadGeneration, RasterSurface, RenderRequest};
use folio_logging::{folio_debug, folio_info, folio_warn};
use thiserror::Error;

use crate::types::{EngineEvent, EventSink};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no document is open")]
    NoDocument,
    #[error("page {page} is outside 1..={total}")]
    PageOutOfRange { page: u32, total: u32 },
    #[error("PDF rendering is not available in this build")]
    Unsupported,
    #[error("{0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns document bytes into page rasters. Lives on the render thread only.
pub trait RasterBackend {
    /// Replaces the open document; returns its page count.
    fn open(&mut self, bytes: &[u8]) -> Result<u32, RenderError>;
    /// Renders a 1-based page at `scale` times its natural size.
    fn render(&mut self, page: u32, scale: f64) -> Result<RasterSurface, RenderError>;
}

/// Builds the backend on the render thread, so backends need not be `Send`.
pub type BackendFactory = Box<dyn FnOnce() -> Box<dyn RasterBackend> + Send>;

/// Backend for builds without a rasterizer; every document fails to open.
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl RasterBackend for UnsupportedBackend {
    fn open(&mut self, _bytes: &[u8]) -> Result<u32, RenderError> {
        Err(RenderError::Unsupported)
    }

    fn render(&mut self, _page: u32, _scale: f64) -> Result<RasterSurface, RenderError> {
        Err(RenderError::NoDocument)
    }
}

/// The best backend compiled into this build.
pub fn default_backend() -> BackendFactory {
    #[cfg(feature = "pdf")]
    {
        Box::new(|| Box::new(mupdf_backend::MupdfBackend::default()) as Box<dyn RasterBackend>)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(|| Box::new(UnsupportedBackend) as Box<dyn RasterBackend>)
    }
}

pub(crate) enum RenderCommand {
    Open {
        generation: LoadGeneration,
        bytes: Vec<u8>,
    },
    Render(RenderRequest),
}

/// Starts the render thread. It exits once every sender is dropped.
pub(crate) fn spawn_render_worker(
    factory: BackendFactory,
    sink: Arc<dyn EventSink>,
) -> mpsc::Sender<RenderCommand> {
    let (tx, rx) = mpsc::channel::<RenderCommand>();
    thread::spawn(move || {
        let mut backend = factory();
        let mut open_generation: Option<LoadGeneration> = None;
        while let Ok(command) = rx.recv() {
            match command {
                RenderCommand::Open { generation, bytes } => match backend.open(&bytes) {
                    Ok(total_pages) => {
                        folio_info!("opened document: {} pages", total_pages);
                        open_generation = Some(generation);
                        sink.emit(EngineEvent::DocumentLoaded {
                            generation,
                            total_pages,
                        });
                    }
                    Err(err) => {
                        folio_warn!("could not open document: {}", err);
                        open_generation = None;
                        sink.emit(EngineEvent::DocumentFailed {
                            generation,
                            reason: err.to_string(),
                        });
                    }
                },
                RenderCommand::Render(request) => {
                    if open_generation != Some(request.generation) {
                        folio_debug!(
                            "skipping render of page {} for closed generation {}",
                            request.page,
                            request.generation
                        );
                        continue;
                    }
                    let event = match backend.render(request.page, request.scale) {
                        Ok(surface) => EngineEvent::PageRendered {
                            generation: request.generation,
                            page: request.page,
                            surface,
                        },
                        Err(err) => EngineEvent::RenderFailed {
                            generation: request.generation,
                            page: request.page,
                            reason: err.to_string(),
                        },
                    };
                    sink.emit(event);
                }
            }
        }
        folio_debug!("render worker stopped");
    });
    tx
}

#[cfg(feature = "pdf")]
mod mupdf_backend {
    use std::io::Write;

    use mupdf::{Colorspace, Document, Matrix, Pixmap};
    use tempfile::NamedTempFile;

    use super::{RasterBackend, RenderError};
    use folio_core::RasterSurface;

    fn backend_error(err: mupdf::error::Error) -> RenderError {
        RenderError::Backend(err.to_string())
    }

    /// MuPDF reads from a path, so the downloaded bytes are spooled to a temp file
    /// that lives as long as the document.
    #[derive(Default)]
    pub struct MupdfBackend {
        open: Option<(NamedTempFile, Document, u32)>,
    }

    impl RasterBackend for MupdfBackend {
        fn open(&mut self, bytes: &[u8]) -> Result<u32, RenderError> {
            self.open = None;
            let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
            file.write_all(bytes)?;
            file.flush()?;
            let path = file.path().to_string_lossy().into_owned();
            let document = Document::open(path.as_str()).map_err(backend_error)?;
            let count = document.page_count().map_err(backend_error)?;
            let total = u32::try_from(count)
                .map_err(|_| RenderError::Backend(format!("bad page count {count}")))?;
            self.open = Some((file, document, total));
            Ok(total)
        }

        fn render(&mut self, page: u32, scale: f64) -> Result<RasterSurface, RenderError> {
            let (_, document, total) = self.open.as_ref().ok_or(RenderError::NoDocument)?;
            if page == 0 || page > *total {
                return Err(RenderError::PageOutOfRange {
                    page,
                    total: *total,
                });
            }
            let loaded = document
                .load_page((page - 1) as i32)
                .map_err(backend_error)?;
            let matrix = Matrix::new_scale(scale as f32, scale as f32);
            let pixmap = loaded
                .to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)
                .map_err(backend_error)?;
            pixmap_to_rgba(&pixmap)
        }
    }

    fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RasterSurface, RenderError> {
        let n = pixmap.n() as usize;
        if n < 3 {
            return Err(RenderError::Backend(format!(
                "unsupported pixmap format: {n} channels"
            )));
        }
        let width = pixmap.width();
        let height = pixmap.height();
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        let row_bytes = width as usize * n;
        if samples.len() < stride.saturating_mul(height as usize) || row_bytes > stride {
            return Err(RenderError::Backend("pixmap buffer size mismatch".into()));
        }

        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height as usize {
            let row = &samples[y * stride..y * stride + row_bytes];
            for px in row.chunks_exact(n) {
                rgba.extend_from_slice(&px[..3]);
                rgba.push(0xff);
            }
        }
        RasterSurface::from_rgba(width, height, rgba)
            .ok_or_else(|| RenderError::Backend("pixmap buffer size mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::ChannelEventSink;

    /// Pages are solid squares whose side grows with the scale.
    struct SquarePages {
        total: Option<u32>,
    }

    impl RasterBackend for SquarePages {
        fn open(&mut self, bytes: &[u8]) -> Result<u32, RenderError> {
            let total = u32::from(*bytes.first().ok_or(RenderError::Backend("empty".into()))?);
            self.total = Some(total);
            Ok(total)
        }

        fn render(&mut self, page: u32, scale: f64) -> Result<RasterSurface, RenderError> {
            let total = self.total.ok_or(RenderError::NoDocument)?;
            if page > total {
                return Err(RenderError::PageOutOfRange { page, total });
            }
            let side = (10.0 * scale) as u32;
            Ok(RasterSurface::blank(side, side))
        }
    }

    fn worker() -> (mpsc::Sender<RenderCommand>, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
        let factory: BackendFactory =
            Box::new(|| Box::new(SquarePages { total: None }) as Box<dyn RasterBackend>);
        (spawn_render_worker(factory, sink), event_rx)
    }

    fn next(rx: &mpsc::Receiver<EngineEvent>) -> EngineEvent {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn opens_then_renders_at_scale() {
        let (tx, rx) = worker();
        tx.send(RenderCommand::Open {
            generation: 1,
            bytes: vec![3],
        })
        .unwrap();
        assert_eq!(
            next(&rx),
            EngineEvent::DocumentLoaded {
                generation: 1,
                total_pages: 3
            }
        );

        tx.send(RenderCommand::Render(RenderRequest {
            generation: 1,
            page: 2,
            scale: 2.0,
        }))
        .unwrap();
        match next(&rx) {
            EngineEvent::PageRendered {
                generation,
                page,
                surface,
            } => {
                assert_eq!((generation, page), (1, 2));
                assert_eq!((surface.width(), surface.height()), (20, 20));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stale_generations_are_skipped_and_failures_reported() {
        let (tx, rx) = worker();
        tx.send(RenderCommand::Open {
            generation: 4,
            bytes: vec![1],
        })
        .unwrap();
        next(&rx);

        tx.send(RenderCommand::Render(RenderRequest {
            generation: 3,
            page: 1,
            scale: 1.0,
        }))
        .unwrap();
        tx.send(RenderCommand::Render(RenderRequest {
            generation: 4,
            page: 9,
            scale: 1.0,
        }))
        .unwrap();
        assert!(matches!(
            next(&rx),
            EngineEvent::RenderFailed { generation: 4, page: 9, .. }
        ));

        tx.send(RenderCommand::Open {
            generation: 5,
            bytes: Vec::new(),
        })
        .unwrap();
        assert!(matches!(
            next(&rx),
            EngineEvent::DocumentFailed { generation: 5, .. }
        ));
    }

    #[test]
    fn unsupported_backend_refuses_documents() {
        let mut backend = UnsupportedBackend;
        assert!(matches!(backend.open(b"%PDF-1.7"), Err(RenderError::Unsupported)));
    }
}
