use std::sync::Once;

use folio_core::{
    BusEvent, EventBus, PageRejected, PageScheduler, RasterSurface, RenderRequest, Subscriber,
    ViewerEffect, ViewerPhase,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(folio_logging::initialize_for_tests);
}

fn renders(effects: Vec<ViewerEffect>) -> Vec<u32> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            ViewerEffect::Render(RenderRequest { page, .. }) => Some(page),
            ViewerEffect::Load(_) => None,
        })
        .collect()
}

/// Scheduler with a 10-page document loaded and the first render still in flight.
fn ready_scheduler(initial_page: u32) -> PageScheduler {
    let mut scheduler = PageScheduler::new(1.0);
    scheduler.load_document("https://blob.example/doc.pdf", initial_page, "doc");
    let generation = scheduler.generation();
    scheduler.load_succeeded(generation, 10);
    scheduler
}

fn finish_render(scheduler: &mut PageScheduler, page: u32) {
    scheduler.render_finished(scheduler.generation(), page, RasterSurface::blank(4, 4));
}

#[test]
fn load_then_first_render() {
    init_logging();
    let mut scheduler = PageScheduler::new(1.0);
    assert_eq!(scheduler.phase(), &ViewerPhase::Idle);

    scheduler.load_document("https://blob.example/doc.pdf", 4, "Report");
    assert_eq!(scheduler.phase(), &ViewerPhase::Loading);
    assert_eq!(scheduler.status_line(), "Loading Report…");
    let effects = scheduler.take_effects();
    assert!(matches!(&effects[..], [ViewerEffect::Load(ticket)] if ticket.url.ends_with("doc.pdf")));

    scheduler.load_succeeded(scheduler.generation(), 12);
    assert_eq!(scheduler.phase(), &ViewerPhase::Ready);
    assert_eq!(renders(scheduler.take_effects()), vec![4]);
    assert!(scheduler.is_rendering());

    finish_render(&mut scheduler, 4);
    assert!(!scheduler.is_rendering());
    assert_eq!(scheduler.surface_page(), Some(4));
    assert_eq!(scheduler.status_line(), "Page 4 of 12");
}

#[test]
fn burst_of_requests_coalesces_to_the_last_page() {
    init_logging();
    let mut scheduler = ready_scheduler(1);
    assert_eq!(renders(scheduler.take_effects()), vec![1]);

    scheduler.go_to_page(3).unwrap();
    scheduler.go_to_page(7).unwrap();
    scheduler.go_to_page(2).unwrap();
    assert!(scheduler.take_effects().is_empty());
    assert_eq!(scheduler.pending_page(), Some(2));
    assert_eq!(scheduler.current_page(), 2);

    finish_render(&mut scheduler, 1);
    assert_eq!(renders(scheduler.take_effects()), vec![2]);
    assert_eq!(scheduler.pending_page(), None);

    finish_render(&mut scheduler, 2);
    assert!(scheduler.take_effects().is_empty());
    assert_eq!(scheduler.renders_started(), 2);
    assert_eq!(scheduler.surface_page(), Some(2));
}

#[test]
fn returning_to_the_in_flight_page_drops_the_pending_one() {
    init_logging();
    let mut scheduler = ready_scheduler(5);
    scheduler.take_effects();
    scheduler.go_to_page(6).unwrap();
    scheduler.go_to_page(5).unwrap();
    finish_render(&mut scheduler, 5);
    assert!(scheduler.take_effects().is_empty());
    assert_eq!(scheduler.renders_started(), 1);
}

#[test]
fn out_of_range_pages_are_rejected_and_indicator_kept() {
    init_logging();
    let mut scheduler = ready_scheduler(4);
    finish_render(&mut scheduler, 4);
    scheduler.take_effects();

    assert_eq!(
        scheduler.go_to_page(0),
        Err(PageRejected::OutOfRange {
            requested: 0,
            total: 10
        })
    );
    assert!(scheduler.go_to_page(11).is_err());
    assert!(matches!(
        scheduler.go_to_page_text("3.5"),
        Err(PageRejected::NotANumber(_))
    ));
    assert!(scheduler.go_to_page_text("abc").is_err());
    assert_eq!(scheduler.current_page(), 4);
    assert!(scheduler.take_effects().is_empty());

    scheduler.go_to_page_text(" 9 ").unwrap();
    assert_eq!(renders(scheduler.take_effects()), vec![9]);
}

#[test]
fn next_and_previous_stop_at_bounds() {
    init_logging();
    let mut scheduler = ready_scheduler(10);
    finish_render(&mut scheduler, 10);
    scheduler.take_effects();

    scheduler.next();
    assert_eq!(scheduler.current_page(), 10);
    assert!(scheduler.take_effects().is_empty());

    scheduler.previous();
    assert_eq!(scheduler.current_page(), 9);
    assert_eq!(renders(scheduler.take_effects()), vec![9]);
    finish_render(&mut scheduler, 9);

    let mut first = ready_scheduler(1);
    finish_render(&mut first, 1);
    first.take_effects();
    first.previous();
    assert_eq!(first.current_page(), 1);
    assert!(first.take_effects().is_empty());
}

#[test]
fn requests_before_ready_are_rejected() {
    init_logging();
    let mut scheduler = PageScheduler::new(1.0);
    assert_eq!(scheduler.go_to_page(1), Err(PageRejected::NotReady));
    scheduler.next();
    assert!(scheduler.take_effects().is_empty());
}

#[test]
fn load_failure_is_terminal_and_stale_results_are_ignored() {
    init_logging();
    let mut scheduler = PageScheduler::new(1.0);
    scheduler.load_document("https://blob.example/broken.pdf", 1, "broken");
    let broken = scheduler.generation();
    scheduler.load_failed(broken, "not a PDF");
    assert_eq!(
        scheduler.status_line(),
        "Could not load document: not a PDF"
    );
    scheduler.load_succeeded(broken, 3);
    assert!(matches!(scheduler.phase(), ViewerPhase::Errored { .. }));
    assert!(scheduler.go_to_page(1).is_err());

    scheduler.load_document("https://blob.example/good.pdf", 1, "good");
    scheduler.load_failed(broken, "late failure from the old load");
    assert_eq!(scheduler.phase(), &ViewerPhase::Loading);
}

#[test]
fn invalid_url_errors_without_loading() {
    init_logging();
    let mut scheduler = PageScheduler::new(1.0);
    scheduler.load_document("not a url", 1, "x");
    assert!(matches!(scheduler.phase(), ViewerPhase::Errored { .. }));
    assert!(scheduler.take_effects().is_empty());
}

#[test]
fn render_from_previous_document_is_discarded() {
    init_logging();
    let mut scheduler = ready_scheduler(2);
    let old_generation = scheduler.generation();
    scheduler.load_document("https://blob.example/other.pdf", 1, "other");
    scheduler.load_succeeded(scheduler.generation(), 3);
    scheduler.render_finished(old_generation, 2, RasterSurface::blank(1, 1));
    assert_eq!(scheduler.surface_page(), None);
    assert!(scheduler.is_rendering());
}

#[test]
fn render_failure_still_runs_the_pending_page() {
    init_logging();
    let mut scheduler = ready_scheduler(1);
    scheduler.take_effects();
    scheduler.go_to_page(4).unwrap();
    scheduler.render_failed(scheduler.generation(), 1, "out of memory");
    assert_eq!(renders(scheduler.take_effects()), vec![4]);
}

#[test]
fn zoom_rerenders_current_page() {
    init_logging();
    let mut scheduler = ready_scheduler(3);
    finish_render(&mut scheduler, 3);
    scheduler.take_effects();

    scheduler.zoom_in();
    assert_eq!(scheduler.scale(), 1.25);
    let effects = scheduler.take_effects();
    assert!(matches!(
        &effects[..],
        [ViewerEffect::Render(RenderRequest { page: 3, scale, .. })] if *scale == 1.25
    ));

    scheduler.set_scale(100.0);
    assert_eq!(scheduler.scale(), folio_core::MAX_SCALE);
}

#[test]
fn revisiting_the_page_during_a_zoom_keeps_the_rescaled_render() {
    init_logging();
    let mut scheduler = ready_scheduler(5);
    scheduler.take_effects();

    scheduler.zoom_in();
    assert_eq!(scheduler.pending_page(), Some(5));
    // The render in flight is still at the old scale, so it does not satisfy this.
    scheduler.go_to_page(5).unwrap();
    assert_eq!(scheduler.pending_page(), Some(5));

    finish_render(&mut scheduler, 5);
    let follow_up: Vec<(u32, f64)> = scheduler
        .take_effects()
        .into_iter()
        .filter_map(|effect| match effect {
            ViewerEffect::Render(RenderRequest { page, scale, .. }) => Some((page, scale)),
            ViewerEffect::Load(_) => None,
        })
        .collect();
    assert_eq!(follow_up, vec![(5, 1.25)]);

    // Once the rescaled surface is installed the same page is a no-op.
    finish_render(&mut scheduler, 5);
    scheduler.go_to_page(5).unwrap();
    assert!(scheduler.take_effects().is_empty());
    assert!(!scheduler.is_rendering());
}

#[test]
fn rag_meta_loads_or_navigates() {
    init_logging();
    let mut scheduler = PageScheduler::new(1.0);
    let mut bus = EventBus::new();
    let meta = |page: u32, url: &str| BusEvent::RagMeta {
        pages: vec![page],
        pdf_url: url.to_string(),
        first_page: page,
        doc_label: "doc".to_string(),
    };

    scheduler.on_event(&meta(6, "https://blob.example/a.pdf"), &mut bus);
    assert_eq!(scheduler.phase(), &ViewerPhase::Loading);
    scheduler.load_succeeded(scheduler.generation(), 8);
    assert_eq!(renders(scheduler.take_effects()), vec![6]);
    finish_render(&mut scheduler, 6);

    let generation = scheduler.generation();
    scheduler.on_event(&meta(2, "https://blob.example/a.pdf"), &mut bus);
    assert_eq!(scheduler.generation(), generation);
    assert_eq!(renders(scheduler.take_effects()), vec![2]);
    finish_render(&mut scheduler, 2);

    scheduler.on_event(&BusEvent::JumpToPage { page: 7 }, &mut bus);
    assert_eq!(renders(scheduler.take_effects()), vec![7]);

    scheduler.on_event(&meta(1, "https://blob.example/b.pdf"), &mut bus);
    assert_eq!(scheduler.generation(), generation + 1);
    assert!(matches!(&scheduler.take_effects()[..], [ViewerEffect::Load(_)]));
}
