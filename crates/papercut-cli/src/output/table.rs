use papercut_core::segment::SegmentationResult;

pub fn print(result: &SegmentationResult) {
    let trace = &result.trace;
    println!(
        "=== {} question(s) from {} page(s) ===\n",
        result.len(),
        trace.page_count
    );

    if !result.is_empty() {
        println!(
            "  {:>4}  {:>4}  {:>5}  {:>17}  {:>11}",
            "Q", "Page", "Parts", "Y range", "Image"
        );
        for q in &result.questions {
            let size = q
                .image_size()
                .map(|(w, h)| format!("{w}x{h}"))
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:>4}  {:>4}  {:>5}  {:>7.1} - {:>7.1}  {:>11}",
                q.number,
                q.page,
                q.part_count(),
                q.coordinates.y_start,
                q.coordinates.y_end,
                size
            );
        }
        println!();
    }

    let ocr_pages: Vec<String> = trace
        .pages
        .iter()
        .filter(|p| p.ocr_attempted)
        .map(|p| p.page_number.to_string())
        .collect();
    if !ocr_pages.is_empty() {
        println!("  OCR used on page(s): {}", ocr_pages.join(", "));
    }

    let dropped: usize = trace.pages.iter().map(|p| p.degenerate_count()).sum();
    if dropped > 0 {
        println!("  {dropped} slice(s) too short, dropped");
    }

    for w in &trace.warnings {
        match w.page_number {
            Some(page) => println!("  warning (page {page}): {}", w.message),
            None => println!("  warning: {}", w.message),
        }
    }
}
