use pdf_outline::{extract_layout, OutlineExtractor, OutlineOptions};
use std::env;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_pages <pdf_path> [max_page | min-max]");
        std::process::exit(1);
    }

    let range = args.get(2).map(|s| s.as_str()).unwrap_or("1-3");
    let (min_page, max_page) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };

    let layout = extract_layout(&args[1]).expect("Failed to extract");
    let extractor = OutlineExtractor::new(OutlineOptions::default()).expect("Bad options");

    let regions = extractor.table_regions(&layout);
    let lines = extractor.filtered_lines(&layout, &regions);
    let verdicts = extractor.classifier().verdicts(&lines);

    for page in min_page..=max_page {
        let Some(page_layout) = layout.page(page) else {
            continue;
        };
        println!(
            "=== PAGE {} ({} spans, {} edges) ===",
            page,
            page_layout.spans.len(),
            page_layout.edges.len()
        );
        for span in &page_layout.spans {
            println!(
                "  x={:7.1} y={:7.1} w={:7.1} fs={:5.1} font={} text={:?}",
                span.bbox.x0,
                span.baseline(),
                span.bbox.width(),
                span.font_size,
                span.font_name,
                span.text
            );
        }

        println!("  --- tables ---");
        for region in regions.iter().filter(|r| r.page == page) {
            let b = region.bbox;
            println!("  [{:7.1} {:7.1} {:7.1} {:7.1}]", b.x0, b.y0, b.x1, b.y1);
        }

        println!("  --- lines ---");
        for (fl, verdict) in lines.iter().zip(&verdicts).filter(|(fl, _)| fl.line.page == page) {
            let status = match (&fl.excluded, verdict.level()) {
                (Some(why), _) => format!("excluded:{:?}", why),
                (None, Some(level)) => format!("{} {:?}", level, verdict),
                (None, None) => format!("{:?}", verdict),
            };
            println!(
                "  fs={:5.1} {:<28} {:?}",
                fl.line.font_size(),
                status,
                fl.line.text()
            );
        }
        println!();
    }
}
